pub mod bucket;
pub mod chunk_chain;
pub mod config;
pub mod directory;
pub mod header;
pub mod page_table;

// Byte position of directory_offset inside the header prefix
const DIRECTORY_OFFSET_POSITION: u64 = 12;
