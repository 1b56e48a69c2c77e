pub mod blob;
pub mod error;
pub mod page;

// Common type aliases
pub type PageIndex = u32;
pub type Offset = u64;

// Fixed header prefix: header_size(4) | page_size(4) | page_count(4) | directory_offset(8)
pub const HEADER_PREFIX_SIZE: usize = 20;
// Per-chunk header: next_chunk_offset(8) | chunk_length(4)
pub const CHUNK_HEADER_SIZE: usize = 12;

pub const DEFAULT_PAGE_SIZE: u32 = 1024;
pub const DEFAULT_PAGE_COUNT: u32 = 5 * 1024;

pub const MAX_NAME_LENGTH: usize = u16::MAX as usize;
pub const NAME_LENGTH_SIZE: usize = 2; // u16
pub const CONTENT_LENGTH_SIZE: usize = 4; // u32
pub const DIRECTORY_COUNT_SIZE: usize = 4; // i32 entry count
