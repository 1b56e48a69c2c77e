use crate::{
    storage::{config::BucketConfig, page_table::PageTable},
    types::{
        CHUNK_HEADER_SIZE, HEADER_PREFIX_SIZE, Offset, PageIndex,
        error::{BucketError, Result},
    },
};

/// Page layout of a bucket, copied out of the header so chain walks do not
/// need to hold the header lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    pub header_size: u32,
    pub page_size: u32,
    pub page_count: u32,
}

impl PageGeometry {
    pub fn page_offset(&self, index: PageIndex) -> Offset {
        self.header_size as u64 + index as u64 * self.page_size as u64
    }

    /// Maps a file offset back to its page, if it is the start of a page
    /// inside the page region.
    pub fn page_index(&self, offset: Offset) -> Option<PageIndex> {
        let relative = offset.checked_sub(self.header_size as u64)?;
        if relative % self.page_size as u64 != 0 {
            return None;
        }
        let index = relative / self.page_size as u64;
        if index >= self.page_count as u64 {
            return None;
        }
        Some(index as PageIndex)
    }

    pub fn payload_capacity(&self) -> usize {
        self.page_size as usize - CHUNK_HEADER_SIZE
    }

    pub fn page_region_end(&self) -> Offset {
        self.page_offset(self.page_count)
    }
}

/*
 * Bucket Header Layout (offset 0, all integers big-endian)
 * ┌─────────────────────────────────────────────────────────────────┐
 * │ header_size(4) | page_size(4) | page_count(4) |                 │
 * │ directory_offset(8)                                             │
 * ├─────────────────────────────────────────────────────────────────┤
 * │ page_table[page_count]   (0 = Free, 1 = Used)                   │
 * └─────────────────────────────────────────────────────────────────┘
 */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketHeader {
    pub header_size: u32,
    pub page_size: u32,
    pub page_count: u32,
    pub directory_offset: Offset,
    pub page_table: PageTable,
}

impl BucketHeader {
    pub fn new(config: &BucketConfig) -> Self {
        let header_size = config.header_size();
        Self {
            header_size,
            page_size: config.page_size,
            page_count: config.page_count,
            directory_offset: header_size as u64,
            page_table: PageTable::new(config.page_count),
        }
    }

    pub fn geometry(&self) -> PageGeometry {
        PageGeometry {
            header_size: self.header_size,
            page_size: self.page_size,
            page_count: self.page_count,
        }
    }

    /// Raises `directory_offset` past `highest_page`. Never lowers it.
    pub fn grow_directory_offset(&mut self, highest_page: PageIndex) -> Offset {
        let end_of_page = self.geometry().page_offset(highest_page + 1);
        self.directory_offset = self.directory_offset.max(end_of_page);
        self.directory_offset
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.header_size as usize);

        buffer.extend_from_slice(&(self.header_size as i32).to_be_bytes());
        buffer.extend_from_slice(&(self.page_size as i32).to_be_bytes());
        buffer.extend_from_slice(&(self.page_count as i32).to_be_bytes());
        buffer.extend_from_slice(&(self.directory_offset as i64).to_be_bytes());
        buffer.extend_from_slice(&self.page_table.to_bytes());

        buffer
    }

    /// Reads the fixed prefix and returns the full header length it declares.
    ///
    /// Fails if the declared size disagrees with `20 + page_count`.
    pub fn size_from_prefix(bytes: &[u8]) -> Result<usize> {
        if bytes.len() < HEADER_PREFIX_SIZE {
            return Err(BucketError::corrupt_header("Header too short"));
        }

        let header_size = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let page_size = i32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let page_count = i32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        if page_size as i64 <= CHUNK_HEADER_SIZE as i64 {
            return Err(BucketError::corrupt_header(format!(
                "Unsupported page size: {}",
                page_size
            )));
        }
        if page_count <= 0 {
            return Err(BucketError::corrupt_header(format!(
                "Invalid page count: {}",
                page_count
            )));
        }

        let expected = HEADER_PREFIX_SIZE as i64 + page_count as i64;
        if header_size as i64 != expected {
            return Err(BucketError::corrupt_header(format!(
                "header size {} does not match {} pages (expected {})",
                header_size, page_count, expected
            )));
        }

        Ok(expected as usize)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header_size = Self::size_from_prefix(bytes)?;
        if bytes.len() < header_size {
            return Err(BucketError::corrupt_header("Page table truncated"));
        }

        let mut offset = 4;

        let page_size = i32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as u32;
        offset += 4;

        let page_count = i32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as u32;
        offset += 4;

        let directory_offset = i64::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]);
        offset += 8;

        if directory_offset < header_size as i64 {
            return Err(BucketError::corrupt_header(format!(
                "directory offset {} points inside the header",
                directory_offset
            )));
        }

        let page_table = PageTable::from_bytes(&bytes[offset..header_size])?;

        Ok(Self {
            header_size: header_size as u32,
            page_size,
            page_count,
            directory_offset: directory_offset as u64,
            page_table,
        })
    }
}
