use serde::{Deserialize, Serialize};

use crate::types::{
    CHUNK_HEADER_SIZE, DEFAULT_PAGE_COUNT, DEFAULT_PAGE_SIZE, HEADER_PREFIX_SIZE,
    error::{BucketError, Result},
};

/// Geometry a bucket is created with. Fixed for the lifetime of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    pub page_size: u32,
    pub page_count: u32,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_count: DEFAULT_PAGE_COUNT,
        }
    }
}

impl BucketConfig {
    pub fn new(page_size: u32, page_count: u32) -> Self {
        Self {
            page_size,
            page_count,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size as usize <= CHUNK_HEADER_SIZE {
            return Err(BucketError::InvalidConfig {
                reason: format!(
                    "page size {} leaves no room after the {}-byte chunk header",
                    self.page_size, CHUNK_HEADER_SIZE
                ),
            });
        }
        if self.page_count == 0 {
            return Err(BucketError::InvalidConfig {
                reason: "page count must be at least 1".to_string(),
            });
        }
        if self.page_size > i32::MAX as u32 {
            return Err(BucketError::InvalidConfig {
                reason: format!("page size {} does not fit in i32", self.page_size),
            });
        }
        // header_size is stored as i32 too
        if self.page_count as u64 + HEADER_PREFIX_SIZE as u64 > i32::MAX as u64 {
            return Err(BucketError::InvalidConfig {
                reason: format!("page count {} does not fit in i32", self.page_count),
            });
        }
        Ok(())
    }

    pub fn header_size(&self) -> u32 {
        HEADER_PREFIX_SIZE as u32 + self.page_count
    }

    pub fn payload_capacity(&self) -> usize {
        self.page_size as usize - CHUNK_HEADER_SIZE
    }
}
