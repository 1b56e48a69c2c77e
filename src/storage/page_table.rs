use tracing::debug;

use crate::types::{
    HEADER_PREFIX_SIZE, PageIndex,
    error::{BucketError, Result},
    page::PageState,
};

/// Fixed-size table of page states, one byte per page, stored right after the
/// header prefix.
///
/// Pages are handed out by index. A blob's pages need not be contiguous: the
/// order returned by [`PageTable::allocate`] is the order the chunk chain is
/// linked in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    states: Vec<PageState>,
}

impl PageTable {
    pub fn new(page_count: u32) -> Self {
        Self {
            states: vec![PageState::Free; page_count as usize],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut states = Vec::with_capacity(bytes.len());
        for (index, byte) in bytes.iter().enumerate() {
            let state = PageState::from_u8(*byte).ok_or_else(|| {
                BucketError::corrupt_header(format!(
                    "page {} has unknown state byte {}",
                    index, byte
                ))
            })?;
            states.push(state);
        }
        Ok(Self { states })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.states.iter().map(PageState::as_u8).collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, index: PageIndex) -> Option<PageState> {
        self.states.get(index as usize).copied()
    }

    pub fn free_count(&self) -> usize {
        self.states
            .iter()
            .filter(|state| **state == PageState::Free)
            .count()
    }

    /// File offset of the state byte for `index`.
    pub fn byte_offset(index: PageIndex) -> u64 {
        HEADER_PREFIX_SIZE as u64 + index as u64
    }

    /// Reserves enough Free pages to hold `byte_length` bytes at `capacity`
    /// payload bytes per page.
    ///
    /// The whole table is scanned before anything is marked, so on
    /// `OutOfSpace` the table is left untouched.
    pub fn allocate(&mut self, byte_length: usize, capacity: usize) -> Result<Vec<PageIndex>> {
        let mut collected = Vec::new();
        let mut reserved = 0usize;

        for (index, state) in self.states.iter().enumerate() {
            if reserved >= byte_length && !collected.is_empty() {
                break;
            }
            if *state == PageState::Free {
                collected.push(index as PageIndex);
                reserved += capacity;
            }
        }

        if reserved < byte_length || collected.is_empty() {
            return Err(BucketError::OutOfSpace {
                requested: byte_length,
                available: self.free_count() * capacity,
            });
        }

        for index in &collected {
            self.states[*index as usize] = PageState::Used;
        }
        debug!(pages = collected.len(), byte_length, "allocated pages");
        Ok(collected)
    }

    /// Marks every page in `indexes` Free again.
    pub fn free(&mut self, indexes: &[PageIndex]) {
        for index in indexes {
            if let Some(state) = self.states.get_mut(*index as usize) {
                *state = PageState::Free;
            }
        }
        debug!(pages = indexes.len(), "freed pages");
    }
}
