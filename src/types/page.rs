use serde::{Deserialize, Serialize};

use crate::types::{
    CHUNK_HEADER_SIZE, Offset,
    error::{BucketError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageState {
    Free = 0,
    Used = 1,
}

impl PageState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PageState::Free),
            1 => Some(PageState::Used),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            PageState::Free => 0,
            PageState::Used => 1,
        }
    }
}

/*
 * Chunk Layout on Disk (one per Used page)
 * ┌──────────────────────────────────────────────────────────────┐
 * │ next_chunk_offset(8, BE) | chunk_length(4, BE)               │
 * ├──────────────────────────────────────────────────────────────┤
 * │ payload[chunk_length]          (chunk_length <= page - 12)   │
 * └──────────────────────────────────────────────────────────────┘
 * next_chunk_offset == 0 terminates the chain.
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub next_offset: Offset,
    pub payload_length: u32,
}

impl ChunkHeader {
    pub fn is_last(&self) -> bool {
        self.next_offset == 0
    }

    pub fn to_bytes(&self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut buffer = [0u8; CHUNK_HEADER_SIZE];
        buffer[0..8].copy_from_slice(&self.next_offset.to_be_bytes());
        buffer[8..12].copy_from_slice(&self.payload_length.to_be_bytes());
        buffer
    }

    /// Parses a chunk header read from the page at `at`.
    ///
    /// `capacity` is the payload room of a page (`page_size - 12`); a declared
    /// length beyond it means the page does not hold a valid chunk.
    pub fn from_bytes(bytes: &[u8], at: Offset, capacity: usize) -> Result<Self> {
        if bytes.len() < CHUNK_HEADER_SIZE {
            return Err(BucketError::corrupt_data(at, "chunk header too short"));
        }

        let next_offset = u64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);
        if next_offset > i64::MAX as u64 {
            return Err(BucketError::corrupt_data(at, "negative next chunk offset"));
        }

        let payload_length = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if payload_length as usize > capacity {
            return Err(BucketError::corrupt_data(
                at,
                format!(
                    "chunk length {} exceeds page capacity {}",
                    payload_length, capacity
                ),
            ));
        }

        Ok(Self {
            next_offset,
            payload_length,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub header: ChunkHeader,
    pub payload: Vec<u8>,
}

impl Chunk {
    pub fn new(next_offset: Offset, payload: Vec<u8>) -> Self {
        Self {
            header: ChunkHeader {
                next_offset,
                payload_length: payload.len() as u32,
            },
            payload,
        }
    }

    pub fn next_offset(&self) -> Offset {
        self.header.next_offset
    }

    pub fn encoded_len(&self) -> usize {
        CHUNK_HEADER_SIZE + self.payload.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.encoded_len());
        buffer.extend_from_slice(&self.header.to_bytes());
        buffer.extend_from_slice(&self.payload);
        buffer
    }

    /// Decodes a whole chunk (header followed by its payload) from `bytes`.
    ///
    /// Trailing bytes past the declared payload are ignored, so a full page
    /// buffer can be passed in directly.
    pub fn from_bytes(bytes: &[u8], at: Offset, capacity: usize) -> Result<Self> {
        let header = ChunkHeader::from_bytes(bytes, at, capacity)?;
        let end = CHUNK_HEADER_SIZE + header.payload_length as usize;
        if bytes.len() < end {
            return Err(BucketError::corrupt_data(at, "chunk payload truncated"));
        }

        Ok(Self {
            header,
            payload: bytes[CHUNK_HEADER_SIZE..end].to_vec(),
        })
    }
}
