use std::collections::{BTreeMap, HashMap};

use crate::types::{
    DIRECTORY_COUNT_SIZE, NAME_LENGTH_SIZE, Offset,
    blob::BlobKey,
    error::{BucketError, Result},
};

/*
 * Directory Footer Layout (at directory_offset, runs to end of file)
 * ┌─────────────────────────────────────────────────────────────────┐
 * │ entry_count(4, BE)                                              │
 * ├─────────────────────────────────────────────────────────────────┤
 * │ [name_length(2) | name | head_offset(8)] * entry_count          │
 * └─────────────────────────────────────────────────────────────────┘
 */

/// In-memory mirror of the name -> head offset footer.
///
/// Keeps a reverse index so blobs can be addressed by head offset as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    entries: BTreeMap<String, Offset>,
    heads: HashMap<Offset, String>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Offset> {
        self.entries.get(name).copied()
    }

    pub fn name_at(&self, head_offset: Offset) -> Option<&str> {
        self.heads.get(&head_offset).map(String::as_str)
    }

    /// Resolves a key to its `(name, head_offset)` pair.
    pub fn resolve(&self, key: &BlobKey) -> Option<(String, Offset)> {
        match key {
            BlobKey::Name(name) => self.get(name).map(|offset| (name.clone(), offset)),
            BlobKey::Offset(offset) => self
                .name_at(*offset)
                .map(|name| (name.to_string(), *offset)),
        }
    }

    pub fn insert(&mut self, name: String, head_offset: Offset) {
        if let Some(previous) = self.entries.insert(name.clone(), head_offset) {
            self.heads.remove(&previous);
        }
        self.heads.insert(head_offset, name);
    }

    pub fn remove(&mut self, name: &str) -> Option<Offset> {
        let offset = self.entries.remove(name)?;
        self.heads.remove(&offset);
        Some(offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Offset)> {
        self.entries.iter().map(|(name, offset)| (name.as_str(), *offset))
    }

    pub fn snapshot(&self) -> BTreeMap<String, Offset> {
        self.entries.clone()
    }

    pub fn encoded_len(&self) -> usize {
        DIRECTORY_COUNT_SIZE
            + self
                .entries
                .keys()
                .map(|name| NAME_LENGTH_SIZE + name.len() + 8)
                .sum::<usize>()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.encoded_len());
        buffer.extend_from_slice(&(self.entries.len() as i32).to_be_bytes());
        for (name, offset) in &self.entries {
            buffer.extend_from_slice(&(name.len() as u16).to_be_bytes());
            buffer.extend_from_slice(name.as_bytes());
            buffer.extend_from_slice(&(*offset as i64).to_be_bytes());
        }
        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DIRECTORY_COUNT_SIZE {
            return Err(BucketError::corrupt_header("directory footer missing"));
        }
        let entry_count = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if entry_count < 0 {
            return Err(BucketError::corrupt_header(format!(
                "negative directory entry count {}",
                entry_count
            )));
        }

        let mut directory = Self::new();
        let mut offset = DIRECTORY_COUNT_SIZE;

        for _ in 0..entry_count {
            let name_length = u16::from_be_bytes(take::<2>(bytes, offset)?) as usize;
            offset += NAME_LENGTH_SIZE;

            let name_bytes = bytes
                .get(offset..offset + name_length)
                .ok_or_else(|| BucketError::corrupt_header("directory entry truncated"))?;
            let name = String::from_utf8(name_bytes.to_vec())
                .map_err(|_| BucketError::corrupt_header("directory name is not valid UTF-8"))?;
            offset += name_length;

            let head_offset = i64::from_be_bytes(take::<8>(bytes, offset)?);
            offset += 8;

            if head_offset <= 0 {
                return Err(BucketError::corrupt_header(format!(
                    "blob '{}' has invalid head offset {}",
                    name, head_offset
                )));
            }
            if directory.contains(&name) {
                return Err(BucketError::corrupt_header(format!(
                    "blob '{}' listed twice",
                    name
                )));
            }
            directory.insert(name, head_offset as u64);
        }

        Ok(directory)
    }
}

fn take<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N]> {
    bytes
        .get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| BucketError::corrupt_header("directory entry truncated"))
}
