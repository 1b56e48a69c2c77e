use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{
    CONTENT_LENGTH_SIZE, MAX_NAME_LENGTH, NAME_LENGTH_SIZE, Offset,
    error::{BucketError, Result},
};

/// Identifies a stored blob either by its unique name or by its head offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlobKey {
    Name(String),
    Offset(Offset),
}

impl From<&str> for BlobKey {
    fn from(name: &str) -> Self {
        BlobKey::Name(name.to_string())
    }
}

impl From<String> for BlobKey {
    fn from(name: String) -> Self {
        BlobKey::Name(name)
    }
}

impl From<&String> for BlobKey {
    fn from(name: &String) -> Self {
        BlobKey::Name(name.clone())
    }
}

impl From<Offset> for BlobKey {
    fn from(offset: Offset) -> Self {
        BlobKey::Offset(offset)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobKey::Name(name) => write!(f, "'{}'", name),
            BlobKey::Offset(offset) => write!(f, "@{}", offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub name: String,
    pub content: Vec<u8>,
}

/*
 * Framed blob stream (spans the payloads of a chunk chain)
 * ┌──────────────────────────────────────────────────────────────┐
 * │ name_length(2, BE) | name | content_length(4, BE) | content  │
 * └──────────────────────────────────────────────────────────────┘
 */

impl Blob {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn framed_size(&self) -> usize {
        framed_size(&self.name, self.content.len())
    }

    pub fn metadata(&self) -> BlobMetadata {
        BlobMetadata {
            name: self.name.clone(),
            size: self.content.len() as u64,
        }
    }

    pub fn to_framed_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.framed_size());
        buffer.extend_from_slice(&(self.name.len() as u16).to_be_bytes());
        buffer.extend_from_slice(self.name.as_bytes());
        buffer.extend_from_slice(&(self.content.len() as u32).to_be_bytes());
        buffer.extend_from_slice(&self.content);
        buffer
    }

    /// Parses a dechunked stream. `head` is only used for error reporting.
    pub fn from_framed_bytes(bytes: &[u8], head: Offset) -> Result<Self> {
        let (metadata, content_start) = match BlobMetadata::parse_prefix(bytes, head)? {
            Some(parsed) => parsed,
            None => {
                return Err(BucketError::corrupt_data(
                    head,
                    "chain ended inside blob header",
                ));
            }
        };

        let content_end = content_start + metadata.size as usize;
        if bytes.len() < content_end {
            return Err(BucketError::corrupt_data(
                head,
                format!(
                    "chain ended after {} of {} content bytes",
                    bytes.len() - content_start,
                    metadata.size
                ),
            ));
        }
        if bytes.len() > content_end {
            return Err(BucketError::corrupt_data(
                head,
                "chain holds more bytes than the declared content length",
            ));
        }

        Ok(Self {
            name: metadata.name,
            content: bytes[content_start..content_end].to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub name: String,
    pub size: u64,
}

impl BlobMetadata {
    /// Parses `name_length | name | content_length` from the start of a framed
    /// stream.
    ///
    /// Returns `Ok(None)` while `bytes` is still too short, otherwise the
    /// metadata together with the offset at which content begins.
    pub fn parse_prefix(bytes: &[u8], head: Offset) -> Result<Option<(Self, usize)>> {
        if bytes.len() < NAME_LENGTH_SIZE {
            return Ok(None);
        }
        let name_length = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let content_length_at = NAME_LENGTH_SIZE + name_length;
        let content_start = content_length_at + CONTENT_LENGTH_SIZE;
        if bytes.len() < content_start {
            return Ok(None);
        }

        let name = std::str::from_utf8(&bytes[NAME_LENGTH_SIZE..content_length_at])
            .map_err(|_| BucketError::corrupt_data(head, "blob name is not valid UTF-8"))?
            .to_string();
        let size = u32::from_be_bytes([
            bytes[content_length_at],
            bytes[content_length_at + 1],
            bytes[content_length_at + 2],
            bytes[content_length_at + 3],
        ]) as u64;

        Ok(Some((Self { name, size }, content_start)))
    }
}

pub fn framed_size(name: &str, content_length: usize) -> usize {
    NAME_LENGTH_SIZE + name.len() + CONTENT_LENGTH_SIZE + content_length
}

/// Rejects names that are empty, contain path separators, or do not fit the
/// u16 length prefix.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BucketError::Validation {
            reason: "name is empty".to_string(),
        });
    }
    if name.contains('/') || name.contains('\\') {
        return Err(BucketError::Validation {
            reason: format!("name '{}' contains a path separator", name),
        });
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(BucketError::Validation {
            reason: format!(
                "name is {} bytes long, limit is {}",
                name.len(),
                MAX_NAME_LENGTH
            ),
        });
    }
    Ok(())
}
