use std::{collections::HashSet, fs::File};

use tracing::debug;

use crate::{
    storage::header::PageGeometry,
    types::{
        CHUNK_HEADER_SIZE, Offset, PageIndex,
        blob::{Blob, BlobMetadata},
        error::{BucketError, Result},
        page::{Chunk, ChunkHeader, PageState},
    },
    utils::file_io,
};

/// Writes `framed` across `pages`, one chunk per page, linked in slice order.
///
/// Returns the head offset (file offset of the first page).
pub fn write_blob(
    file: &File,
    geometry: PageGeometry,
    pages: &[PageIndex],
    framed: &[u8],
) -> Result<Offset> {
    let capacity = geometry.payload_capacity();
    let Some(first) = pages.first() else {
        return Err(BucketError::OutOfSpace {
            requested: framed.len(),
            available: 0,
        });
    };

    for (i, page) in pages.iter().enumerate() {
        let start = (i * capacity).min(framed.len());
        let end = ((i + 1) * capacity).min(framed.len());
        let next_offset = match pages.get(i + 1) {
            Some(next) => geometry.page_offset(*next),
            None => 0,
        };

        let chunk = Chunk::new(next_offset, framed[start..end].to_vec());
        file_io::write_all_at(file, &chunk.to_bytes(), geometry.page_offset(*page))?;
    }

    let head = geometry.page_offset(*first);
    debug!(head, pages = pages.len(), bytes = framed.len(), "wrote chunk chain");
    Ok(head)
}

/// Walks a chunk chain from its head, yielding `(page, chunk)` pairs.
///
/// Every visited page must be inside the page region, page aligned and
/// marked Used; anything else ends the walk with `CorruptData`. Revisiting
/// a page is a cycle.
pub struct ChainWalker<'a, F> {
    file: &'a File,
    geometry: PageGeometry,
    page_state: F,
    next: Offset,
    visited: HashSet<PageIndex>,
    with_payload: bool,
}

impl<'a, F> ChainWalker<'a, F>
where
    F: Fn(PageIndex) -> Option<PageState>,
{
    pub fn new(file: &'a File, geometry: PageGeometry, page_state: F, head: Offset) -> Self {
        Self {
            file,
            geometry,
            page_state,
            next: head,
            visited: HashSet::new(),
            with_payload: true,
        }
    }

    /// Only chunk headers are read; yielded chunks carry an empty payload.
    pub fn headers_only(mut self) -> Self {
        self.with_payload = false;
        self
    }

    fn read_link(&mut self, at: Offset) -> Result<(PageIndex, Chunk)> {
        let index = self
            .geometry
            .page_index(at)
            .ok_or_else(|| BucketError::corrupt_data(at, "offset is not a page boundary"))?;
        if (self.page_state)(index) != Some(PageState::Used) {
            return Err(BucketError::corrupt_data(at, format!("page {} is not in use", index)));
        }

        if !self.visited.insert(index) {
            return Err(BucketError::corrupt_data(at, "chunk chain loops"));
        }

        let mut header_bytes = [0u8; CHUNK_HEADER_SIZE];
        file_io::read_exact_at(self.file, &mut header_bytes, at)?;
        let header = ChunkHeader::from_bytes(&header_bytes, at, self.geometry.payload_capacity())?;

        let mut payload = Vec::new();
        if self.with_payload {
            payload = vec![0u8; header.payload_length as usize];
            file_io::read_exact_at(self.file, &mut payload, at + CHUNK_HEADER_SIZE as u64)?;
        }

        Ok((index, Chunk { header, payload }))
    }
}

impl<F> Iterator for ChainWalker<'_, F>
where
    F: Fn(PageIndex) -> Option<PageState>,
{
    type Item = Result<(PageIndex, Chunk)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == 0 {
            return None;
        }
        let at = self.next;
        match self.read_link(at) {
            Ok((index, chunk)) => {
                self.next = chunk.next_offset();
                Some(Ok((index, chunk)))
            }
            Err(e) => {
                self.next = 0;
                Some(Err(e))
            }
        }
    }
}

/// Reassembles the whole chain at `head` and parses it into a blob.
pub fn read_blob<F>(file: &File, geometry: PageGeometry, page_state: F, head: Offset) -> Result<Blob>
where
    F: Fn(PageIndex) -> Option<PageState>,
{
    let mut stream = Vec::new();
    for link in ChainWalker::new(file, geometry, page_state, head) {
        let (_, chunk) = link?;
        stream.extend_from_slice(&chunk.payload);
    }
    Blob::from_framed_bytes(&stream, head)
}

/// Reads just enough chunks to decode the name and content length.
pub fn read_metadata<F>(
    file: &File,
    geometry: PageGeometry,
    page_state: F,
    head: Offset,
) -> Result<BlobMetadata>
where
    F: Fn(PageIndex) -> Option<PageState>,
{
    let mut stream = Vec::new();
    for link in ChainWalker::new(file, geometry, page_state, head) {
        let (_, chunk) = link?;
        stream.extend_from_slice(&chunk.payload);
        if let Some((metadata, _)) = BlobMetadata::parse_prefix(&stream, head)? {
            return Ok(metadata);
        }
    }
    Err(BucketError::corrupt_data(head, "chain ended inside blob header"))
}

/// Collects the page indexes of the chain at `head`, in chain order.
pub fn chain_pages<F>(
    file: &File,
    geometry: PageGeometry,
    page_state: F,
    head: Offset,
) -> Result<Vec<PageIndex>>
where
    F: Fn(PageIndex) -> Option<PageState>,
{
    ChainWalker::new(file, geometry, page_state, head)
        .headers_only()
        .map(|link| link.map(|(index, _)| index))
        .collect()
}
