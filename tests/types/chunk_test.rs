use pacul_bucket::types::{
    CHUNK_HEADER_SIZE,
    blob::{Blob, BlobMetadata},
    error::BucketError,
    page::{Chunk, ChunkHeader},
};

// Splits a framed stream the same way pages would, returning encoded chunks.
fn split_into_chunks(framed: &[u8], capacity: usize, first_offset: u64) -> Vec<Vec<u8>> {
    let pieces: Vec<&[u8]> = framed.chunks(capacity).collect();
    pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| {
            let next = if i + 1 < pieces.len() {
                first_offset + (i as u64 + 1) * (capacity + CHUNK_HEADER_SIZE) as u64
            } else {
                0
            };
            Chunk::new(next, piece.to_vec()).to_bytes()
        })
        .collect()
}

#[test]
fn test_framing_is_contiguous_across_chunks() {
    let blob = Blob::new("report.csv", b"id,value\n1,42\n".to_vec());
    let framed = blob.to_framed_bytes();
    let encoded = split_into_chunks(&framed, 4, 24);
    assert_eq!(encoded.len(), framed.len().div_ceil(4));

    let mut stream = Vec::new();
    let mut last_next = u64::MAX;
    for (i, bytes) in encoded.iter().enumerate() {
        let chunk = Chunk::from_bytes(bytes, 24 + i as u64 * 16, 4).unwrap();
        last_next = chunk.next_offset();
        stream.extend_from_slice(&chunk.payload);
    }

    assert_eq!(last_next, 0);
    assert_eq!(Blob::from_framed_bytes(&stream, 24).unwrap(), blob);
}

#[test]
fn test_metadata_available_before_content() {
    let blob = Blob::new("a", vec![0u8; 1000]);
    let framed = blob.to_framed_bytes();

    // name_length + "a" + content_length fit in the first two 4-byte chunks
    let (metadata, content_start) = BlobMetadata::parse_prefix(&framed[..8], 24)
        .unwrap()
        .unwrap();
    assert_eq!(metadata, blob.metadata());
    assert_eq!(content_start, 7);
}

#[test]
fn test_chunk_header_rejects_negative_next_offset() {
    let mut bytes = ChunkHeader {
        next_offset: 0,
        payload_length: 1,
    }
    .to_bytes();
    bytes[0] = 0x80;

    assert!(matches!(
        ChunkHeader::from_bytes(&bytes, 24, 4),
        Err(BucketError::CorruptData { offset: 24, .. })
    ));
}

#[test]
fn test_trailing_bytes_after_content_are_corrupt() {
    let mut framed = Blob::new("a", b"01".to_vec()).to_framed_bytes();
    framed.push(0);

    assert!(matches!(
        Blob::from_framed_bytes(&framed, 24),
        Err(BucketError::CorruptData { .. })
    ));
}

#[test]
fn test_invalid_utf8_name_is_corrupt() {
    let framed = vec![0, 2, 0xff, 0xfe, 0, 0, 0, 0];
    assert!(matches!(
        BlobMetadata::parse_prefix(&framed, 40),
        Err(BucketError::CorruptData { offset: 40, .. })
    ));
}
