use std::fs;

use pacul_bucket::{
    types::error::{BucketError, Result},
    utils::mock::TempBucket,
};

fn create_test_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_upload_and_get_round_trip() -> Result<()> {
    let mut temp = TempBucket::with_prefix("round_trip");
    let bucket = temp.create_default_bucket().unwrap();

    let offset = bucket.upload("hello-world.txt", b"Hello World")?;
    let blob = bucket.get("hello-world.txt")?;
    assert_eq!(blob.name, "hello-world.txt");
    assert_eq!(blob.content, b"Hello World");

    let by_offset = bucket.get(offset)?;
    assert_eq!(by_offset, blob);
    Ok(())
}

#[test]
fn test_blob_spanning_many_pages() -> Result<()> {
    let mut temp = TempBucket::with_prefix("many_pages");
    let bucket = temp.create_bucket(64, 512).unwrap();

    let content = create_test_content(10_000);
    bucket.upload("large", &content)?;

    // (2 + 5 + 4 + 10_000) / 52 rounded up
    assert_eq!(bucket.free_pages(), 512 - 193);
    assert_eq!(bucket.get("large")?.content, content);
    assert_eq!(bucket.get_metadata("large")?.size, 10_000);
    Ok(())
}

#[test]
fn test_empty_content() -> Result<()> {
    let mut temp = TempBucket::with_prefix("empty_content");
    let bucket = temp.create_bucket(16, 4).unwrap();

    bucket.upload("e", b"")?;
    assert!(bucket.get("e")?.content.is_empty());
    assert_eq!(bucket.get_metadata("e")?.size, 0);
    Ok(())
}

#[test]
fn test_metadata_unaffected_by_other_blobs() -> Result<()> {
    let mut temp = TempBucket::with_prefix("metadata");
    let bucket = temp.create_bucket(32, 64).unwrap();

    bucket.upload("keep", &create_test_content(100))?;
    bucket.upload("other", &create_test_content(40))?;
    bucket.delete("other")?;
    bucket.upload("another", &create_test_content(300))?;

    let metadata = bucket.get_metadata("keep")?;
    assert_eq!(metadata.name, "keep");
    assert_eq!(metadata.size, 100);
    Ok(())
}

#[test]
fn test_duplicate_upload_is_rejected() -> Result<()> {
    let mut temp = TempBucket::with_prefix("duplicate");
    let bucket = temp.create_default_bucket().unwrap();

    bucket.upload("duplicateBlob", b"Duplicate Content")?;
    let result = bucket.upload("duplicateBlob", b"something else");

    match result {
        Err(BucketError::AlreadyExists { name }) => assert_eq!(name, "duplicateBlob"),
        other => panic!("Expected AlreadyExists, got {:?}", other),
    }
    assert_eq!(bucket.get("duplicateBlob")?.content, b"Duplicate Content");
    Ok(())
}

#[test]
fn test_invalid_names_are_rejected() {
    let mut temp = TempBucket::with_prefix("invalid_names");
    let bucket = temp.create_default_bucket().unwrap();

    for name in ["", "a/b", "a\\b"] {
        assert!(matches!(
            bucket.upload(name, b"x"),
            Err(BucketError::Validation { .. })
        ));
    }
    let too_long = "n".repeat(65_536);
    assert!(matches!(
        bucket.upload(&too_long, b"x"),
        Err(BucketError::Validation { .. })
    ));
    assert!(bucket.list_blobs().is_empty());
}

#[test]
fn test_missing_keys_are_not_found() -> Result<()> {
    let mut temp = TempBucket::with_prefix("not_found");
    let bucket = temp.create_bucket(16, 8).unwrap();
    let offset = bucket.upload("a", b"01")?;

    assert!(matches!(bucket.get("b"), Err(BucketError::NotFound { .. })));
    assert!(matches!(
        bucket.get_metadata("b"),
        Err(BucketError::NotFound { .. })
    ));
    assert!(matches!(bucket.delete("b"), Err(BucketError::NotFound { .. })));

    // Offsets only resolve when they are the head of a live blob
    assert!(matches!(
        bucket.get(offset + 16),
        Err(BucketError::NotFound { .. })
    ));

    bucket.delete(offset)?;
    assert!(matches!(bucket.get(offset), Err(BucketError::NotFound { .. })));
    assert!(matches!(bucket.get("a"), Err(BucketError::NotFound { .. })));
    Ok(())
}

#[test]
fn test_small_page_scenario() -> Result<()> {
    let mut temp = TempBucket::with_prefix("small_pages");
    let bucket = temp.create_bucket(16, 4).unwrap();

    // 17 framed bytes need 5 pages of 4 payload bytes
    assert!(matches!(
        bucket.upload("a", b"0123456789"),
        Err(BucketError::OutOfSpace { .. })
    ));

    // 9 framed bytes -> 3 pages
    let head_a = bucket.upload("a", b"01")?;
    assert_eq!(head_a, 24);
    assert_eq!(bucket.free_pages(), 1);

    // 8 framed bytes -> 2 pages, only 1 free
    assert!(matches!(
        bucket.upload("b", b"x"),
        Err(BucketError::OutOfSpace {
            requested: 8,
            available: 4
        })
    ));

    bucket.delete("a")?;
    assert_eq!(bucket.free_pages(), 4);

    let head_b = bucket.upload("b", b"x")?;
    assert_eq!(head_b, 24);
    assert_eq!(bucket.free_pages(), 2);
    assert_eq!(bucket.get("b")?.content, b"x");
    Ok(())
}

#[test]
fn test_space_reuse_across_scattered_pages() -> Result<()> {
    let mut temp = TempBucket::with_prefix("fragmentation");
    let bucket = temp.create_bucket(16, 8).unwrap();

    // each takes 2 pages: 2 + 1 + 4 + 1 = 8 framed bytes
    for name in ["a", "b", "c", "d"] {
        bucket.upload(name, b"x")?;
    }
    assert_eq!(bucket.free_pages(), 0);

    bucket.delete("a")?;
    bucket.delete("c")?;
    assert_eq!(bucket.free_pages(), 4);

    // 2 + 1 + 4 + 9 = 16 bytes -> 4 pages: 0, 1, 4, 5
    let head = bucket.upload("e", b"012345678")?;
    assert_eq!(head, 28);
    assert_eq!(bucket.free_pages(), 0);
    assert_eq!(bucket.get("e")?.content, b"012345678");
    assert_eq!(bucket.get("b")?.content, b"x");
    assert_eq!(bucket.get("d")?.content, b"x");
    Ok(())
}

#[test]
fn test_out_of_space_leaves_file_untouched() -> Result<()> {
    let mut temp = TempBucket::with_prefix("oos_atomic");
    let path = temp.path.clone();
    let bucket = temp.create_bucket(16, 6).unwrap();

    bucket.upload("a", b"01")?;
    let before = fs::read(&path)?;
    let header_before = bucket.header();

    let result = bucket.upload("big", &create_test_content(64));
    assert!(matches!(result, Err(BucketError::OutOfSpace { .. })));

    assert_eq!(fs::read(&path)?, before);
    assert_eq!(bucket.header(), header_before);
    assert_eq!(bucket.list_blobs().len(), 1);
    Ok(())
}

#[test]
fn test_directory_offset_never_shrinks() -> Result<()> {
    let mut temp = TempBucket::with_prefix("directory_offset");
    let bucket = temp.create_bucket(16, 8).unwrap();
    assert_eq!(bucket.header().directory_offset, 28);

    bucket.upload("a", b"0123456789")?; // 17 bytes -> pages 0..=4
    assert_eq!(bucket.header().directory_offset, 28 + 5 * 16);

    bucket.delete("a")?;
    assert_eq!(bucket.header().directory_offset, 28 + 5 * 16);

    bucket.upload("b", b"x")?;
    assert_eq!(bucket.header().directory_offset, 28 + 5 * 16);
    Ok(())
}

#[test]
fn test_list_blobs_is_a_snapshot() -> Result<()> {
    let mut temp = TempBucket::with_prefix("list");
    let bucket = temp.create_default_bucket().unwrap();

    let foo = bucket.upload("foo.txt", b"Foodfdf")?;
    let bar = bucket.upload("bar.txt", b"bar")?;
    let listing = bucket.list_blobs();
    bucket.delete("foo.txt")?;

    assert_eq!(listing.len(), 2);
    assert_eq!(listing["foo.txt"], foo);
    assert_eq!(listing["bar.txt"], bar);
    assert_eq!(bucket.list_blobs().len(), 1);
    Ok(())
}
