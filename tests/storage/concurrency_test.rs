use std::thread;

use pacul_bucket::{Bucket, types::error::BucketError, utils::mock::TempBucket};

fn content_for(i: usize) -> Vec<u8> {
    format!("blob_{:04}_", i).repeat(i % 7 + 1).into_bytes()
}

#[test]
fn test_readers_run_alongside_writer() {
    let mut temp = TempBucket::with_prefix("concurrent_readers");
    let bucket: &Bucket = temp.create_bucket(64, 2048).unwrap();

    for i in 0..20 {
        bucket.upload(&format!("stable_{}", i), &content_for(i)).unwrap();
    }

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..100 {
                bucket.upload(&format!("new_{}", i), &content_for(i)).unwrap();
            }
        });

        for reader in 0..4 {
            s.spawn(move || {
                for round in 0..50 {
                    let i = (reader * 7 + round) % 20;
                    let name = format!("stable_{}", i);
                    let blob = bucket.get(name.as_str()).unwrap();
                    assert_eq!(blob.content, content_for(i));
                    assert_eq!(
                        bucket.get_metadata(name.as_str()).unwrap().size,
                        content_for(i).len() as u64
                    );
                }
            });
        }
    });

    assert_eq!(bucket.list_blobs().len(), 120);
}

#[test]
fn test_concurrent_uploads_of_same_name() {
    let mut temp = TempBucket::with_prefix("concurrent_same_name");
    let bucket: &Bucket = temp.create_bucket(64, 256).unwrap();

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| s.spawn(move || bucket.upload("contested", &content_for(i))))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let stored = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(BucketError::AlreadyExists { .. })))
        .count();
    assert_eq!(stored, 1);
    assert_eq!(rejected, 7);
    assert_eq!(bucket.list_blobs().len(), 1);
}
