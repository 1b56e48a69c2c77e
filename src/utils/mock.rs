use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use tempfile::env::temp_dir;

use crate::storage::{bucket::Bucket, config::BucketConfig};

pub fn get_unix_timestamp_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

pub fn create_temp_bucket_path() -> PathBuf {
    create_temp_bucket_path_with_prefix("pacul_test")
}

pub fn create_temp_bucket_path_with_prefix(prefix: &str) -> PathBuf {
    let mut temp_path = temp_dir();
    temp_path.push(format!(
        "{}_{}_{}.bucket",
        prefix,
        std::process::id(),
        get_unix_timestamp_nanos()
    ));
    temp_path
}

/// A bucket file in the temp dir, removed again on drop.
pub struct TempBucket {
    pub path: PathBuf,
    pub bucket: Option<Bucket>,
}

impl TempBucket {
    pub fn new() -> Self {
        Self {
            path: create_temp_bucket_path(),
            bucket: None,
        }
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            path: create_temp_bucket_path_with_prefix(prefix),
            bucket: None,
        }
    }

    pub fn create_bucket(
        &mut self,
        page_size: u32,
        page_count: u32,
    ) -> Result<&mut Bucket, Box<dyn std::error::Error>> {
        let bucket = Bucket::create(&self.path, page_size, page_count)?;
        Ok(self.bucket.insert(bucket))
    }

    pub fn create_default_bucket(&mut self) -> Result<&mut Bucket, Box<dyn std::error::Error>> {
        let bucket = Bucket::create_with(&self.path, &BucketConfig::default())?;
        Ok(self.bucket.insert(bucket))
    }

    /// Drops the current handle and opens the file again.
    pub fn reopen(&mut self) -> Result<&mut Bucket, Box<dyn std::error::Error>> {
        if let Some(bucket) = self.bucket.take() {
            bucket.close()?;
        }
        let bucket = Bucket::open(&self.path)?;
        Ok(self.bucket.insert(bucket))
    }

    pub fn get_bucket(&mut self) -> Option<&mut Bucket> {
        self.bucket.as_mut()
    }
}

impl Default for TempBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TempBucket {
    fn drop(&mut self) {
        self.bucket = None;
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
    }
}
