pub mod storage;
pub mod types;
pub mod utils;

pub use storage::{bucket::Bucket, config::BucketConfig};
pub use types::{
    Offset,
    blob::{Blob, BlobKey, BlobMetadata},
    error::{BucketError, Result},
};
