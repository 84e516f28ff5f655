//! S3-compatible artifact storage.
//!
//! Implements the pipeline's upload collaborator against any S3 API
//! endpoint. Uploads are atomic per call from the pipeline's point of
//! view: the first failed object fails the whole batch.

pub mod client;
pub mod error;
pub mod uploader;

pub use client::{ObjectStoreClient, ObjectStoreConfig};
pub use error::{StorageError, StorageResult};
pub use uploader::S3ArtifactUploader;
