//! s3kit: a thin convenience layer over an S3-compatible object store.
//!
//! `ObjectStorage` wraps a `StorageClient` (by default the rust-s3 backed
//! `drivers::s3::S3Client`), adds logging and error translation, and
//! `utils` carries the path helpers `normalize` and `join`.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod storage;
pub mod utils;

// Client implementations live in the project root drivers directory / 客户端实现
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use config::ConnectionConfig;
pub use error::{ClientError, StoreError};
pub use logging::Logger;
pub use models::{
    BucketCreation, BucketInfo, CopySource, DeleteError, DeleteItem, DeleteObject, FileDownload,
    ObjectInfo, ObjectLockConfig, ObjectStat, Retention, RetentionMode, RetentionPeriod, TagInput,
    TagScope, Tags,
};
pub use storage::{ClientFactory, ObjectStorage, PresignMethod, StorageClient};
pub use utils::{join, normalize};
