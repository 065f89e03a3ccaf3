//! S3/MinIO客户端
//!
//! 基于rust-s3，路径风格寻址，兼容MinIO

mod config;
mod driver;
mod factory;
mod xml;

pub use config::S3Settings;
pub use driver::{presign_expiry_secs, S3Client, S3ObjectBody};
pub use factory::S3ClientFactory;
