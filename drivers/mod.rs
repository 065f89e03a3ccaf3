//! 存储客户端实现 / Storage client implementations

pub mod s3;
