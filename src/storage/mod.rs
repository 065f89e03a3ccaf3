use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use crate::config::ConnectionConfig;
use crate::error::ClientError;
use crate::models::{
    BucketInfo, CopySource, DeleteError, DeleteObject, ObjectInfo, ObjectLockConfig, ObjectStat,
    Retention, Tags,
};

pub type ClientResult<T> = Result<T, ClientError>;

/// Shared handle to an underlying client / 底层客户端句柄
pub type ClientHandle = Arc<dyn StorageClient>;

/// HTTP verb of a presigned URL / 预签名请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignMethod {
    Get,
    Put,
    Delete,
}

impl PresignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresignMethod::Get => "GET",
            PresignMethod::Put => "PUT",
            PresignMethod::Delete => "DELETE",
        }
    }
}

/// Streaming object body / 对象读取流
///
/// The connection backing the body stays checked out until `release` is
/// called or the body is dropped.
#[async_trait]
pub trait ObjectBody: Send {
    /// Read the remaining body into memory / 读取剩余全部数据
    async fn read_all(&mut self) -> ClientResult<Bytes>;

    /// Give the connection back / 释放连接
    fn release(&mut self);
}

/// Underlying object storage client (primitive operations only) / 底层存储客户端接口
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Client name / 客户端名称
    fn name(&self) -> &str;

    // Buckets / 存储桶

    async fn make_bucket(&self, bucket: &str) -> ClientResult<()>;

    async fn list_buckets(&self) -> ClientResult<Vec<BucketInfo>>;

    async fn bucket_exists(&self, bucket: &str) -> ClientResult<bool>;

    async fn remove_bucket(&self, bucket: &str) -> ClientResult<()>;

    /// Lazily list objects; pages are fetched as the stream is polled / 惰性列举对象
    fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        recursive: bool,
    ) -> BoxStream<'static, ClientResult<ObjectInfo>>;

    /// `None` when the bucket carries no tag set / 无标签时返回None
    async fn get_bucket_tags(&self, bucket: &str) -> ClientResult<Option<Tags>>;

    async fn set_bucket_tags(&self, bucket: &str, tags: &Tags) -> ClientResult<()>;

    async fn delete_bucket_tags(&self, bucket: &str) -> ClientResult<()>;

    async fn get_object_lock_config(&self, bucket: &str) -> ClientResult<ObjectLockConfig>;

    // Objects / 对象

    /// Upload exactly `length` bytes read from `data` / 上传数据流
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &mut (dyn AsyncRead + Unpin + Send),
        length: u64,
        content_type: &str,
    ) -> ClientResult<()>;

    async fn fput_object(&self, bucket: &str, key: &str, file_path: &Path) -> ClientResult<()>;

    async fn fget_object(&self, bucket: &str, key: &str, file_path: &Path) -> ClientResult<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> ClientResult<Box<dyn ObjectBody>>;

    async fn remove_object(&self, bucket: &str, key: &str) -> ClientResult<()>;

    /// Delete many objects; per-item failures are returned, not raised / 批量删除
    async fn remove_objects(
        &self,
        bucket: &str,
        objects: Vec<DeleteObject>,
    ) -> ClientResult<Vec<DeleteError>>;

    async fn copy_object(&self, bucket: &str, key: &str, source: &CopySource) -> ClientResult<()>;

    async fn stat_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectStat>;

    async fn get_object_tags(&self, bucket: &str, key: &str) -> ClientResult<Option<Tags>>;

    async fn set_object_tags(&self, bucket: &str, key: &str, tags: &Tags) -> ClientResult<()>;

    async fn delete_object_tags(&self, bucket: &str, key: &str) -> ClientResult<()>;

    /// `None` when the object has no retention / 无保留设置时返回None
    async fn get_object_retention(&self, bucket: &str, key: &str) -> ClientResult<Option<Retention>>;

    // Presigned URLs / 预签名URL

    async fn presigned_get_object(&self, bucket: &str, key: &str, expires: Duration) -> ClientResult<String> {
        self.presigned_url(PresignMethod::Get, bucket, key, expires).await
    }

    async fn presigned_put_object(&self, bucket: &str, key: &str, expires: Duration) -> ClientResult<String> {
        self.presigned_url(PresignMethod::Put, bucket, key, expires).await
    }

    /// Generic presign primitive / 通用预签名
    async fn presigned_url(
        &self,
        method: PresignMethod,
        bucket: &str,
        key: &str,
        expires: Duration,
    ) -> ClientResult<String>;
}

/// Client factory trait / 客户端工厂
pub trait ClientFactory: Send + Sync {
    /// Client type name / 客户端类型名称
    fn client_type(&self) -> &'static str;

    /// Build a client for the given connection / 创建客户端实例
    fn connect(&self, config: &ConnectionConfig) -> ClientResult<ClientHandle>;
}

pub mod facade;

#[cfg(test)]
pub(crate) mod mock;

pub use facade::ObjectStorage;
