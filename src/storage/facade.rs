//! Object storage facade / 对象存储门面
//!
//! Each operation validates its arguments, delegates to the underlying
//! `StorageClient`, logs the outcome and hands errors back, translating the
//! few service codes callers care about.

use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};

use super::{ClientFactory, ClientHandle, PresignMethod};
use crate::config::ConnectionConfig;
use crate::drivers::s3::S3ClientFactory;
use crate::error::{ClientError, Result, StoreError};
use crate::logging::{log_debug, log_error, log_info, log_warn, Logger};
use crate::models::{
    canonical_delete_list, BucketCreation, BucketInfo, CopySource, DeleteError, DeleteItem,
    FileDownload, ObjectInfo, ObjectLockConfig, ObjectStat, Retention, TagInput, TagScope, Tags,
    DEFAULT_CONTENT_TYPE,
};
use crate::utils::base_name;

const CODE_BUCKET_ALREADY_OWNED: &str = "BucketAlreadyOwnedByYou";
const CODE_BUCKET_ALREADY_EXISTS: &str = "BucketAlreadyExists";
const CODE_NO_SUCH_KEY: &str = "NoSuchKey";
const CODE_NO_SUCH_BUCKET: &str = "NoSuchBucket";
const CODE_LOCK_CONFIG_NOT_FOUND: &str = "ObjectLockConfigurationNotFoundError";

/// Object storage facade / 对象存储门面
pub struct ObjectStorage {
    config: ConnectionConfig,
    client: ClientHandle,
    logger: Logger,
}

impl ObjectStorage {
    /// Connect with the built-in S3 client / 使用内置S3客户端连接
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Self::with_factory(config, &S3ClientFactory)
    }

    /// Connect through the given factory / 通过指定工厂连接
    pub fn with_factory(config: ConnectionConfig, factory: &dyn ClientFactory) -> Result<Self> {
        let logger = Logger::current(&config.host);
        Self::connect(config, factory, logger)
    }

    /// Same as `with_factory`, logging through `logger` from the first event on / 指定日志
    pub fn with_factory_and_logger(
        config: ConnectionConfig,
        factory: &dyn ClientFactory,
        logger: Logger,
    ) -> Result<Self> {
        Self::connect(config, factory, logger)
    }

    /// Wrap an already-built client / 包装已有客户端
    pub fn with_client(config: ConnectionConfig, client: ClientHandle) -> Result<Self> {
        let logger = Logger::current(&config.host);
        Self::check_config(&config, &logger)?;
        Ok(Self { config, client, logger })
    }

    /// Replace the logger of this instance / 替换日志
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    fn connect(config: ConnectionConfig, factory: &dyn ClientFactory, logger: Logger) -> Result<Self> {
        Self::check_config(&config, &logger)?;

        match factory.connect(&config) {
            Ok(client) => {
                log_info!(
                    logger,
                    client = factory.client_type(),
                    "Successfully connected to host: {}",
                    config.host
                );
                Ok(Self { config, client, logger })
            }
            Err(e) => {
                log_error!(logger, "Failed to connect to host: {}. Error: {}", config.host, e);
                Err(StoreError::Connection {
                    host: config.host.clone(),
                    source: e,
                })
            }
        }
    }

    fn check_config(config: &ConnectionConfig, logger: &Logger) -> Result<()> {
        if let Err(e) = config.validate() {
            log_error!(logger, "Invalid connection configuration: {}", e);
            return Err(e);
        }
        if config.access_key.is_empty() {
            log_warn!(logger, "access_key is empty");
        }
        if config.secret_key.is_empty() {
            log_warn!(logger, "secret_key is empty");
        }
        Ok(())
    }

    /// Connection configuration / 连接配置
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Underlying client / 底层客户端
    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    // ---------------------------------------------------------------- buckets

    /// Create a bucket; an existing one is reported, not raised / 创建存储桶
    pub async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation> {
        match self.client.make_bucket(bucket).await {
            Ok(()) => {
                log_info!(self.logger, bucket, "Bucket '{}' created successfully.", bucket);
                Ok(BucketCreation::Created)
            }
            Err(e)
                if e.is_code(CODE_BUCKET_ALREADY_OWNED) || e.is_code(CODE_BUCKET_ALREADY_EXISTS) =>
            {
                log_warn!(self.logger, bucket, "Bucket '{}' already exists.", bucket);
                Ok(BucketCreation::AlreadyExisted)
            }
            Err(e) => {
                log_error!(self.logger, bucket, "Error creating bucket '{}': {}", bucket, e);
                Err(e.into())
            }
        }
    }

    pub async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        match self.client.list_buckets().await {
            Ok(buckets) => {
                for b in &buckets {
                    log_debug!(self.logger, "Bucket: {}, Created on: {:?}", b.name, b.creation_date);
                }
                Ok(buckets)
            }
            Err(e) => {
                log_error!(self.logger, "Error listing buckets: {}", e);
                Err(e.into())
            }
        }
    }

    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.bucket_exists(bucket).await {
            Ok(true) => {
                log_info!(self.logger, bucket, "Bucket '{}' exists.", bucket);
                Ok(true)
            }
            Ok(false) => {
                log_info!(self.logger, bucket, "Bucket '{}' does not exist.", bucket);
                Ok(false)
            }
            Err(e) => {
                log_error!(self.logger, bucket, "Error checking if bucket '{}' exists: {}", bucket, e);
                Err(e.into())
            }
        }
    }

    pub async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        match self.client.remove_bucket(bucket).await {
            Ok(()) => {
                log_warn!(self.logger, bucket, "Bucket '{}' removed successfully.", bucket);
                Ok(())
            }
            Err(e) => {
                log_error!(self.logger, bucket, "Error removing bucket '{}': {}", bucket, e);
                Err(e.into())
            }
        }
    }

    /// Lazily list objects of a bucket / 惰性列举对象
    ///
    /// Each call starts a fresh listing; errors surface as stream items and
    /// are logged as they pass.
    pub fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        recursive: bool,
    ) -> BoxStream<'static, Result<ObjectInfo>> {
        log_debug!(self.logger, bucket, ?prefix, recursive, "Listing objects in bucket '{}'.", bucket);
        let logger = self.logger.clone();
        let bucket = bucket.to_string();
        self.client
            .list_objects(&bucket, prefix, recursive)
            .map(move |item| {
                item.map_err(|e| {
                    log_error!(logger, "Error listing objects in bucket '{}': {}", bucket, e);
                    StoreError::from(e)
                })
            })
            .boxed()
    }

    pub async fn get_bucket_tags(&self, bucket: &str) -> Result<Option<Tags>> {
        match self.client.get_bucket_tags(bucket).await {
            Ok(tags) => {
                log_debug!(self.logger, bucket, "Retrieved tags for bucket '{}'.", bucket);
                Ok(tags)
            }
            Err(e) => {
                log_error!(self.logger, bucket, "Error getting tags for bucket '{}': {}", bucket, e);
                Err(e.into())
            }
        }
    }

    pub async fn set_bucket_tags(&self, bucket: &str, tags: impl Into<TagInput>) -> Result<()> {
        let tags = match tags.into().into_tags(TagScope::Bucket) {
            Ok(tags) => tags,
            Err(e) => {
                log_error!(self.logger, bucket, "Error setting tags for bucket '{}': {}", bucket, e);
                return Err(e);
            }
        };
        match self.client.set_bucket_tags(bucket, &tags).await {
            Ok(()) => {
                log_info!(self.logger, bucket, "Set tags for bucket '{}'.", bucket);
                Ok(())
            }
            Err(e) => {
                log_error!(self.logger, bucket, "Error setting tags for bucket '{}': {}", bucket, e);
                Err(e.into())
            }
        }
    }

    pub async fn delete_bucket_tags(&self, bucket: &str) -> Result<()> {
        match self.client.delete_bucket_tags(bucket).await {
            Ok(()) => {
                log_info!(self.logger, bucket, "Deleted tags of bucket '{}'.", bucket);
                Ok(())
            }
            Err(e) => {
                log_error!(self.logger, bucket, "Error deleting tags of bucket '{}': {}", bucket, e);
                Err(e.into())
            }
        }
    }

    /// Object-lock configuration; `None` when the bucket has none / 获取对象锁配置
    pub async fn get_object_lock_config(&self, bucket: &str) -> Result<Option<ObjectLockConfig>> {
        match self.client.get_object_lock_config(bucket).await {
            Ok(config) => {
                log_debug!(self.logger, bucket, "Retrieved object lock configuration for bucket '{}'.", bucket);
                Ok(Some(config))
            }
            Err(e) if e.is_code(CODE_NO_SUCH_BUCKET) => {
                let message = format!("Bucket '{}' does not exist or cannot be accessed.", bucket);
                log_error!(self.logger, bucket, "{}", message);
                Err(StoreError::NotFound { message, source: e })
            }
            Err(e) if e.is_code(CODE_LOCK_CONFIG_NOT_FOUND) => {
                log_warn!(self.logger, bucket, "Bucket '{}' does not have an object lock configuration.", bucket);
                Ok(None)
            }
            Err(e) => {
                log_error!(
                    self.logger,
                    bucket,
                    "Error retrieving object lock configuration for bucket '{}': {}",
                    bucket,
                    e
                );
                Err(e.into())
            }
        }
    }

    // ---------------------------------------------------------------- objects

    /// Upload a seekable stream / 上传数据流
    ///
    /// The length is found by seeking to the end; the stream is then rewound
    /// to its start before the transfer.
    pub async fn upload_stream<R>(
        &self,
        bucket: &str,
        data: &mut R,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<()>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        let length = match measure(data).await {
            Ok(length) => length,
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error reading stream for '{}': {}", key, e);
                return Err(e.into());
            }
        };

        match self.client.put_object(bucket, key, data, length, content_type).await {
            Ok(()) => {
                log_debug!(self.logger, bucket, key, length, "File '{}' uploaded to bucket '{}'.", key, bucket);
                Ok(())
            }
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error uploading file '{}' to bucket '{}': {}", key, bucket, e);
                Err(e.into())
            }
        }
    }

    /// Upload a local file; the key defaults to the file name / 上传本地文件
    pub async fn upload_file(&self, bucket: &str, file_path: impl AsRef<Path>, key: Option<&str>) -> Result<()> {
        let file_path = file_path.as_ref();
        let is_file = tokio::fs::metadata(file_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            log_error!(self.logger, "File '{}' does not exist.", file_path.display());
            return Err(StoreError::FileNotFound(file_path.to_path_buf()));
        }

        let key = match key {
            Some(key) => key.to_string(),
            None => match base_name(file_path) {
                Some(name) => name,
                None => {
                    log_error!(self.logger, "File '{}' has no usable file name.", file_path.display());
                    return Err(StoreError::FileNotFound(file_path.to_path_buf()));
                }
            },
        };

        match self.client.fput_object(bucket, &key, file_path).await {
            Ok(()) => {
                log_debug!(
                    self.logger,
                    bucket,
                    "File '{}' uploaded to bucket '{}' as '{}'.",
                    file_path.display(),
                    bucket,
                    key
                );
                Ok(())
            }
            Err(e) => {
                log_error!(
                    self.logger,
                    bucket,
                    "Error uploading file '{}' to bucket '{}': {}",
                    file_path.display(),
                    bucket,
                    e
                );
                Err(e.into())
            }
        }
    }

    /// Download an object to a local file / 下载到本地文件
    ///
    /// A missing target directory is created when `force_create_dirs` is
    /// set. Otherwise the call logs an error and returns
    /// `FileDownload::MissingDirectory` without transferring anything.
    pub async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: impl AsRef<Path>,
        force_create_dirs: bool,
    ) -> Result<FileDownload> {
        let file_path = file_path.as_ref();
        let target_dir = file_path.parent().filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = target_dir {
            if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
                if !force_create_dirs {
                    log_error!(self.logger, "Destination folder structure '{}' does not exist.", dir.display());
                    return Ok(FileDownload::MissingDirectory);
                }
                if let Err(e) = tokio::fs::create_dir_all(dir).await {
                    log_error!(self.logger, "Error creating target directory '{}': {}", dir.display(), e);
                    return Err(e.into());
                }
                log_info!(self.logger, "Created target directory '{}'.", dir.display());
            }
        }

        match self.client.fget_object(bucket, key, file_path).await {
            Ok(()) => {
                log_debug!(
                    self.logger,
                    bucket,
                    key,
                    "File '{}' from bucket '{}' downloaded to '{}'.",
                    key,
                    bucket,
                    file_path.display()
                );
                Ok(FileDownload::Downloaded)
            }
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error downloading file '{}' from bucket '{}': {}", key, bucket, e);
                Err(e.into())
            }
        }
    }

    /// Download an object fully into memory / 下载到内存
    ///
    /// The connection is released before returning, whether reading
    /// succeeded or not.
    pub async fn download_stream(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let result = match self.client.get_object(bucket, key).await {
            Ok(mut body) => {
                let data = body.read_all().await;
                body.release();
                data
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(data) => {
                log_debug!(
                    self.logger,
                    bucket,
                    key,
                    size = data.len(),
                    "File '{}' from bucket '{}' downloaded as a memory stream.",
                    key,
                    bucket
                );
                Ok(data)
            }
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error downloading file '{}' from bucket '{}': {}", key, bucket, e);
                Err(e.into())
            }
        }
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        match self.client.remove_object(bucket, key).await {
            Ok(()) => {
                log_warn!(self.logger, bucket, key, "File '{}' deleted from bucket '{}'.", key, bucket);
                Ok(())
            }
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error deleting file '{}' from bucket '{}': {}", key, bucket, e);
                Err(e.into())
            }
        }
    }

    /// Delete many objects / 批量删除对象
    ///
    /// Items must be all `DeleteObject`s or all maps. Per-object failures are
    /// logged and returned; only a failure of the whole call is an error.
    pub async fn delete_objects<I>(&self, bucket: &str, items: I) -> Result<Vec<DeleteError>>
    where
        I: IntoIterator,
        I::Item: Into<DeleteItem>,
    {
        let items: Vec<DeleteItem> = items.into_iter().map(Into::into).collect();
        let objects = match canonical_delete_list(items) {
            Ok(objects) => objects,
            Err(e) => {
                log_error!(self.logger, bucket, "Error removing objects from bucket '{}': {}", bucket, e);
                return Err(e);
            }
        };

        match self.client.remove_objects(bucket, objects).await {
            Ok(failures) => {
                for failure in &failures {
                    log_error!(self.logger, bucket, "Failed to delete object: {}", failure);
                }
                log_warn!(self.logger, bucket, "Removed objects from bucket '{}'.", bucket);
                Ok(failures)
            }
            Err(e) => {
                log_error!(self.logger, bucket, "Error removing objects from bucket '{}': {}", bucket, e);
                Err(e.into())
            }
        }
    }

    /// Server-side copy from `source` given as `bucket/key` / 复制对象
    pub async fn copy_object(&self, bucket: &str, key: &str, source: &str) -> Result<()> {
        let copy_source = match CopySource::parse(source) {
            Ok(copy_source) => copy_source,
            Err(e) => {
                log_error!(self.logger, "Error copying object '{}' to '{}/{}': {}", source, bucket, key, e);
                return Err(e);
            }
        };
        match self.client.copy_object(bucket, key, &copy_source).await {
            Ok(()) => {
                log_info!(self.logger, "Copied object '{}' to '{}/{}'.", source, bucket, key);
                Ok(())
            }
            Err(e) => {
                log_error!(self.logger, "Error copying object '{}' to '{}/{}': {}", source, bucket, key, e);
                Err(e.into())
            }
        }
    }

    /// Object metadata; `NoSuchKey` becomes `StoreError::NotFound` / 获取对象元数据
    pub async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectStat> {
        match self.client.stat_object(bucket, key).await {
            Ok(stat) => {
                log_debug!(self.logger, bucket, key, "Retrieved metadata for object '{}' in bucket '{}'.", key, bucket);
                Ok(stat)
            }
            Err(e) if e.is_code(CODE_NO_SUCH_KEY) => {
                let message = format!(
                    "Cannot access '{}': Invalid path or it does not correspond to a file object.",
                    key
                );
                log_error!(self.logger, bucket, key, "{}", message);
                Err(StoreError::NotFound { message, source: e })
            }
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error getting metadata for object '{}': {}", key, e);
                Err(e.into())
            }
        }
    }

    pub async fn get_object_tags(&self, bucket: &str, key: &str) -> Result<Option<Tags>> {
        match self.client.get_object_tags(bucket, key).await {
            Ok(tags) => {
                log_debug!(self.logger, bucket, key, "Retrieved tags for object '{}' in bucket '{}'.", key, bucket);
                Ok(tags)
            }
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error getting tags for object '{}': {}", key, e);
                Err(e.into())
            }
        }
    }

    pub async fn set_object_tags(&self, bucket: &str, key: &str, tags: impl Into<TagInput>) -> Result<()> {
        let tags = match tags.into().into_tags(TagScope::Object) {
            Ok(tags) => tags,
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error setting tags for object '{}': {}", key, e);
                return Err(e);
            }
        };
        match self.client.set_object_tags(bucket, key, &tags).await {
            Ok(()) => {
                log_info!(self.logger, bucket, key, "Set tags for object '{}' in bucket '{}'.", key, bucket);
                Ok(())
            }
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error setting tags for object '{}': {}", key, e);
                Err(e.into())
            }
        }
    }

    pub async fn delete_object_tags(&self, bucket: &str, key: &str) -> Result<()> {
        match self.client.delete_object_tags(bucket, key).await {
            Ok(()) => {
                log_info!(self.logger, bucket, key, "Deleted tags of object '{}' in bucket '{}'.", key, bucket);
                Ok(())
            }
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error deleting tags of object '{}': {}", key, e);
                Err(e.into())
            }
        }
    }

    pub async fn get_object_retention(&self, bucket: &str, key: &str) -> Result<Option<Retention>> {
        match self.client.get_object_retention(bucket, key).await {
            Ok(retention) => {
                log_debug!(self.logger, bucket, key, "Retrieved retention for object '{}' in bucket '{}'.", key, bucket);
                Ok(retention)
            }
            Err(e) => {
                log_error!(self.logger, bucket, key, "Error getting retention for object '{}': {}", key, e);
                Err(e.into())
            }
        }
    }

    // ---------------------------------------------------------- presigned URLs

    /// Presigned download URL / 预签名下载URL
    pub async fn presigned_get_url(&self, bucket: &str, key: &str, expires: Option<Duration>) -> Result<String> {
        let expires = expires.unwrap_or_else(|| self.config.default_presigned_expiry());
        let result = self.client.presigned_get_object(bucket, key, expires).await;
        self.log_presign(PresignMethod::Get, key, result)
    }

    /// Presigned upload URL / 预签名上传URL
    pub async fn presigned_put_url(&self, bucket: &str, key: &str, expires: Option<Duration>) -> Result<String> {
        let expires = expires.unwrap_or_else(|| self.config.default_presigned_expiry());
        let result = self.client.presigned_put_object(bucket, key, expires).await;
        self.log_presign(PresignMethod::Put, key, result)
    }

    /// Presigned delete URL, built with the generic presign primitive / 预签名删除URL
    pub async fn presigned_delete_url(&self, bucket: &str, key: &str, expires: Option<Duration>) -> Result<String> {
        let expires = expires.unwrap_or_else(|| self.config.default_presigned_expiry());
        let result = self
            .client
            .presigned_url(PresignMethod::Delete, bucket, key, expires)
            .await;
        self.log_presign(PresignMethod::Delete, key, result)
    }

    fn log_presign(&self, method: PresignMethod, key: &str, result: Result<String, ClientError>) -> Result<String> {
        match result {
            Ok(url) => {
                log_debug!(self.logger, "Generated presigned URL for {} request: {}", method.as_str(), url);
                Ok(url)
            }
            Err(e) => {
                log_error!(
                    self.logger,
                    key,
                    "Error generating presigned {} URL for object '{}': {}",
                    method.as_str(),
                    key,
                    e
                );
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("host", &self.config.host)
            .field("secure", &self.config.secure)
            .field("client", &self.client.name())
            .finish()
    }
}

/// Seek to the end to learn the length, then back to the start / 计算流长度
async fn measure<R>(data: &mut R) -> std::io::Result<u64>
where
    R: AsyncSeek + Unpin,
{
    let length = data.seek(SeekFrom::End(0)).await?;
    data.seek(SeekFrom::Start(0)).await?;
    Ok(length)
}
