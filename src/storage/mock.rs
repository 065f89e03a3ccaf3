//! Recording in-memory client for facade tests / 测试用记录型客户端

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{ClientFactory, ClientHandle, ClientResult, ObjectBody, PresignMethod, StorageClient};
use crate::config::ConnectionConfig;
use crate::error::ClientError;
use crate::models::{
    BucketInfo, CopySource, DeleteError, DeleteObject, ObjectInfo, ObjectLockConfig, ObjectStat,
    Retention, Tags,
};

/// One recorded call / 调用记录
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    MakeBucket(String),
    ListBuckets,
    BucketExists(String),
    RemoveBucket(String),
    ListObjects { bucket: String, prefix: Option<String>, recursive: bool },
    GetBucketTags(String),
    SetBucketTags(String, Tags),
    DeleteBucketTags(String),
    GetObjectLockConfig(String),
    PutObject { bucket: String, key: String, data: Vec<u8>, length: u64, content_type: String },
    FPutObject { bucket: String, key: String, path: String },
    FGetObject { bucket: String, key: String, path: String },
    GetObject(String, String),
    RemoveObject(String, String),
    RemoveObjects(String, Vec<DeleteObject>),
    CopyObject { bucket: String, key: String, source: CopySource },
    StatObject(String, String),
    GetObjectTags(String, String),
    SetObjectTags(String, String, Tags),
    DeleteObjectTags(String, String),
    GetObjectRetention(String, String),
    Presign { method: PresignMethod, bucket: String, key: String, expires: Duration },
}

/// Mock client: records calls, answers from queued failures or defaults / 模拟客户端
#[derive(Default)]
pub struct MockClient {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<&'static str, VecDeque<ClientError>>>,
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub delete_failures: Mutex<Vec<DeleteError>>,
    pub fail_body_read: Mutex<bool>,
    pub released: Arc<AtomicUsize>,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue an error for the next call of `op` / 为下一次调用注入错误
    pub fn fail(&self, op: &'static str, error: ClientError) {
        self.failures.lock().entry(op).or_default().push_back(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn record(&self, op: &'static str, call: Call) -> ClientResult<()> {
        self.calls.lock().push(call);
        match self.failures.lock().get_mut(op).and_then(|queue| queue.pop_front()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

struct MockBody {
    data: Option<Vec<u8>>,
    fail: bool,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl ObjectBody for MockBody {
    async fn read_all(&mut self) -> ClientResult<Bytes> {
        if self.fail {
            return Err(ClientError::Transport("connection reset while reading body".to_string()));
        }
        Ok(Bytes::from(self.data.take().unwrap_or_default()))
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn make_bucket(&self, bucket: &str) -> ClientResult<()> {
        self.record("make_bucket", Call::MakeBucket(bucket.to_string()))
    }

    async fn list_buckets(&self) -> ClientResult<Vec<BucketInfo>> {
        self.record("list_buckets", Call::ListBuckets)?;
        Ok(vec![BucketInfo {
            name: "test-bucket".to_string(),
            creation_date: None,
        }])
    }

    async fn bucket_exists(&self, bucket: &str) -> ClientResult<bool> {
        self.record("bucket_exists", Call::BucketExists(bucket.to_string()))?;
        Ok(bucket == "test-bucket")
    }

    async fn remove_bucket(&self, bucket: &str) -> ClientResult<()> {
        self.record("remove_bucket", Call::RemoveBucket(bucket.to_string()))
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        recursive: bool,
    ) -> BoxStream<'static, ClientResult<ObjectInfo>> {
        let call = Call::ListObjects {
            bucket: bucket.to_string(),
            prefix: prefix.map(|p| p.to_string()),
            recursive,
        };
        if let Err(e) = self.record("list_objects", call) {
            return stream::iter(vec![Err(e)]).boxed();
        }
        let prefix = prefix.unwrap_or("").to_string();
        let mut keys: Vec<(String, u64)> = self
            .objects
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, data)| (key.clone(), data.len() as u64))
            .collect();
        keys.sort();
        stream::iter(keys.into_iter().map(|(key, size)| {
            Ok(ObjectInfo {
                key,
                size,
                last_modified: None,
                etag: None,
                is_dir: false,
            })
        }))
        .boxed()
    }

    async fn get_bucket_tags(&self, bucket: &str) -> ClientResult<Option<Tags>> {
        self.record("get_bucket_tags", Call::GetBucketTags(bucket.to_string()))?;
        Ok(None)
    }

    async fn set_bucket_tags(&self, bucket: &str, tags: &Tags) -> ClientResult<()> {
        self.record("set_bucket_tags", Call::SetBucketTags(bucket.to_string(), tags.clone()))
    }

    async fn delete_bucket_tags(&self, bucket: &str) -> ClientResult<()> {
        self.record("delete_bucket_tags", Call::DeleteBucketTags(bucket.to_string()))
    }

    async fn get_object_lock_config(&self, bucket: &str) -> ClientResult<ObjectLockConfig> {
        self.record("get_object_lock_config", Call::GetObjectLockConfig(bucket.to_string()))?;
        Ok(ObjectLockConfig {
            enabled: true,
            mode: None,
            period: None,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &mut (dyn AsyncRead + Unpin + Send),
        length: u64,
        content_type: &str,
    ) -> ClientResult<()> {
        let mut buf = Vec::new();
        data.take(length).read_to_end(&mut buf).await?;
        self.record(
            "put_object",
            Call::PutObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                data: buf.clone(),
                length,
                content_type: content_type.to_string(),
            },
        )?;
        self.objects.lock().insert(key.to_string(), buf);
        Ok(())
    }

    async fn fput_object(&self, bucket: &str, key: &str, file_path: &Path) -> ClientResult<()> {
        self.record(
            "fput_object",
            Call::FPutObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                path: file_path.display().to_string(),
            },
        )
    }

    async fn fget_object(&self, bucket: &str, key: &str, file_path: &Path) -> ClientResult<()> {
        self.record(
            "fget_object",
            Call::FGetObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                path: file_path.display().to_string(),
            },
        )?;
        let data = self.objects.lock().get(key).cloned().unwrap_or_default();
        tokio::fs::write(file_path, data).await?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ClientResult<Box<dyn ObjectBody>> {
        self.record("get_object", Call::GetObject(bucket.to_string(), key.to_string()))?;
        Ok(Box::new(MockBody {
            data: self.objects.lock().get(key).cloned(),
            fail: *self.fail_body_read.lock(),
            released: self.released.clone(),
        }))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.record("remove_object", Call::RemoveObject(bucket.to_string(), key.to_string()))
    }

    async fn remove_objects(
        &self,
        bucket: &str,
        objects: Vec<DeleteObject>,
    ) -> ClientResult<Vec<DeleteError>> {
        self.record("remove_objects", Call::RemoveObjects(bucket.to_string(), objects))?;
        Ok(self.delete_failures.lock().clone())
    }

    async fn copy_object(&self, bucket: &str, key: &str, source: &CopySource) -> ClientResult<()> {
        self.record(
            "copy_object",
            Call::CopyObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: source.clone(),
            },
        )
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectStat> {
        self.record("stat_object", Call::StatObject(bucket.to_string(), key.to_string()))?;
        Ok(ObjectStat {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: 12,
            ..ObjectStat::default()
        })
    }

    async fn get_object_tags(&self, bucket: &str, key: &str) -> ClientResult<Option<Tags>> {
        self.record("get_object_tags", Call::GetObjectTags(bucket.to_string(), key.to_string()))?;
        Ok(Some(Tags::for_object()))
    }

    async fn set_object_tags(&self, bucket: &str, key: &str, tags: &Tags) -> ClientResult<()> {
        self.record(
            "set_object_tags",
            Call::SetObjectTags(bucket.to_string(), key.to_string(), tags.clone()),
        )
    }

    async fn delete_object_tags(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.record("delete_object_tags", Call::DeleteObjectTags(bucket.to_string(), key.to_string()))
    }

    async fn get_object_retention(&self, bucket: &str, key: &str) -> ClientResult<Option<Retention>> {
        self.record("get_object_retention", Call::GetObjectRetention(bucket.to_string(), key.to_string()))?;
        Ok(None)
    }

    async fn presigned_url(
        &self,
        method: PresignMethod,
        bucket: &str,
        key: &str,
        expires: Duration,
    ) -> ClientResult<String> {
        self.record(
            "presigned_url",
            Call::Presign {
                method,
                bucket: bucket.to_string(),
                key: key.to_string(),
                expires,
            },
        )?;
        Ok(format!(
            "http://localhost:9000/{}/{}?X-Amz-Expires={}&method={}",
            bucket,
            key,
            expires.as_secs(),
            method.as_str()
        ))
    }
}

/// Factory handing out a prepared mock, or failing / 模拟工厂
pub struct MockFactory {
    pub client: Option<Arc<MockClient>>,
    pub error: Mutex<Option<ClientError>>,
}

impl MockFactory {
    pub fn with(client: Arc<MockClient>) -> Self {
        Self {
            client: Some(client),
            error: Mutex::new(None),
        }
    }

    pub fn failing(error: ClientError) -> Self {
        Self {
            client: None,
            error: Mutex::new(Some(error)),
        }
    }
}

impl ClientFactory for MockFactory {
    fn client_type(&self) -> &'static str {
        "mock"
    }

    fn connect(&self, _config: &ConnectionConfig) -> ClientResult<ClientHandle> {
        if let Some(error) = self.error.lock().take() {
            return Err(error);
        }
        let client: ClientHandle = self.client.clone().unwrap_or_else(MockClient::new);
        Ok(client)
    }
}
