//! S3客户端核心实现 / S3 client
//!
//! 设计原则：
//! - 只提供原语，门面负责日志与错误翻译
//! - 对象读写、批量删除使用rust-s3，rust-s3未暴露的子资源（tagging、
//!   retention、object-lock、桶操作、服务端复制）使用预签名URL + reqwest
//! - 流式读取，下载到文件时先写`.part`再重命名

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::request::ResponseData;
use s3::serde_types::ObjectIdentifier;
use s3::Region;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use super::config::S3Settings;
use super::xml;
use crate::config::MAX_PRESIGNED_EXPIRY;
use crate::error::ClientError;
use crate::models::{
    parse_timestamp, BucketInfo, CopySource, DeleteError, DeleteObject, ObjectInfo,
    ObjectLockConfig, ObjectStat, Retention, TagScope, Tags, DEFAULT_CONTENT_TYPE,
};
use crate::storage::{ClientResult, ObjectBody, PresignMethod, StorageClient};

/// 内部子资源请求的签名有效期
const REQUEST_EXPIRY_SECS: u32 = 300;

const US_EAST_1: &str = "us-east-1";

const COPY_SOURCE_HEADER: &str = "x-amz-copy-source";

impl From<S3Error> for ClientError {
    fn from(e: S3Error) -> Self {
        match e {
            S3Error::HttpFailWithBody(status, body) => xml::parse_error(status, &body),
            other => ClientError::Transport(other.to_string()),
        }
    }
}

/// Convert a presign expiry into whole seconds / 校验预签名有效期
pub fn presign_expiry_secs(expires: Duration) -> ClientResult<u32> {
    let secs = expires.as_secs();
    if !(1..=MAX_PRESIGNED_EXPIRY.as_secs()).contains(&secs) {
        return Err(ClientError::InvalidArgument(format!(
            "presigned URL expiry must be between 1 second and 7 days, got {}s",
            secs
        )));
    }
    u32::try_from(secs).map_err(|_| ClientError::InvalidArgument(format!("expiry {}s is too large", secs)))
}

/// Fail on a non-2xx rust-s3 response / 检查rust-s3响应状态
fn check_response(data: ResponseData) -> ClientResult<ResponseData> {
    let status = data.status_code();
    if (200..300).contains(&status) {
        Ok(data)
    } else {
        Err(xml::parse_error(status, &String::from_utf8_lossy(data.bytes())))
    }
}

/// Fail on a non-2xx reqwest response / 检查HTTP响应状态
async fn check_http(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(xml::parse_error(status.as_u16(), &body))
}

/// S3客户端
#[derive(Clone)]
pub struct S3Client {
    settings: S3Settings,
    region: Region,
    credentials: Credentials,
    http: reqwest::Client,
}

impl S3Client {
    /// 创建新的S3客户端实例
    pub fn new(settings: S3Settings) -> ClientResult<Self> {
        let credentials = if settings.is_anonymous() {
            Credentials::anonymous()
        } else {
            Credentials::new(
                Some(&settings.access_key),
                Some(&settings.secret_key),
                None,
                None,
                None,
            )
        }
        .map_err(|e| ClientError::InvalidArgument(format!("创建S3凭证失败: {}", e)))?;

        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        };

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Transport(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            settings,
            region,
            credentials,
            http,
        })
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }

    /// 创建S3 Bucket句柄
    fn bucket(&self, name: &str) -> ClientResult<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())?;
        Ok(if self.settings.force_path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }

    /// Presign a sub-resource request / 为子资源请求签名
    async fn sign(
        &self,
        method: PresignMethod,
        bucket: &str,
        path: &str,
        query: &[(&str, &str)],
        expiry_secs: u32,
    ) -> ClientResult<String> {
        let handle = self.bucket(bucket)?;
        let queries = (!query.is_empty()).then(|| {
            query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<String, String>>()
        });
        let url = match method {
            PresignMethod::Get => handle.presign_get(path, expiry_secs, queries).await?,
            PresignMethod::Put => handle.presign_put(path, expiry_secs, None, queries).await?,
            PresignMethod::Delete => handle.presign_delete(path, expiry_secs).await?,
        };
        Ok(url)
    }

    /// Signed GET, failing on error status / 签名GET请求
    async fn get(&self, bucket: &str, path: &str, query: &[(&str, &str)]) -> ClientResult<reqwest::Response> {
        let url = self.sign(PresignMethod::Get, bucket, path, query, REQUEST_EXPIRY_SECS).await?;
        check_http(self.http.get(url).send().await?).await
    }

    /// Signed GET returning the body text / 签名GET并读取文本
    async fn get_text(&self, bucket: &str, path: &str, query: &[(&str, &str)]) -> ClientResult<String> {
        Ok(self.get(bucket, path, query).await?.text().await?)
    }

    /// Signed PUT of an XML body with Content-MD5 / 签名PUT请求
    async fn put_xml(&self, bucket: &str, path: &str, query: &[(&str, &str)], body: String) -> ClientResult<()> {
        let url = self.sign(PresignMethod::Put, bucket, path, query, REQUEST_EXPIRY_SECS).await?;
        let digest = md5::compute(body.as_bytes());
        let content_md5 = base64::engine::general_purpose::STANDARD.encode(digest.0);

        let mut request = self.http.put(url).header("Content-MD5", content_md5);
        if !body.is_empty() {
            request = request.header("Content-Type", "application/xml");
        }
        check_http(request.body(body).send().await?).await?;
        Ok(())
    }

    /// 获取一页对象列表（ListObjectsV2）
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
        token: Option<&str>,
    ) -> ClientResult<xml::ListPage> {
        let mut query = vec![("list-type", "2"), ("prefix", prefix)];
        if !recursive {
            query.push(("delimiter", "/"));
        }
        if let Some(token) = token {
            query.push(("continuation-token", token));
        }
        let body = self.get_text(bucket, "/", &query).await?;
        xml::parse_list_page(&body)
    }

    async fn get_tags(&self, bucket: &str, path: &str, scope: TagScope) -> ClientResult<Option<Tags>> {
        match self.get_text(bucket, path, &[("tagging", "")]).await {
            Ok(body) => xml::parse_tagging(&body, scope),
            Err(e) if e.is_code("NoSuchTagSet") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put_tags(&self, bucket: &str, path: &str, tags: &Tags) -> ClientResult<()> {
        self.put_xml(bucket, path, &[("tagging", "")], xml::tagging_document(tags))
            .await
    }

    /// Open a streaming GET of an object / 打开对象下载流
    async fn open(&self, bucket: &str, key: &str) -> ClientResult<reqwest::Response> {
        self.get(bucket, key, &[]).await
    }

    async fn write_part_file(response: &mut reqwest::Response, part: &Path) -> ClientResult<()> {
        let mut file = tokio::fs::File::create(part).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// 流式对象内容，持有HTTP响应直到释放
pub struct S3ObjectBody {
    response: Option<reqwest::Response>,
}

impl S3ObjectBody {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response: Some(response),
        }
    }
}

#[async_trait]
impl ObjectBody for S3ObjectBody {
    async fn read_all(&mut self) -> ClientResult<Bytes> {
        let Some(response) = self.response.as_mut() else {
            return Err(ClientError::InvalidArgument("object body already released".to_string()));
        };
        let mut buf = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    fn release(&mut self) {
        self.response.take();
    }
}

#[async_trait]
impl StorageClient for S3Client {
    fn name(&self) -> &str {
        "S3"
    }

    async fn make_bucket(&self, bucket: &str) -> ClientResult<()> {
        let body = if self.settings.region.is_empty() || self.settings.region == US_EAST_1 {
            String::new()
        } else {
            format!(
                "<CreateBucketConfiguration><LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>",
                quick_xml::escape::escape(&self.settings.region)
            )
        };
        tracing::debug!(bucket = %bucket, region = %self.settings.region, "S3 CreateBucket");
        self.put_xml(bucket, "/", &[], body).await
    }

    async fn list_buckets(&self) -> ClientResult<Vec<BucketInfo>> {
        let response = Bucket::list_buckets(self.region.clone(), self.credentials.clone()).await?;
        Ok(response
            .buckets
            .bucket
            .into_iter()
            .map(|b| BucketInfo {
                creation_date: parse_timestamp(&b.creation_date.to_string()),
                name: b.name,
            })
            .collect())
    }

    async fn bucket_exists(&self, bucket: &str) -> ClientResult<bool> {
        // HEAD /bucket/（HeadBucket）
        let handle = self.bucket(bucket)?;
        let (_, status) = handle.head_object("/").await?;
        match status {
            200..=299 => Ok(true),
            404 => Ok(false),
            other => Err(xml::parse_error(other, "")),
        }
    }

    async fn remove_bucket(&self, bucket: &str) -> ClientResult<()> {
        let url = self.sign(PresignMethod::Delete, bucket, "/", &[], REQUEST_EXPIRY_SECS).await?;
        check_http(self.http.delete(url).send().await?).await?;
        Ok(())
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        recursive: bool,
    ) -> BoxStream<'static, ClientResult<ObjectInfo>> {
        let client = self.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.unwrap_or_default().to_string();

        // 状态：(下一页令牌, 是否已结束)
        stream::try_unfold((None::<String>, false), move |(token, done)| {
            let client = client.clone();
            let bucket = bucket.clone();
            let prefix = prefix.clone();
            async move {
                if done {
                    return Ok::<_, ClientError>(None);
                }
                let page = client
                    .list_page(&bucket, &prefix, recursive, token.as_deref())
                    .await?;
                tracing::debug!(bucket = %bucket, count = page.objects.len(), "S3 ListObjectsV2 page");
                let finished = page.next_token.is_none();
                Ok(Some((page.objects, (page.next_token, finished))))
            }
        })
        .map_ok(|objects| stream::iter(objects.into_iter().map(Ok::<ObjectInfo, ClientError>)))
        .try_flatten()
        .boxed()
    }

    async fn get_bucket_tags(&self, bucket: &str) -> ClientResult<Option<Tags>> {
        self.get_tags(bucket, "/", TagScope::Bucket).await
    }

    async fn set_bucket_tags(&self, bucket: &str, tags: &Tags) -> ClientResult<()> {
        self.put_tags(bucket, "/", tags).await
    }

    async fn delete_bucket_tags(&self, bucket: &str) -> ClientResult<()> {
        self.put_tags(bucket, "/", &Tags::for_bucket()).await
    }

    async fn get_object_lock_config(&self, bucket: &str) -> ClientResult<ObjectLockConfig> {
        let body = self.get_text(bucket, "/", &[("object-lock", "")]).await?;
        xml::parse_object_lock(&body)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &mut (dyn AsyncRead + Unpin + Send),
        length: u64,
        content_type: &str,
    ) -> ClientResult<()> {
        tracing::debug!(bucket = %bucket, key = %key, size = length, "S3 PutObject");
        let handle = self.bucket(bucket)?;
        // 流式上传，超过分片大小时rust-s3自动改用分片上传
        let mut reader = data.take(length);
        let response = handle
            .put_object_stream_with_content_type(&mut reader, key, content_type)
            .await?;
        if !(200..300).contains(&response.status_code()) {
            return Err(xml::parse_error(response.status_code(), ""));
        }

        let uploaded = response.uploaded_bytes() as u64;
        if uploaded != length {
            // 数据流提前结束，删除已写入的不完整对象
            let _ = handle.delete_object(key).await;
            return Err(ClientError::InvalidArgument(format!(
                "stream ended after {} of {} bytes",
                uploaded, length
            )));
        }
        Ok(())
    }

    async fn fput_object(&self, bucket: &str, key: &str, file_path: &Path) -> ClientResult<()> {
        let mut file = tokio::fs::File::open(file_path).await?;
        let length = file.metadata().await?.len();
        self.put_object(bucket, key, &mut file, length, DEFAULT_CONTENT_TYPE).await
    }

    async fn fget_object(&self, bucket: &str, key: &str, file_path: &Path) -> ClientResult<()> {
        let mut response = self.open(bucket, key).await?;
        let part = part_path(file_path);

        if let Err(e) = Self::write_part_file(&mut response, &part).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }
        tokio::fs::rename(&part, file_path).await?;
        tracing::debug!(bucket = %bucket, key = %key, path = %file_path.display(), "S3 object saved");
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ClientResult<Box<dyn ObjectBody>> {
        Ok(Box::new(S3ObjectBody::new(self.open(bucket, key).await?)))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        let handle = self.bucket(bucket)?;
        check_response(handle.delete_object(key).await?)?;
        Ok(())
    }

    async fn remove_objects(
        &self,
        bucket: &str,
        objects: Vec<DeleteObject>,
    ) -> ClientResult<Vec<DeleteError>> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        let identifiers: Vec<ObjectIdentifier> = objects
            .into_iter()
            .map(|object| ObjectIdentifier {
                key: object.name,
                version_id: object.version_id,
            })
            .collect();

        // 整体失败（鉴权、桶不存在等）作为错误返回，逐项失败来自响应中的<Error>
        let handle = self.bucket(bucket)?;
        let result = handle.delete_objects(identifiers).await?;
        tracing::debug!(bucket = %bucket, deleted = result.deleted.len(), failed = result.errors.len(), "S3 DeleteObjects");
        Ok(result
            .errors
            .into_iter()
            .map(|e| DeleteError {
                name: e.key,
                version_id: e.version_id,
                code: e.code,
                message: e.message,
            })
            .collect())
    }

    async fn copy_object(&self, bucket: &str, key: &str, source: &CopySource) -> ClientResult<()> {
        // 源对象键需要URL编码（中文等非ASCII字符）
        let copy_source = format!("/{}/{}", source.bucket, urlencoding::encode(&source.key));
        let value = http::HeaderValue::from_str(&copy_source)
            .map_err(|e| ClientError::InvalidArgument(format!("invalid copy source {}: {}", source, e)))?;
        let mut headers = http::HeaderMap::new();
        headers.insert(COPY_SOURCE_HEADER, value);

        tracing::debug!(src = %source, bucket = %bucket, key = %key, "S3 CopyObject");
        let url = self
            .bucket(bucket)?
            .presign_put(key, REQUEST_EXPIRY_SECS, Some(headers), None)
            .await?;
        let response = self
            .http
            .put(url)
            .header(COPY_SOURCE_HEADER, copy_source)
            .send()
            .await?;
        let body = check_http(response).await?.text().await?;
        // CopyObject可能以200返回<Error>
        if body.contains("<Error>") {
            return Err(xml::parse_error(200, &body));
        }
        Ok(())
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectStat> {
        let handle = self.bucket(bucket)?;
        let (head, status) = handle.head_object(key).await?;
        match status {
            200..=299 => {}
            404 => return Err(ClientError::s3(404, "NoSuchKey", "The specified key does not exist.")),
            other => return Err(xml::parse_error(other, "")),
        }

        Ok(ObjectStat {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: head.content_length.map_or(0, |len| len.max(0) as u64),
            etag: head.e_tag.map(|etag| etag.trim_matches('"').to_string()),
            content_type: head.content_type,
            last_modified: head.last_modified.as_deref().and_then(parse_timestamp),
            version_id: head.version_id,
            metadata: head.metadata.unwrap_or_default(),
        })
    }

    async fn get_object_tags(&self, bucket: &str, key: &str) -> ClientResult<Option<Tags>> {
        self.get_tags(bucket, key, TagScope::Object).await
    }

    async fn set_object_tags(&self, bucket: &str, key: &str, tags: &Tags) -> ClientResult<()> {
        self.put_tags(bucket, key, tags).await
    }

    async fn delete_object_tags(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.put_tags(bucket, key, &Tags::for_object()).await
    }

    async fn get_object_retention(&self, bucket: &str, key: &str) -> ClientResult<Option<Retention>> {
        match self.get_text(bucket, key, &[("retention", "")]).await {
            Ok(body) => xml::parse_retention(&body),
            Err(e) if e.is_code("NoSuchObjectLockConfiguration") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn presigned_url(
        &self,
        method: PresignMethod,
        bucket: &str,
        key: &str,
        expires: Duration,
    ) -> ClientResult<String> {
        let secs = presign_expiry_secs(expires)?;
        self.sign(method, bucket, key, &[], secs).await
    }
}
