//! Data types exchanged between the facade, the client and callers / 数据模型

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Content type used when an upload does not name one / 默认内容类型
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const MAX_OBJECT_TAGS: usize = 10;
const MAX_BUCKET_TAGS: usize = 50;
const MAX_TAG_KEY_LEN: usize = 128;
const MAX_TAG_VALUE_LEN: usize = 256;

/// Bucket descriptor / 存储桶信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
}

/// Object listing entry / 对象列表条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    /// Common prefix of a non-recursive listing / 非递归列举中的公共前缀
    pub is_dir: bool,
}

/// Object metadata returned by stat / 对象元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectStat {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub version_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Which resource a tag set is attached to / 标签作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagScope {
    Bucket,
    Object,
}

impl TagScope {
    fn max_tags(self) -> usize {
        match self {
            TagScope::Bucket => MAX_BUCKET_TAGS,
            TagScope::Object => MAX_OBJECT_TAGS,
        }
    }
}

/// Tag set with S3 limits enforced / 标签集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    scope: TagScope,
    entries: BTreeMap<String, String>,
}

impl Tags {
    pub fn new(scope: TagScope) -> Self {
        Self {
            scope,
            entries: BTreeMap::new(),
        }
    }

    pub fn for_bucket() -> Self {
        Self::new(TagScope::Bucket)
    }

    pub fn for_object() -> Self {
        Self::new(TagScope::Object)
    }

    /// Build a tag set from plain pairs, checking every limit / 从键值对构建
    pub fn from_pairs<I, K, V>(scope: TagScope, pairs: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut tags = Self::new(scope);
        for (key, value) in pairs {
            tags.insert(key, value)?;
        }
        Ok(tags)
    }

    /// Insert or replace a tag / 插入标签
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), StoreError> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() || key.chars().count() > MAX_TAG_KEY_LEN {
            return Err(StoreError::Validation(format!(
                "invalid tag key {:?}: length must be 1 to {}",
                key, MAX_TAG_KEY_LEN
            )));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(StoreError::Validation(format!(
                "invalid value for tag {:?}: length must not exceed {}",
                key, MAX_TAG_VALUE_LEN
            )));
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.scope.max_tags() {
            return Err(StoreError::Validation(format!(
                "at most {} tags are allowed on a {:?}",
                self.scope.max_tags(),
                self.scope
            )));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|v| v.as_str())
    }

    pub fn scope(&self) -> TagScope {
        self.scope
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.entries.into_iter().collect()
    }
}

/// Tags argument: a prepared tag set or a plain map / 标签参数
#[derive(Debug, Clone)]
pub enum TagInput {
    Tags(Tags),
    Map(HashMap<String, String>),
}

impl TagInput {
    /// Canonical tag set for the given scope / 规范化为标签集合
    pub fn into_tags(self, scope: TagScope) -> Result<Tags, StoreError> {
        match self {
            TagInput::Tags(tags) if tags.scope() == scope => Ok(tags),
            TagInput::Tags(tags) => Tags::from_pairs(scope, tags.entries),
            TagInput::Map(map) => Tags::from_pairs(scope, map),
        }
    }
}

impl From<Tags> for TagInput {
    fn from(tags: Tags) -> Self {
        TagInput::Tags(tags)
    }
}

impl From<HashMap<String, String>> for TagInput {
    fn from(map: HashMap<String, String>) -> Self {
        TagInput::Map(map)
    }
}

/// Single entry of a bulk delete / 批量删除项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteObject {
    pub name: String,
    pub version_id: Option<String>,
}

impl DeleteObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_id: None,
        }
    }

    pub fn with_version(name: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_id: Some(version_id.into()),
        }
    }
}

/// Bulk delete argument element: a prepared entry or a `name`/`version_id` map / 批量删除参数
#[derive(Debug, Clone)]
pub enum DeleteItem {
    Object(DeleteObject),
    Map(HashMap<String, String>),
}

impl From<DeleteObject> for DeleteItem {
    fn from(object: DeleteObject) -> Self {
        DeleteItem::Object(object)
    }
}

impl From<HashMap<String, String>> for DeleteItem {
    fn from(map: HashMap<String, String>) -> Self {
        DeleteItem::Map(map)
    }
}

/// Turn a homogeneous list of delete items into entries / 规范化批量删除参数
///
/// Either every item is a `DeleteObject` or every item is a map; anything
/// else is rejected.
pub fn canonical_delete_list(items: Vec<DeleteItem>) -> Result<Vec<DeleteObject>, StoreError> {
    let all_objects = items.iter().all(|item| matches!(item, DeleteItem::Object(_)));
    let all_maps = items.iter().all(|item| matches!(item, DeleteItem::Map(_)));
    if !all_objects && !all_maps {
        return Err(StoreError::Validation(
            "delete list must contain either only DeleteObject entries or only maps".to_string(),
        ));
    }

    items
        .into_iter()
        .map(|item| match item {
            DeleteItem::Object(object) => Ok(object),
            DeleteItem::Map(mut map) => {
                let name = map.remove("name").filter(|n| !n.is_empty()).ok_or_else(|| {
                    StoreError::Validation("delete map entry is missing 'name'".to_string())
                })?;
                Ok(DeleteObject {
                    name,
                    version_id: map.remove("version_id"),
                })
            }
        })
        .collect()
}

/// Per-item failure of a bulk delete / 批量删除单项失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteError {
    pub name: String,
    pub version_id: Option<String>,
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for DeleteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeleteError(code={}, message={}, name={}", self.code, self.message, self.name)?;
        if let Some(version) = &self.version_id {
            write!(f, ", version_id={}", version)?;
        }
        write!(f, ")")
    }
}

/// Source of a server-side copy / 复制源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySource {
    pub bucket: String,
    pub key: String,
}

impl CopySource {
    /// Parse `bucket/key`, splitting on the first `/` only / 解析 `bucket/key`
    pub fn parse(source: &str) -> Result<Self, StoreError> {
        let (bucket, key) = source.split_once('/').unwrap_or((source, ""));
        if bucket.is_empty() || key.is_empty() {
            return Err(StoreError::Validation(format!(
                "copy source {:?} must have the form 'bucket/key'",
                source
            )));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl std::fmt::Display for CopySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Object lock retention mode / 保留模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionMode {
    Governance,
    Compliance,
}

impl RetentionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GOVERNANCE" => Some(RetentionMode::Governance),
            "COMPLIANCE" => Some(RetentionMode::Compliance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionMode::Governance => "GOVERNANCE",
            RetentionMode::Compliance => "COMPLIANCE",
        }
    }
}

/// Default retention period of a lock rule / 默认保留期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionPeriod {
    Days(u32),
    Years(u32),
}

/// Bucket object-lock configuration / 对象锁配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLockConfig {
    pub enabled: bool,
    pub mode: Option<RetentionMode>,
    pub period: Option<RetentionPeriod>,
}

/// Object retention settings / 对象保留设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    pub mode: RetentionMode,
    pub retain_until: DateTime<Utc>,
}

/// Result of `create_bucket` / 创建存储桶结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketCreation {
    Created,
    AlreadyExisted,
}

/// Result of `download_file` / 下载到文件结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDownload {
    Downloaded,
    /// Target directory missing and creation disabled; nothing transferred / 目录不存在，未下载
    MissingDirectory,
}

/// Parse an S3 timestamp (RFC 3339 or RFC 2822) / 解析时间戳
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f UTC")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_tags_limits() {
        let mut tags = Tags::for_object();
        for i in 0..10 {
            tags.insert(format!("k{i}"), "v").unwrap();
        }
        // Replacing an existing key is still allowed at the limit / 达到上限时仍可覆盖
        tags.insert("k0", "other").unwrap();
        assert_eq!(tags.get("k0"), Some("other"));
        assert!(matches!(tags.insert("k10", "v"), Err(StoreError::Validation(_))));

        let mut tags = Tags::for_bucket();
        assert!(tags.insert("", "v").is_err());
        assert!(tags.insert("k", "x".repeat(257)).is_err());
        assert!(tags.insert("k".repeat(129), "v").is_err());
        assert!(tags.insert("k", "x".repeat(256)).is_ok());
    }

    #[test]
    fn test_tag_input_canonicalization() {
        let tags = TagInput::from(map(&[("Project", "Alpha"), ("Env", "dev")]))
            .into_tags(TagScope::Object)
            .unwrap();
        assert_eq!(tags.scope(), TagScope::Object);
        assert_eq!(tags.get("Project"), Some("Alpha"));
        assert_eq!(tags.len(), 2);

        let mut bucket_tags = Tags::for_bucket();
        bucket_tags.insert("team", "storage").unwrap();
        let rescoped = TagInput::from(bucket_tags).into_tags(TagScope::Object).unwrap();
        assert_eq!(rescoped.scope(), TagScope::Object);
        assert_eq!(rescoped.get("team"), Some("storage"));

        let too_many: HashMap<String, String> = (0..11).map(|i| (format!("k{i}"), "v".to_string())).collect();
        assert!(TagInput::from(too_many).into_tags(TagScope::Object).is_err());
    }

    #[test]
    fn test_canonical_delete_list() {
        let objects = canonical_delete_list(vec![
            DeleteObject::new("a.txt").into(),
            DeleteObject::with_version("b.txt", "v1").into(),
        ])
        .unwrap();
        assert_eq!(objects[1].version_id.as_deref(), Some("v1"));

        let maps = canonical_delete_list(vec![
            map(&[("name", "a.txt")]).into(),
            map(&[("name", "b.txt"), ("version_id", "v2")]).into(),
        ])
        .unwrap();
        assert_eq!(maps, vec![DeleteObject::new("a.txt"), DeleteObject::with_version("b.txt", "v2")]);

        assert!(canonical_delete_list(Vec::new()).unwrap().is_empty());

        let mixed = canonical_delete_list(vec![
            DeleteObject::new("a.txt").into(),
            map(&[("name", "b.txt")]).into(),
        ]);
        assert!(matches!(mixed, Err(StoreError::Validation(_))));

        let nameless = canonical_delete_list(vec![map(&[("version_id", "v1")]).into()]);
        assert!(matches!(nameless, Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_copy_source_parse() {
        let source = CopySource::parse("source-bucket/dir/source-object").unwrap();
        assert_eq!(source.bucket, "source-bucket");
        assert_eq!(source.key, "dir/source-object");
        assert_eq!(source.to_string(), "source-bucket/dir/source-object");

        assert!(CopySource::parse("bucket-only").is_err());
        assert!(CopySource::parse("bucket/").is_err());
        assert!(CopySource::parse("/key").is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp("2024-05-01T10:20:30.000Z").is_some());
        assert!(parse_timestamp("Wed, 01 May 2024 10:20:30 GMT").is_some());
        assert!(parse_timestamp("2024-05-01 10:20:30 UTC").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_delete_error_display() {
        let err = DeleteError {
            name: "a.txt".into(),
            version_id: None,
            code: "AccessDenied".into(),
            message: "denied".into(),
        };
        assert_eq!(err.to_string(), "DeleteError(code=AccessDenied, message=denied, name=a.txt)");
    }
}
