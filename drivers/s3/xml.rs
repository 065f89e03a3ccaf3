//! S3 XML文档编解码 / S3 XML documents
//!
//! Only the sub-resources the client talks to directly: error bodies,
//! ListObjectsV2 pages, tagging, object lock and retention.

use serde::Deserialize;

use crate::error::ClientError;
use crate::models::{
    parse_timestamp, ObjectInfo, ObjectLockConfig, Retention, RetentionMode, RetentionPeriod,
    TagScope, Tags,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ErrorDocument {
    code: String,
    message: String,
    resource: String,
    request_id: String,
}

/// Code used when the body carries none / 无错误体时按状态码推断
fn status_code_name(status: u16) -> &'static str {
    match status {
        301 => "PermanentRedirect",
        307 => "Redirect",
        400 => "BadRequest",
        403 => "AccessDenied",
        404 => "ResourceNotFound",
        405 => "MethodNotAllowed",
        409 => "Conflict",
        501 => "NotImplemented",
        _ => "UnknownError",
    }
}

/// Build a `ClientError` from a failed response / 解析错误响应
pub fn parse_error(status: u16, body: &str) -> ClientError {
    let doc = if body.trim().is_empty() {
        ErrorDocument::default()
    } else {
        quick_xml::de::from_str::<ErrorDocument>(body).unwrap_or_default()
    };

    let code = if doc.code.is_empty() {
        status_code_name(status).to_string()
    } else {
        doc.code
    };
    let message = if doc.message.is_empty() {
        format!("server responded with HTTP status {}", status)
    } else {
        doc.message
    };

    ClientError::S3 {
        status,
        code,
        message,
        resource: doc.resource,
        request_id: doc.request_id,
    }
}

fn from_xml<'de, T: Deserialize<'de>>(body: &'de str, what: &str) -> Result<T, ClientError> {
    quick_xml::de::from_str(body)
        .map_err(|e| ClientError::InvalidResponse(format!("malformed {} document: {}", what, e)))
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

// ------------------------------------------------------------------ listing

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_continuation_token: Option<String>,
    #[serde(default)]
    contents: Vec<ListedObject>,
    #[serde(default)]
    common_prefixes: Vec<CommonPrefix>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedObject {
    key: String,
    #[serde(default)]
    last_modified: Option<String>,
    #[serde(rename = "ETag", default)]
    etag: Option<String>,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommonPrefix {
    prefix: String,
}

/// One ListObjectsV2 page / 列举结果分页
#[derive(Debug)]
pub struct ListPage {
    pub objects: Vec<ObjectInfo>,
    /// Token of the next page, `None` on the last one / 下一页令牌
    pub next_token: Option<String>,
}

pub fn parse_list_page(body: &str) -> Result<ListPage, ClientError> {
    let result: ListBucketResult = from_xml(body, "ListBucketResult")?;

    // 目录（公共前缀）
    let mut objects: Vec<ObjectInfo> = result
        .common_prefixes
        .into_iter()
        .map(|cp| ObjectInfo {
            key: cp.prefix,
            size: 0,
            last_modified: None,
            etag: None,
            is_dir: true,
        })
        .collect();

    objects.extend(result.contents.into_iter().map(|obj| ObjectInfo {
        is_dir: obj.key.ends_with('/'),
        key: obj.key,
        size: obj.size,
        last_modified: obj.last_modified.as_deref().and_then(parse_timestamp),
        etag: obj.etag.as_deref().map(trim_etag),
    }));

    let next_token = if result.is_truncated {
        result.next_continuation_token.filter(|t| !t.is_empty())
    } else {
        None
    };

    Ok(ListPage { objects, next_token })
}

// ------------------------------------------------------------------ tagging

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tagging {
    #[serde(default)]
    tag_set: TagSet,
}

#[derive(Debug, Default, Deserialize)]
struct TagSet {
    #[serde(rename = "Tag", default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    #[serde(default)]
    value: String,
}

/// Parse a tagging document; `None` when the set is empty / 解析标签
pub fn parse_tagging(body: &str, scope: TagScope) -> Result<Option<Tags>, ClientError> {
    let tagging: Tagging = from_xml(body, "Tagging")?;
    if tagging.tag_set.tags.is_empty() {
        return Ok(None);
    }
    let tags = Tags::from_pairs(scope, tagging.tag_set.tags.into_iter().map(|t| (t.key, t.value)))
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
    Ok(Some(tags))
}

/// Serialize a tag set into a tagging document / 生成标签文档
pub fn tagging_document(tags: &Tags) -> String {
    let mut body = String::from("<Tagging><TagSet>");
    for (key, value) in tags.iter() {
        body.push_str("<Tag><Key>");
        body.push_str(&quick_xml::escape::escape(key));
        body.push_str("</Key><Value>");
        body.push_str(&quick_xml::escape::escape(value));
        body.push_str("</Value></Tag>");
    }
    body.push_str("</TagSet></Tagging>");
    body
}

// -------------------------------------------------------------- object lock

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectLockConfiguration {
    #[serde(default)]
    object_lock_enabled: Option<String>,
    #[serde(default)]
    rule: Option<LockRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LockRule {
    #[serde(default)]
    default_retention: Option<DefaultRetention>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DefaultRetention {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    days: Option<u32>,
    #[serde(default)]
    years: Option<u32>,
}

pub fn parse_object_lock(body: &str) -> Result<ObjectLockConfig, ClientError> {
    let doc: ObjectLockConfiguration = from_xml(body, "ObjectLockConfiguration")?;
    let retention = doc.rule.and_then(|rule| rule.default_retention);

    let (mode, period) = match retention {
        Some(r) => {
            let period = match (r.days, r.years) {
                (Some(days), _) => Some(RetentionPeriod::Days(days)),
                (None, Some(years)) => Some(RetentionPeriod::Years(years)),
                (None, None) => None,
            };
            (r.mode.as_deref().and_then(RetentionMode::parse), period)
        }
        None => (None, None),
    };

    Ok(ObjectLockConfig {
        enabled: doc
            .object_lock_enabled
            .map_or(false, |v| v.trim().eq_ignore_ascii_case("enabled")),
        mode,
        period,
    })
}

// ---------------------------------------------------------------- retention

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RetentionDocument {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    retain_until_date: Option<String>,
}

/// `None` when the document names no mode or date / 解析保留设置
pub fn parse_retention(body: &str) -> Result<Option<Retention>, ClientError> {
    let doc: RetentionDocument = from_xml(body, "Retention")?;
    let (Some(mode), Some(until)) = (doc.mode, doc.retain_until_date) else {
        return Ok(None);
    };
    let mode = RetentionMode::parse(&mode)
        .ok_or_else(|| ClientError::InvalidResponse(format!("unknown retention mode {:?}", mode)))?;
    let retain_until = parse_timestamp(&until)
        .ok_or_else(|| ClientError::InvalidResponse(format!("invalid retain-until date {:?}", until)))?;
    Ok(Some(Retention { mode, retain_until }))
}
