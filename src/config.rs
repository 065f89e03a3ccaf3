//! Connection configuration / 连接配置
//!
//! Built explicitly, read from `MINIO_*` environment variables, or loaded
//! from a JSON file with the same fields.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Longest expiry a presigned URL may carry (7 days) / 预签名最长有效期
pub const MAX_PRESIGNED_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// Connection configuration / 连接配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// Server host, `host[:port]` without scheme / 服务地址
    #[serde(default)]
    pub host: String,
    /// Access Key
    #[serde(default)]
    pub access_key: String,
    /// Secret Key
    #[serde(default)]
    pub secret_key: String,
    /// Use https / 是否使用 TLS
    #[serde(default)]
    pub secure: bool,
    /// Region / 区域
    #[serde(default = "default_region")]
    pub region: String,
    /// Default presigned URL expiry in seconds / 预签名URL默认过期时间（秒）
    #[serde(default = "default_presigned_expiry_secs")]
    pub presigned_expiry_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presigned_expiry_secs() -> u64 {
    3600
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            secure: false,
            region: default_region(),
            presigned_expiry_secs: default_presigned_expiry_secs(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            ..Self::default()
        }
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn presigned_expiry(mut self, expiry: Duration) -> Self {
        self.presigned_expiry_secs = expiry.as_secs();
        self
    }

    /// Default expiry applied when a presign call passes none / 默认过期时间
    pub fn default_presigned_expiry(&self) -> Duration {
        Duration::from_secs(self.presigned_expiry_secs)
    }

    /// Endpoint URL derived from host and TLS flag / 端点地址
    pub fn endpoint(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.host)
    }

    /// Check construction arguments / 校验配置
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.host.trim().is_empty() {
            return Err(StoreError::Config(
                "host cannot be empty".to_string(),
            ));
        }
        let expiry = self.default_presigned_expiry();
        if expiry.is_zero() || expiry > MAX_PRESIGNED_EXPIRY {
            return Err(StoreError::Config(format!(
                "default presigned expiry must be between 1 second and 7 days, got {}s",
                expiry.as_secs()
            )));
        }
        Ok(())
    }

    /// Read configuration from `MINIO_*` environment variables / 从环境变量读取
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(
            lookup("MINIO_HOST").unwrap_or_default(),
            lookup("MINIO_ACCESS_KEY").unwrap_or_default(),
            lookup("MINIO_SECRET_KEY").unwrap_or_default(),
        );
        config.secure = lookup("MINIO_SECURE")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "t" | "yes"))
            .unwrap_or(false);
        if let Some(region) = lookup("MINIO_REGION").filter(|r| !r.is_empty()) {
            config.region = region;
        }
        if let Some(hours) = lookup("MINIO_PRESIGNED_EXPIRATION_TIME_HOURS") {
            let hours: u64 = hours.trim().parse().map_err(|_| {
                StoreError::Config(format!(
                    "MINIO_PRESIGNED_EXPIRATION_TIME_HOURS must be an integer, got {:?}",
                    hours
                ))
            })?;
            config.presigned_expiry_secs = hours.saturating_mul(3600);
        }
        Ok(config)
    }

    /// Load configuration from a JSON file / 从JSON文件加载
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: ConnectionConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        tracing::info!("Loaded connection configuration from {:?}", path);
        Ok(config)
    }
}
