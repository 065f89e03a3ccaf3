//! S3客户端配置 / S3 client settings

use serde::{Deserialize, Serialize};

use crate::config::ConnectionConfig;
use crate::error::ClientError;

/// S3 client settings derived from a `ConnectionConfig` / S3配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Settings {
    /// S3端点地址
    /// AWS: https://s3.{region}.amazonaws.com
    /// MinIO: http://localhost:9000
    pub endpoint: String,
    /// 区域
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// 强制使用路径风格（而非虚拟主机风格）
    /// MinIO等需要设置为true
    #[serde(default = "default_path_style")]
    pub force_path_style: bool,
}

fn default_path_style() -> bool {
    true
}

impl S3Settings {
    /// Validate the host and build settings / 校验地址并生成配置
    ///
    /// The host must be a bare `host[:port]`: no scheme, path, query or
    /// fragment.
    pub fn from_connection(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let host = config.host.trim();
        if host.contains("://") {
            return Err(ClientError::InvalidArgument(format!(
                "host {:?} must not contain a scheme; use the secure flag instead",
                host
            )));
        }

        let endpoint = config.endpoint();
        let url = url::Url::parse(&endpoint)
            .map_err(|e| ClientError::InvalidArgument(format!("invalid host {:?}: {}", host, e)))?;
        if url.host_str().map_or(true, |h| h.is_empty()) {
            return Err(ClientError::InvalidArgument(format!("invalid host {:?}", host)));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(ClientError::InvalidArgument(format!(
                "host {:?} must not contain a path, query or fragment",
                host
            )));
        }

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            region: config.region.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            force_path_style: default_path_style(),
        })
    }

    /// No credentials configured / 匿名访问
    pub fn is_anonymous(&self) -> bool {
        self.access_key.is_empty() && self.secret_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_connection() {
        let config = ConnectionConfig::new("localhost:9000", "ak", "sk");
        let settings = S3Settings::from_connection(&config).unwrap();
        assert_eq!(settings.endpoint, "http://localhost:9000");
        assert_eq!(settings.region, "us-east-1");
        assert!(settings.force_path_style);
        assert!(!settings.is_anonymous());

        let secure = S3Settings::from_connection(&config.clone().secure(true)).unwrap();
        assert_eq!(secure.endpoint, "https://localhost:9000");
    }

    #[test]
    fn test_rejects_bad_hosts() {
        for host in ["http://localhost:9000", "localhost:9000/bucket", "localhost:9000?x=1", "localhost:notaport"] {
            let config = ConnectionConfig::new(host, "", "");
            assert!(
                matches!(S3Settings::from_connection(&config), Err(ClientError::InvalidArgument(_))),
                "host {host}"
            );
        }
        let anonymous = S3Settings::from_connection(&ConnectionConfig::new("play.min.io", "", "")).unwrap();
        assert!(anonymous.is_anonymous());
    }
}
