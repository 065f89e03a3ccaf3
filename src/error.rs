//! Error types / 错误类型
//!
//! `ClientError` is what an underlying storage client reports, `StoreError`
//! is what `ObjectStorage` hands back to callers.

use std::path::PathBuf;

use thiserror::Error;

/// Error reported by a `StorageClient` / 底层客户端错误
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with an error document / 服务端返回错误
    #[error("S3 operation failed; code: {code}, message: {message}, resource: {resource}, request_id: {request_id}")]
    S3 {
        status: u16,
        code: String,
        message: String,
        resource: String,
        request_id: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("operation not supported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Build a service error without the bookkeeping fields / 构造服务端错误
    pub fn s3(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::S3 {
            status,
            code: code.into(),
            message: message.into(),
            resource: String::new(),
            request_id: String::new(),
        }
    }

    /// Service error code, e.g. `NoSuchKey` / 错误码
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::S3 { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn is_code(&self, expected: &str) -> bool {
        self.code() == Some(expected)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// Error returned by `ObjectStorage` / 门面错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid construction arguments / 配置错误
    #[error("configuration error: {0}")]
    Config(String),
    /// The underlying client could not be built / 连接失败
    #[error("failed to connect to {host}: {source}")]
    Connection {
        host: String,
        #[source]
        source: ClientError,
    },
    /// Call arguments of an unsupported shape / 参数校验失败
    #[error("validation error: {0}")]
    Validation(String),
    /// A well-known "not found" code, translated / 未找到
    #[error("{message}")]
    NotFound {
        message: String,
        #[source]
        source: ClientError,
    },
    #[error("file '{}' does not exist", .0.display())]
    FileNotFound(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Pass-through of the client's own error / 透传底层错误
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl StoreError {
    /// Client error code when the failure came from the service / 底层错误码
    pub fn code(&self) -> Option<&str> {
        match self {
            StoreError::Client(e) => e.code(),
            StoreError::NotFound { source, .. } => source.code(),
            StoreError::Connection { source, .. } => source.code(),
            _ => None,
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_code() {
        let err = ClientError::s3(404, "NoSuchKey", "The specified key does not exist.");
        assert!(err.is_code("NoSuchKey"));
        assert_eq!(ClientError::Transport("reset".into()).code(), None);
        assert!(err.to_string().contains("code: NoSuchKey"));
    }

    #[test]
    fn test_store_error_keeps_client_code() {
        let err: StoreError = ClientError::s3(403, "AccessDenied", "denied").into();
        assert_eq!(err.code(), Some("AccessDenied"));
        assert!(matches!(err, StoreError::Client(_)));
    }
}
