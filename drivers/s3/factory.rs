//! S3客户端工厂

use std::sync::Arc;

use super::config::S3Settings;
use super::driver::S3Client;
use crate::config::ConnectionConfig;
use crate::storage::{ClientFactory, ClientHandle, ClientResult};

/// S3客户端工厂
pub struct S3ClientFactory;

impl ClientFactory for S3ClientFactory {
    fn client_type(&self) -> &'static str {
        "s3"
    }

    fn connect(&self, config: &ConnectionConfig) -> ClientResult<ClientHandle> {
        let settings = S3Settings::from_connection(config)?;
        tracing::debug!(endpoint = %settings.endpoint, region = %settings.region, "创建S3客户端");
        let client: ClientHandle = Arc::new(S3Client::new(settings)?);
        Ok(client)
    }
}
