use crate::{
    error::RemoteError,
    remote::{ConnectionFactory, RemoteConnection},
    salesforce::{client::SalesforceClient, credentials::OrgCredentials},
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Builds a fresh [`SalesforceClient`] for every call.
#[derive(Debug, Clone)]
pub struct SalesforceConnectionFactory {
    creds: OrgCredentials,
    timeout: Duration,
}

impl SalesforceConnectionFactory {
    pub fn new(creds: OrgCredentials, timeout: Duration) -> Self {
        Self { creds, timeout }
    }
}

#[async_trait]
impl ConnectionFactory for SalesforceConnectionFactory {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, RemoteError> {
        debug!(org = %self.creds.alias, "Opening remote connection");
        let client = SalesforceClient::new(self.creds.clone(), self.timeout)?;
        Ok(Box::new(client))
    }
}
