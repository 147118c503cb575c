use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;
use common::error::diagnostics::DiagnosticMessage;
use common::error::LoadError;
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("secret lookup failed: {context}")]
    LookupFailed { context: DiagnosticMessage },
    #[error("secret has no string value: {context}")]
    NotAString { context: DiagnosticMessage },
}

impl SecretStoreError {
    #[track_caller]
    pub fn lookup_failed(message: impl Into<String>) -> Self {
        Self::LookupFailed {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn not_a_string(name: &str) -> Self {
        Self::NotAString {
            context: common::diag!("'{}' is stored as binary", name),
        }
    }
}

impl From<SecretStoreError> for LoadError {
    #[track_caller]
    fn from(err: SecretStoreError) -> Self {
        LoadError::secret_retrieval(err)
    }
}

/// Read-only access to named string secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret_string(&self, name: &str) -> Result<String, SecretStoreError>;
}

/// Secrets held in AWS Secrets Manager for one region.
#[derive(Debug, Clone)]
pub struct AwsSecretsManager {
    client: Client,
    region: String,
}

impl AwsSecretsManager {
    /// Client using the default AWS credential chain, pinned to `region`.
    pub async fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;
        Self {
            client: Client::new(&config),
            region,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    async fn secret_string(&self, name: &str) -> Result<String, SecretStoreError> {
        debug!("fetching secret '{}' from {}", name, self.region);
        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| {
                SecretStoreError::lookup_failed(format!(
                    "'{}' in {}: {}",
                    name,
                    self.region,
                    DisplayErrorContext(&e)
                ))
            })?;
        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| SecretStoreError::not_a_string(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_failures_are_secret_retrieval_errors() {
        let err: LoadError =
            SecretStoreError::lookup_failed("'snowflake_credentials' in ap-south-1: AccessDenied")
                .into();
        assert!(matches!(err, LoadError::SecretRetrieval { .. }));
        assert!(err.to_string().contains("AccessDenied"));
    }
}
