use common::config::{
    resolve_local_from_env, AccountLogin, JobParameters, LoadConfig, LocalOptions, ValidationMode,
};
use common::error::LoadError;
use log::info;
use shared_clients::secrets::SecretStore;
use std::fmt;

/// Where a managed job gets its account login from.
pub enum CredentialSource {
    /// `SNOWFLAKE_USERNAME`, `SNOWFLAKE_PASSWORD` and `SNOWFLAKE_ACCOUNT`
    /// passed as job parameters.
    Parameters,
    /// A JSON secret holding the same three keys.
    SecretStore {
        secret_name: String,
        store: Box<dyn SecretStore>,
    },
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Parameters => f.write_str("Parameters"),
            CredentialSource::SecretStore { secret_name, .. } => f
                .debug_struct("SecretStore")
                .field("secret_name", secret_name)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigSource {
    /// Environment variables, optionally seeded from a `.env` file, plus a
    /// credentials JSON file on disk.
    Local(LocalOptions),
    /// Job parameters plus a credential source.
    Job {
        params: JobParameters,
        credentials: CredentialSource,
        validation: ValidationMode,
    },
}

/// Produce a validated configuration. Never touches the warehouse.
pub async fn resolve_config(source: ConfigSource) -> Result<LoadConfig, LoadError> {
    match source {
        ConfigSource::Local(options) => Ok(resolve_local_from_env(&options)?),
        ConfigSource::Job {
            params,
            credentials,
            validation,
        } => {
            info!("resolving job configuration from {} parameters", params.len());
            match credentials {
                CredentialSource::Parameters => {
                    let settings = params.settings(validation, true)?;
                    Ok(settings.into_config()?)
                }
                CredentialSource::SecretStore { secret_name, store } => {
                    // parameters are checked before any network call
                    let settings = params.settings(validation, false)?;
                    info!("fetching account login from secret '{secret_name}'");
                    let secret = store.secret_string(&secret_name).await?;
                    let login = AccountLogin::from_secret_json(&secret)?;
                    Ok(settings.with_login(login)?)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared_clients::secrets::SecretStoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct OneSecret {
        value: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SecretStore for OneSecret {
        async fn secret_string(&self, name: &str) -> Result<String, SecretStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.value
                .clone()
                .ok_or_else(|| SecretStoreError::lookup_failed(format!("{name} not found")))
        }
    }

    fn params(extra: &[&str]) -> JobParameters {
        let mut args = vec![
            "--LOAD_FILE",
            "sample.json",
            "--SNOWFLAKE_STAGE_NAME",
            "STG1",
            "--SNOWFLAKE_FILE_FORMAT_NAME",
            "FF1",
            "--SNOWFLAKE_STORAGE_INT_NAME",
            "INT1",
            "--SNOWFLAKE_RAW_TABLE_NAME",
            "RAW1",
            "--S3_STORAGE_AWS_ROLE_ARN",
            "arn:aws:iam::123456789012:role/loader",
            "--S3_STORAGE_ALLOWED_LOCATIONS",
            "s3://bucket/path",
            "--SNOWFLAKE_WAREHOUSE",
            "WH",
            "--SNOWFLAKE_DATABASE",
            "DB",
            "--SNOWFLAKE_SCHEMA",
            "PUBLIC",
        ];
        args.extend_from_slice(extra);
        JobParameters::parse(args)
    }

    fn store(value: Option<&str>) -> (Box<dyn SecretStore>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = OneSecret {
            value: value.map(str::to_string),
            calls: calls.clone(),
        };
        (Box::new(store), calls)
    }

    #[tokio::test]
    async fn secret_login_completes_the_job_config() {
        let (store, calls) = store(Some(
            r#"{"SNOWFLAKE_USERNAME":"loader","SNOWFLAKE_PASSWORD":"pw","SNOWFLAKE_ACCOUNT":"xy12345"}"#,
        ));
        let config = resolve_config(ConfigSource::Job {
            params: params(&[]),
            credentials: CredentialSource::SecretStore {
                secret_name: "snowflake_credentials".into(),
                store,
            },
            validation: ValidationMode::Exhaustive,
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(config.credentials.user, "loader");
        assert_eq!(config.credentials.schema, "PUBLIC");
        assert_eq!(config.targets.load_file_name, "sample.json");
    }

    #[tokio::test]
    async fn invalid_parameters_never_reach_the_store() {
        let (store, calls) = store(Some("{}"));
        let err = resolve_config(ConfigSource::Job {
            params: JobParameters::parse(["--LOAD_FILE", "sample.json"]),
            credentials: CredentialSource::SecretStore {
                secret_name: "snowflake_credentials".into(),
                store,
            },
            validation: ValidationMode::Exhaustive,
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LoadError::Configuration { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_secret_is_a_retrieval_error() {
        let (store, _) = store(None);
        let err = resolve_config(ConfigSource::Job {
            params: params(&[]),
            credentials: CredentialSource::SecretStore {
                secret_name: "absent".into(),
                store,
            },
            validation: ValidationMode::Exhaustive,
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LoadError::SecretRetrieval { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn malformed_secret_is_a_credential_parse_error() {
        let (store, _) = store(Some("not json"));
        let err = resolve_config(ConfigSource::Job {
            params: params(&[]),
            credentials: CredentialSource::SecretStore {
                secret_name: "snowflake_credentials".into(),
                store,
            },
            validation: ValidationMode::Exhaustive,
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LoadError::CredentialParse { .. }));
    }

    #[tokio::test]
    async fn inline_login_from_parameters() {
        let config = resolve_config(ConfigSource::Job {
            params: params(&[
                "--SNOWFLAKE_USERNAME",
                "loader",
                "--SNOWFLAKE_PASSWORD",
                "pw",
                "--SNOWFLAKE_ACCOUNT",
                "xy12345",
            ]),
            credentials: CredentialSource::Parameters,
            validation: ValidationMode::FirstMissing,
        })
        .await
        .unwrap();

        assert_eq!(config.credentials.account, "xy12345");
        assert_eq!(config.credentials.warehouse, "WH");
    }
}
