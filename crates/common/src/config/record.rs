use crate::config::error::ConfigError;
use crate::config::validate::{owned, FieldCheck, ValidationMode};
use serde::Deserialize;
use std::fmt;

/// Identity of one warehouse session.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct WarehouseCredentials {
    pub user: String,
    pub password: String,
    pub account: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
}

impl WarehouseCredentials {
    pub fn new(login: AccountLogin, scope: SessionScope) -> Self {
        Self {
            user: login.user,
            password: login.password,
            account: login.account,
            warehouse: scope.warehouse,
            database: scope.database,
            schema: scope.schema,
        }
    }

    /// Every field must be non-empty.
    pub fn validate(&self, mode: ValidationMode) -> Result<(), ConfigError> {
        let mut check = FieldCheck::new(mode);
        for (field, value) in [
            ("user", &self.user),
            ("password", &self.password),
            ("account", &self.account),
            ("warehouse", &self.warehouse),
            ("database", &self.database),
            ("schema", &self.schema),
        ] {
            check.require(&format!("credentials.{field}"), Some(value.as_str()))?;
        }
        check.finish()
    }
}

impl fmt::Debug for WarehouseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseCredentials")
            .field("user", &self.user)
            .field("password", &"********")
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

/// The account half of the credentials, as held by a secret store.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AccountLogin {
    #[serde(rename = "SNOWFLAKE_USERNAME")]
    pub user: String,
    #[serde(rename = "SNOWFLAKE_PASSWORD")]
    pub password: String,
    #[serde(rename = "SNOWFLAKE_ACCOUNT")]
    pub account: String,
}

impl AccountLogin {
    /// Parse a `SNOWFLAKE_USERNAME/PASSWORD/ACCOUNT` JSON secret.
    pub fn from_secret_json(secret: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(secret).map_err(|e| ConfigError::credential_json("secret", e))
    }
}

impl fmt::Debug for AccountLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountLogin")
            .field("user", &self.user)
            .field("password", &"********")
            .field("account", &self.account)
            .finish()
    }
}

/// Warehouse/database/schema the session runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionScope {
    pub warehouse: String,
    pub database: String,
    pub schema: String,
}

/// Names of the objects to provision and the file to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTargets {
    pub stage_name: String,
    pub file_format_name: String,
    pub storage_integration_name: String,
    pub raw_table_name: String,
    pub storage_location_url: String,
    /// Role the storage integration assumes. Required but never rendered.
    pub storage_aws_role_arn: String,
    /// Path relative to the stage root, without a leading `/`.
    pub load_file_name: String,
}

/// Raw, unvalidated values for [`LoadTargets`], in the order they are
/// checked.
#[derive(Debug, Clone, Default)]
pub struct TargetInputs<'a> {
    pub load_file: Option<&'a str>,
    pub stage_name: Option<&'a str>,
    pub raw_table_name: Option<&'a str>,
    pub file_format_name: Option<&'a str>,
    pub storage_integration_name: Option<&'a str>,
    pub storage_aws_role_arn: Option<&'a str>,
    pub storage_location_url: Option<&'a str>,
}

impl LoadTargets {
    /// Validate inputs into `check`. Returns `None` when any problem was
    /// recorded, leaving the caller to [`FieldCheck::finish`].
    pub fn collect(
        inputs: &TargetInputs<'_>,
        check: &mut FieldCheck,
    ) -> Result<Option<Self>, ConfigError> {
        use crate::config::keys::*;
        use crate::config::validate::{identifier, stage_path, storage_url};

        check.require(LOAD_FILE, inputs.load_file)?;
        check.require(SNOWFLAKE_STAGE_NAME, inputs.stage_name)?;
        check.require(SNOWFLAKE_RAW_TABLE_NAME, inputs.raw_table_name)?;
        check.require(SNOWFLAKE_FILE_FORMAT_NAME, inputs.file_format_name)?;
        check.require(SNOWFLAKE_STORAGE_INT_NAME, inputs.storage_integration_name)?;
        check.require(S3_STORAGE_AWS_ROLE_ARN, inputs.storage_aws_role_arn)?;
        check.require(S3_STORAGE_ALLOWED_LOCATIONS, inputs.storage_location_url)?;

        check.check(LOAD_FILE, inputs.load_file, stage_path)?;
        check.check(SNOWFLAKE_STAGE_NAME, inputs.stage_name, identifier)?;
        check.check(SNOWFLAKE_RAW_TABLE_NAME, inputs.raw_table_name, identifier)?;
        check.check(SNOWFLAKE_FILE_FORMAT_NAME, inputs.file_format_name, identifier)?;
        check.check(
            SNOWFLAKE_STORAGE_INT_NAME,
            inputs.storage_integration_name,
            identifier,
        )?;
        check.check(S3_STORAGE_ALLOWED_LOCATIONS, inputs.storage_location_url, storage_url)?;

        if check.has_problems() {
            return Ok(None);
        }
        Ok(Some(Self {
            stage_name: owned(inputs.stage_name),
            file_format_name: owned(inputs.file_format_name),
            storage_integration_name: owned(inputs.storage_integration_name),
            raw_table_name: owned(inputs.raw_table_name),
            storage_location_url: owned(inputs.storage_location_url),
            storage_aws_role_arn: owned(inputs.storage_aws_role_arn),
            load_file_name: owned(inputs.load_file).trim_start_matches('/').to_string(),
        }))
    }
}

/// The single immutable record a load run works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadConfig {
    pub credentials: WarehouseCredentials,
    pub targets: LoadTargets,
}

impl LoadConfig {
    pub fn new(credentials: WarehouseCredentials, targets: LoadTargets) -> Self {
        Self {
            credentials,
            targets,
        }
    }
}
