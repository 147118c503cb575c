use crate::config::error::ConfigError;
use crate::config::keys::*;
use crate::config::record::{LoadConfig, LoadTargets, TargetInputs, WarehouseCredentials};
use crate::config::validate::{FieldCheck, ValidationMode};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

const LOCAL_KEYS: [&str; 8] = [
    LOAD_FILE,
    SNOWFLAKE_CRED_FILE,
    SNOWFLAKE_STAGE_NAME,
    SNOWFLAKE_FILE_FORMAT_NAME,
    SNOWFLAKE_STORAGE_INT_NAME,
    SNOWFLAKE_RAW_TABLE_NAME,
    S3_STORAGE_AWS_ROLE_ARN,
    S3_STORAGE_ALLOWED_LOCATIONS,
];

/// Knobs for resolving configuration from a workstation environment.
#[derive(Debug, Clone)]
pub struct LocalOptions {
    /// Explicit `.env` file. When unset, `./.env` is loaded if present.
    pub env_file: Option<PathBuf>,
    pub validation: ValidationMode,
    /// Parse `LOAD_FILE` as JSON when it names a file on this machine.
    pub check_load_file: bool,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            env_file: None,
            validation: ValidationMode::default(),
            check_load_file: true,
        }
    }
}

/// Load a `.env` file into the process environment. Variables that are
/// already set keep their values.
pub fn load_env_file(path: Option<&Path>) -> Result<(), ConfigError> {
    match path {
        Some(path) => {
            dotenv::from_path(path).map_err(|e| ConfigError::env_file(path, e))?;
            debug!("loaded environment from {}", path.display());
        }
        None => {
            if let Ok(path) = dotenv::dotenv() {
                debug!("loaded environment from {}", path.display());
            }
        }
    }
    Ok(())
}

/// Resolve local-mode configuration from the process environment.
pub fn resolve_local_from_env(options: &LocalOptions) -> Result<LoadConfig, ConfigError> {
    load_env_file(options.env_file.as_deref())?;
    resolve_local(|key| std::env::var(key).ok(), options)
}

/// Resolve local-mode configuration: names from `lookup`, credentials from
/// the JSON file at `SNOWFLAKE_CRED_FILE`.
pub fn resolve_local<F>(lookup: F, options: &LocalOptions) -> Result<LoadConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let values: HashMap<&str, Option<String>> =
        LOCAL_KEYS.iter().map(|key| (*key, lookup(key))).collect();
    let get = |key: &str| values.get(key).and_then(|v| v.as_deref());

    let mut check = FieldCheck::new(options.validation);
    check.require(SNOWFLAKE_CRED_FILE, get(SNOWFLAKE_CRED_FILE))?;
    check.check(SNOWFLAKE_CRED_FILE, get(SNOWFLAKE_CRED_FILE), existing_file)?;
    let inputs = TargetInputs {
        load_file: get(LOAD_FILE),
        stage_name: get(SNOWFLAKE_STAGE_NAME),
        raw_table_name: get(SNOWFLAKE_RAW_TABLE_NAME),
        file_format_name: get(SNOWFLAKE_FILE_FORMAT_NAME),
        storage_integration_name: get(SNOWFLAKE_STORAGE_INT_NAME),
        storage_aws_role_arn: get(S3_STORAGE_AWS_ROLE_ARN),
        storage_location_url: get(S3_STORAGE_ALLOWED_LOCATIONS),
    };
    let targets = LoadTargets::collect(&inputs, &mut check)?;
    check.finish()?;
    let mut targets = targets.ok_or_else(|| ConfigError::invalid(Vec::new()))?;

    let cred_path = PathBuf::from(get(SNOWFLAKE_CRED_FILE).unwrap_or_default().trim());
    let credentials = read_credentials_file(&cred_path)?;
    credentials.validate(options.validation)?;

    if options.check_load_file {
        let load_file = Path::new(get(LOAD_FILE).unwrap_or_default().trim());
        if let Some(name) = check_local_load_file(load_file)? {
            targets.load_file_name = name;
        }
    }

    info!(
        "resolved local configuration for {}.{} (stage {}, table {})",
        credentials.database, credentials.schema, targets.stage_name, targets.raw_table_name
    );
    Ok(LoadConfig::new(credentials, targets))
}

fn existing_file(value: &str) -> Result<(), String> {
    if Path::new(value).is_file() {
        Ok(())
    } else {
        Err(format!("'{value}' does not name a file"))
    }
}

/// Read a `user/password/account/warehouse/database/schema` JSON file.
pub fn read_credentials_file(path: &Path) -> Result<WarehouseCredentials, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::missing_file(SNOWFLAKE_CRED_FILE, path));
    }
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| ConfigError::credential_json(&path.display().to_string(), e))
}

/// When `path` is a local file it must hold one or more JSON documents; the
/// stage key then becomes its file name. Paths that do not exist locally are
/// taken to be stage keys already.
fn check_local_load_file(path: &Path) -> Result<Option<String>, ConfigError> {
    if !path.is_file() {
        debug!("{} is not a local file, using it as a stage key", path.display());
        return Ok(None);
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let mut documents = 0usize;
    for doc in serde_json::Deserializer::from_reader(reader).into_iter::<Value>() {
        doc.map_err(|e| ConfigError::load_file(path, e))?;
        documents += 1;
    }
    if documents == 0 {
        return Err(ConfigError::empty_load_file(path));
    }
    info!("{} holds {} JSON document(s)", path.display(), documents);
    Ok(path.file_name().map(|n| n.to_string_lossy().into_owned()))
}
