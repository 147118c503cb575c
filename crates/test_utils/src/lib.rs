use async_trait::async_trait;
use common::config::{LoadConfig, LoadTargets, WarehouseCredentials};
use once_cell::sync::Lazy;
use shared_clients::secrets::{SecretStore, SecretStoreError};
use shared_clients::{QueryResult, WarehouseConnector, WarehouseError, WarehouseSession};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::env;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Global mutex to serialize tests that modify process-wide state such as
/// environment variables.
pub static TEST_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn lock_test_mutex() -> MutexGuard<'static, ()> {
    // a panicking test must not wedge every test after it
    TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
}

/// Restores environment variables to what they were when it was created.
struct EnvReset(Vec<(String, Option<String>)>);

impl EnvReset {
    fn apply(vars: &[(&str, Option<&str>)]) -> Self {
        let saved = vars
            .iter()
            .map(|(key, _)| (key.to_string(), env::var(key).ok()))
            .collect();
        for (key, value) in vars {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
        EnvReset(saved)
    }
}

impl Drop for EnvReset {
    fn drop(&mut self) {
        for (key, value) in &self.0 {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }
}

/// Run the future from `f` with `vars` set (`None` removes a variable).
/// Every listed variable is restored afterwards, even if the test panics.
pub async fn with_env_vars_async<F, Fut, T>(vars: &[(&str, Option<&str>)], f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let _lock = lock_test_mutex();
    let _reset = EnvReset::apply(vars);
    f().await
}

pub fn sample_credentials() -> WarehouseCredentials {
    WarehouseCredentials {
        user: "loader".into(),
        password: "s3cret".into(),
        account: "xy12345".into(),
        warehouse: "LOAD_WH".into(),
        database: "RAW_DB".into(),
        schema: "LANDING".into(),
    }
}

/// The FF1/RAW1/STG1/INT1 targets used throughout the docs.
pub fn sample_targets() -> LoadTargets {
    LoadTargets {
        stage_name: "STG1".into(),
        file_format_name: "FF1".into(),
        storage_integration_name: "INT1".into(),
        raw_table_name: "RAW1".into(),
        storage_location_url: "s3://bucket/path".into(),
        storage_aws_role_arn: "arn:aws:iam::123456789012:role/loader".into(),
        load_file_name: "sample.json".into(),
    }
}

pub fn sample_config() -> LoadConfig {
    LoadConfig::new(sample_credentials(), sample_targets())
}

/// Write `creds` as the credentials JSON file local mode expects.
pub fn write_credentials_file(dir: &Path, creds: &WarehouseCredentials) -> PathBuf {
    let path = dir.join("snowflake_creds.json");
    let body = serde_json::json!({
        "user": creds.user,
        "password": creds.password,
        "account": creds.account,
        "warehouse": creds.warehouse,
        "database": creds.database,
        "schema": creds.schema,
    });
    std::fs::write(&path, body.to_string()).expect("write credentials file");
    path
}

/// Environment variables for a local run against [`sample_targets`].
pub fn local_env(cred_file: &Path) -> Vec<(&'static str, String)> {
    let t = sample_targets();
    vec![
        ("LOAD_FILE", t.load_file_name),
        ("SNOWFLAKE_CRED_FILE", cred_file.display().to_string()),
        ("SNOWFLAKE_STAGE_NAME", t.stage_name),
        ("SNOWFLAKE_FILE_FORMAT_NAME", t.file_format_name),
        ("SNOWFLAKE_STORAGE_INT_NAME", t.storage_integration_name),
        ("SNOWFLAKE_RAW_TABLE_NAME", t.raw_table_name),
        ("S3_STORAGE_AWS_ROLE_ARN", t.storage_aws_role_arn),
        ("S3_STORAGE_ALLOWED_LOCATIONS", t.storage_location_url),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeTable {
    pub rows: usize,
    pub loaded_files: BTreeSet<String>,
}

/// Objects as the fake warehouse sees them after the statements so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeCatalog {
    pub file_formats: BTreeSet<String>,
    /// Stage name to `(integration, url, file format)`.
    pub stages: BTreeMap<String, (String, String, String)>,
    pub tables: BTreeMap<String, FakeTable>,
}

/// Everything the fake warehouse observed, shared by all its sessions.
#[derive(Debug, Default)]
pub struct FakeLog {
    pub connects: usize,
    pub closes: usize,
    pub executed: Vec<String>,
    pub catalog: FakeCatalog,
}

#[derive(Debug, Clone)]
struct Behaviour {
    reject_login: Option<String>,
    fail_statement: Option<(usize, String)>,
    copy_delay: Option<Duration>,
    fail_close: bool,
    rows_per_file: usize,
    /// Files present in external storage.
    files: BTreeSet<String>,
}

/// In-memory warehouse that understands the four statements a load issues.
#[derive(Debug, Clone)]
pub struct FakeWarehouse {
    log: Arc<Mutex<FakeLog>>,
    behaviour: Behaviour,
}

impl Default for FakeWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeWarehouse {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(FakeLog::default())),
            behaviour: Behaviour {
                reject_login: None,
                fail_statement: None,
                copy_delay: None,
                fail_close: false,
                rows_per_file: 3,
                files: BTreeSet::from(["sample.json".to_string()]),
            },
        }
    }

    /// Refuse every login with `message`.
    pub fn rejecting_login(mut self, message: &str) -> Self {
        self.behaviour.reject_login = Some(message.to_string());
        self
    }

    /// Fail the `n`th statement of each session (1-based) with `message`.
    pub fn failing_statement(mut self, n: usize, message: &str) -> Self {
        self.behaviour.fail_statement = Some((n, message.to_string()));
        self
    }

    pub fn with_copy_delay(mut self, delay: Duration) -> Self {
        self.behaviour.copy_delay = Some(delay);
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.behaviour.fail_close = true;
        self
    }

    pub fn with_file(mut self, name: &str) -> Self {
        self.behaviour.files.insert(name.to_string());
        self
    }

    pub fn log(&self) -> MutexGuard<'_, FakeLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl WarehouseConnector for FakeWarehouse {
    type Session = FakeSession;

    async fn connect(
        &self,
        credentials: &WarehouseCredentials,
    ) -> Result<FakeSession, WarehouseError> {
        if let Some(message) = &self.behaviour.reject_login {
            return Err(WarehouseError::failed_to_connect(message.clone()));
        }
        self.log().connects += 1;
        Ok(FakeSession {
            log: self.log.clone(),
            behaviour: self.behaviour.clone(),
            user: credentials.user.clone(),
            statements: 0,
            closed: false,
        })
    }
}

#[derive(Debug)]
pub struct FakeSession {
    log: Arc<Mutex<FakeLog>>,
    behaviour: Behaviour,
    user: String,
    statements: usize,
    closed: bool,
}

fn status(text: String) -> QueryResult {
    QueryResult::new(vec!["status".into()], vec![vec![Some(text)]])
}

fn not_found(kind: &str, name: &str) -> WarehouseError {
    WarehouseError::statement(
        format!("SQL compilation error: {kind} '{name}' does not exist or not authorized."),
        Some("002003".into()),
        Some("02000".into()),
    )
}

fn word_after<'a>(sql: &'a str, prefix: &str) -> Option<&'a str> {
    sql.strip_prefix(prefix)?.split_whitespace().next()
}

fn quoted_after<'a>(sql: &'a str, key: &str) -> Option<&'a str> {
    let rest = &sql[sql.find(key)? + key.len()..];
    let rest = rest.strip_prefix('\'')?;
    rest.split('\'').next()
}

impl FakeSession {
    fn apply(&self, sql: &str, catalog: &mut FakeCatalog) -> Result<QueryResult, WarehouseError> {
        if let Some(name) = word_after(sql, "CREATE OR REPLACE FILE FORMAT ") {
            catalog.file_formats.insert(name.to_string());
            return Ok(status(format!("File format {name} successfully created.")));
        }
        if let Some(name) = word_after(sql, "CREATE OR REPLACE TABLE ") {
            catalog.tables.insert(name.to_string(), FakeTable::default());
            return Ok(status(format!("Table {name} successfully created.")));
        }
        if let Some(name) = word_after(sql, "CREATE OR REPLACE STAGE ") {
            let integration = sql
                .split("STORAGE_INTEGRATION=")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .unwrap_or_default();
            let url = quoted_after(sql, "URL=").unwrap_or_default();
            let format = quoted_after(sql, "FILE_FORMAT=").unwrap_or_default();
            if !catalog.file_formats.contains(format) {
                return Err(not_found("File format", format));
            }
            catalog.stages.insert(
                name.to_string(),
                (integration.to_string(), url.to_string(), format.to_string()),
            );
            return Ok(status(format!("Stage area {name} successfully created.")));
        }
        if let Some(table) = word_after(sql, "COPY INTO ") {
            let source = sql
                .split(" FROM @")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .unwrap_or_default();
            let (stage, file) = source.split_once('/').unwrap_or((source, ""));
            if !catalog.stages.contains_key(stage) {
                return Err(not_found("Stage", stage));
            }
            if !self.behaviour.files.contains(file) {
                return Err(WarehouseError::statement(
                    format!("Remote file '{file}' was not found."),
                    Some("091016".into()),
                    Some("22000".into()),
                ));
            }
            let rows_per_file = self.behaviour.rows_per_file;
            let target = catalog
                .tables
                .get_mut(table)
                .ok_or_else(|| not_found("Table", table))?;
            if !target.loaded_files.insert(file.to_string()) {
                return Ok(status("Copy executed with 0 files processed.".into()));
            }
            target.rows += rows_per_file;
            let loaded = rows_per_file.to_string();
            return Ok(QueryResult::new(
                ["file", "status", "rows_parsed", "rows_loaded", "errors_seen"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                vec![vec![
                    Some(format!("s3://{stage}/{file}")),
                    Some("LOADED".into()),
                    Some(loaded.clone()),
                    Some(loaded),
                    Some("0".into()),
                ]],
            ));
        }
        Err(WarehouseError::statement(
            format!("SQL compilation error: unsupported statement '{sql}'"),
            Some("001003".into()),
            Some("42000".into()),
        ))
    }
}

#[async_trait]
impl WarehouseSession for FakeSession {
    async fn execute(&mut self, sql: &str) -> Result<QueryResult, WarehouseError> {
        if self.closed {
            return Err(WarehouseError::session_closed("session already closed"));
        }
        self.statements += 1;
        if sql.starts_with("COPY INTO ") {
            if let Some(delay) = self.behaviour.copy_delay {
                tokio::time::sleep(delay).await;
            }
        }

        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.executed.push(sql.to_string());
        if let Some((n, message)) = &self.behaviour.fail_statement {
            if *n == self.statements {
                return Err(WarehouseError::statement(message.clone(), Some("002003".into()), None));
            }
        }
        let mut result = self.apply(sql, &mut log.catalog)?;
        result.query_id = Some(format!("{}-{}", self.user, log.executed.len()));
        Ok(result)
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.log.lock().unwrap_or_else(|e| e.into_inner()).closes += 1;
        if self.behaviour.fail_close {
            return Err(WarehouseError::failed_to_close("session delete returned 500"));
        }
        Ok(())
    }
}

/// Secret store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct FakeSecretStore {
    secrets: HashMap<String, String>,
    lookups: Arc<Mutex<Vec<String>>>,
}

impl FakeSecretStore {
    pub fn with_secret(mut self, name: &str, value: &str) -> Self {
        self.secrets.insert(name.to_string(), value.to_string());
        self
    }

    /// Names looked up so far, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn secret_string(&self, name: &str) -> Result<String, SecretStoreError> {
        self.lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.to_string());
        self.secrets.get(name).cloned().ok_or_else(|| {
            SecretStoreError::lookup_failed(format!(
                "ResourceNotFoundException: Secrets Manager can't find the specified secret '{name}'"
            ))
        })
    }
}
