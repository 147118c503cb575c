use crate::{QueryResult, WarehouseConnector, WarehouseError, WarehouseSession};
use async_trait::async_trait;
use common::config::WarehouseCredentials;
use log::{debug, info, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

pub const CLIENT_APP_ID: &str = "snowload";
const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Codes Snowflake uses for a statement that is still executing.
const QUERY_IN_PROGRESS: [&str; 2] = ["333333", "333334"];

/// `https://<account>.snowflakecomputing.com`
pub fn account_url(account: &str) -> String {
    format!("https://{}.snowflakecomputing.com", account.trim().to_ascii_lowercase())
}

/// Login wants the bare account locator, without region or cloud suffixes.
fn account_name(account: &str) -> &str {
    account.split('.').next().unwrap_or(account)
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    data: LoginRequestData<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginRequestData<'a> {
    client_app_id: &'a str,
    client_app_version: &'a str,
    account_name: &'a str,
    login_name: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponseData {
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
}

/// Every Snowflake session endpoint answers with this wrapper.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    #[serde(default)]
    rowtype: Vec<RowType>,
    #[serde(default)]
    rowset: Vec<Vec<Value>>,
    query_id: Option<String>,
    sql_state: Option<String>,
    get_result_url: Option<String>,
    query_result_format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
}

impl Envelope {
    fn in_progress(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| QUERY_IN_PROGRESS.contains(&code))
    }

    fn query_data(&self) -> QueryData {
        self.data
            .clone()
            .and_then(|d| serde_json::from_value(d).ok())
            .unwrap_or_default()
    }

    fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{message} ({code})"),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => format!("warehouse error {code}"),
            (None, None) => "warehouse reported failure without a message".to_string(),
        }
    }

    fn into_result(self) -> Result<QueryResult, WarehouseError> {
        let data = self.query_data();
        if !self.success {
            return Err(WarehouseError::statement(
                self.describe(),
                self.code,
                data.sql_state,
            ));
        }
        if data
            .query_result_format
            .as_deref()
            .is_some_and(|f| !f.eq_ignore_ascii_case("json"))
        {
            return Err(WarehouseError::request(format!(
                "unsupported result format {:?}",
                data.query_result_format
            )));
        }
        let rows = data
            .rowset
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        Ok(QueryResult {
            query_id: data.query_id,
            columns: data.rowtype.into_iter().map(|c| c.name).collect(),
            rows,
        })
    }
}

fn cell_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Opens sessions through Snowflake's REST session protocol.
#[derive(Debug, Clone)]
pub struct SnowflakeConnector {
    client: Client,
    base_url: Option<String>,
    poll_interval: Duration,
}

impl SnowflakeConnector {
    pub fn new() -> Result<Self, WarehouseError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(format!("{CLIENT_APP_ID}/{CLIENT_APP_VERSION}"))
            .build()
            .map_err(|e| WarehouseError::failed_to_connect(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: None,
            poll_interval: Duration::from_secs(1),
        })
    }

    /// Talk to `base_url` instead of the account's default host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Delay between polls of a statement that is still running.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn base_url_for(&self, account: &str) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| account_url(account))
    }
}

#[async_trait]
impl WarehouseConnector for SnowflakeConnector {
    type Session = SnowflakeSession;

    async fn connect(
        &self,
        credentials: &WarehouseCredentials,
    ) -> Result<SnowflakeSession, WarehouseError> {
        let base_url = self.base_url_for(&credentials.account);
        let request_id = Uuid::new_v4().to_string();
        let body = LoginRequest {
            data: LoginRequestData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: CLIENT_APP_VERSION,
                account_name: account_name(&credentials.account),
                login_name: &credentials.user,
                password: &credentials.password,
            },
        };

        debug!("logging in to {} as {}", base_url, credentials.user);
        let resp = self
            .client
            .post(format!("{base_url}/session/v1/login-request"))
            .query(&[
                ("request_id", request_id.as_str()),
                ("warehouse", credentials.warehouse.as_str()),
                ("databaseName", credentials.database.as_str()),
                ("schemaName", credentials.schema.as_str()),
            ])
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                WarehouseError::failed_to_connect(format!("login request to {base_url} failed: {e}"))
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WarehouseError::failed_to_connect(format!(
                "login to {base_url} returned HTTP {status}"
            )));
        }
        let envelope: Envelope = resp.json().await.map_err(|e| {
            WarehouseError::failed_to_connect(format!("unreadable login response: {e}"))
        })?;
        if !envelope.success {
            return Err(WarehouseError::failed_to_connect(envelope.describe()));
        }
        let data: LoginResponseData = envelope
            .data
            .and_then(|d| serde_json::from_value(d).ok())
            .ok_or_else(|| {
                WarehouseError::failed_to_connect("login response carried no session token")
            })?;

        info!(
            "opened session for {} on account {} ({}.{})",
            credentials.user, credentials.account, credentials.database, credentials.schema
        );
        Ok(SnowflakeSession {
            client: self.client.clone(),
            base_url,
            token: data.token,
            sequence: 0,
            poll_interval: self.poll_interval,
            closed: false,
        })
    }
}

pub struct SnowflakeSession {
    client: Client,
    base_url: String,
    token: String,
    sequence: u64,
    poll_interval: Duration,
    closed: bool,
}

impl fmt::Debug for SnowflakeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeSession")
            .field("base_url", &self.base_url)
            .field("sequence", &self.sequence)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SnowflakeSession {
    fn auth_header(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token)
    }

    async fn poll(&self, result_url: &str) -> Result<Envelope, WarehouseError> {
        tokio::time::sleep(self.poll_interval).await;
        let envelope = self
            .client
            .get(format!("{}{}", self.base_url, result_url))
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/snowflake")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope)
    }
}

#[async_trait]
impl WarehouseSession for SnowflakeSession {
    async fn execute(&mut self, sql: &str) -> Result<QueryResult, WarehouseError> {
        if self.closed {
            return Err(WarehouseError::session_closed("statement submitted after close"));
        }
        self.sequence += 1;
        let request_id = Uuid::new_v4().to_string();
        debug!("statement #{}: {}", self.sequence, sql);

        let mut envelope: Envelope = self
            .client
            .post(format!("{}/queries/v1/query-request", self.base_url))
            .query(&[("requestId", request_id.as_str())])
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/snowflake")
            .json(&QueryRequest {
                sql_text: sql,
                async_exec: false,
                sequence_id: self.sequence,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        while envelope.in_progress() {
            let result_url = envelope.query_data().get_result_url.ok_or_else(|| {
                WarehouseError::request("statement still running but no result URL was returned")
            })?;
            debug!("statement #{} still running, polling {}", self.sequence, result_url);
            envelope = self.poll(&result_url).await?;
        }
        envelope.into_result()
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let resp = self
            .client
            .post(format!("{}/session", self.base_url))
            .query(&[("delete", "true")])
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| WarehouseError::failed_to_close(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WarehouseError::failed_to_close(format!("HTTP {status}")));
        }
        let envelope: Envelope = resp
            .json()
            .await
            .map_err(|e| WarehouseError::failed_to_close(e.to_string()))?;
        if !envelope.success {
            return Err(WarehouseError::failed_to_close(envelope.describe()));
        }
        info!("session closed");
        Ok(())
    }
}

impl Drop for SnowflakeSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!("session dropped without close, releasing it in the background");
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let request = self
            .client
            .post(format!("{}/session", self.base_url))
            .query(&[("delete", "true")])
            .header(AUTHORIZATION, self.auth_header());
        handle.spawn(async move {
            if let Err(e) = request.send().await {
                warn!("background session close failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> WarehouseCredentials {
        WarehouseCredentials {
            user: "loader".into(),
            password: "pw".into(),
            account: "xy12345.ap-south-1.aws".into(),
            warehouse: "LOAD_WH".into(),
            database: "RAW_DB".into(),
            schema: "LANDING".into(),
        }
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/session/v1/login-request"))
            .and(query_param("warehouse", "LOAD_WH"))
            .and(query_param("databaseName", "RAW_DB"))
            .and(query_param("schemaName", "LANDING"))
            .and(body_partial_json(json!({
                "data": {"ACCOUNT_NAME": "xy12345", "LOGIN_NAME": "loader", "PASSWORD": "pw"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"token": "tok-1", "masterToken": "master-1"},
                "code": null,
                "message": null,
                "success": true
            })))
            .mount(server)
            .await;
    }

    fn connector(server: &MockServer) -> SnowflakeConnector {
        SnowflakeConnector::new()
            .unwrap()
            .with_base_url(server.uri())
            .with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn default_host_comes_from_account() {
        assert_eq!(
            account_url("XY12345.ap-south-1.aws"),
            "https://xy12345.ap-south-1.aws.snowflakecomputing.com"
        );
        assert_eq!(account_name("xy12345.ap-south-1.aws"), "xy12345");
        assert_eq!(account_name("myorg-myacct"), "myorg-myacct");
    }

    #[tokio::test]
    async fn runs_ddl_and_reports_status() -> Result<(), WarehouseError> {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/queries/v1/query-request"))
            .and(header("authorization", "Snowflake Token=\"tok-1\""))
            .and(body_partial_json(json!({
                "sqlText": "CREATE OR REPLACE FILE FORMAT FF1 TYPE=JSON",
                "sequenceId": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "rowtype": [{"name": "status", "type": "text"}],
                    "rowset": [["File format FF1 successfully created."]],
                    "queryId": "01b2-0001"
                },
                "code": null,
                "message": null,
                "success": true
            })))
            .mount(&server)
            .await;

        let mut session = connector(&server).connect(&credentials()).await?;
        let result = session
            .execute("CREATE OR REPLACE FILE FORMAT FF1 TYPE=JSON")
            .await?;
        assert_eq!(result.status(), Some("File format FF1 successfully created."));
        assert_eq!(result.query_id.as_deref(), Some("01b2-0001"));
        session.closed = true;
        Ok(())
    }

    #[tokio::test]
    async fn bad_password_is_a_connect_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session/v1/login-request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"nextAction": "RETRY_LOGIN"},
                "code": "390100",
                "message": "Incorrect username or password was specified.",
                "success": false
            })))
            .mount(&server)
            .await;

        let err = connector(&server).connect(&credentials()).await.unwrap_err();
        match err {
            WarehouseError::FailedToConnect { context, .. } => {
                assert_eq!(
                    context.message(),
                    "Incorrect username or password was specified. (390100)"
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_statement_carries_code_and_state() -> Result<(), WarehouseError> {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/queries/v1/query-request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"sqlState": "42601", "queryId": "01b2-0002"},
                "code": "001003",
                "message": "SQL compilation error: syntax error line 1 at position 7",
                "success": false
            })))
            .mount(&server)
            .await;

        let mut session = connector(&server).connect(&credentials()).await?;
        let err = session.execute("CREATE OR REPLAC TABLE RAW1").await.unwrap_err();
        match err {
            WarehouseError::StatementFailed { code, sql_state, .. } => {
                assert_eq!(code.as_deref(), Some("001003"));
                assert_eq!(sql_state.as_deref(), Some("42601"));
            }
            other => panic!("unexpected {other:?}"),
        }
        session.closed = true;
        Ok(())
    }

    #[tokio::test]
    async fn long_copy_is_polled_to_completion() -> Result<(), WarehouseError> {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/queries/v1/query-request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"getResultUrl": "/queries/01b2-0003/result", "queryId": "01b2-0003"},
                "code": "333334",
                "message": "Asynchronous execution in progress.",
                "success": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/queries/01b2-0003/result"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "rowtype": [{"name": "file"}, {"name": "status"}, {"name": "rows_loaded"}],
                    "rowset": [["s3://bucket/path/sample.json", "LOADED", "2"]],
                    "queryId": "01b2-0003"
                },
                "code": null,
                "message": null,
                "success": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = connector(&server).connect(&credentials()).await?;
        let result = session
            .execute("COPY INTO RAW1 FROM @STG1/sample.json FILE_FORMAT='FF1'")
            .await?;
        assert_eq!(result.value(0, "rows_loaded"), Some("2"));
        session.closed = true;
        Ok(())
    }

    #[tokio::test]
    async fn close_is_sent_once() -> Result<(), WarehouseError> {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .and(query_param("delete", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null, "code": null, "message": null, "success": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = connector(&server).connect(&credentials()).await?;
        session.close().await?;
        session.close().await?;
        let err = session.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, WarehouseError::SessionClosed { .. }));
        Ok(())
    }
}
