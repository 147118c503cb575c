pub mod secrets;
pub mod session;
pub mod snowflake;

pub use session::{Cursor, QueryResult};

use async_trait::async_trait;
use common::config::WarehouseCredentials;
use common::error::diagnostics::DiagnosticMessage;
use common::error::LoadError;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("could not open session: {context}")]
    FailedToConnect {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("statement failed: {context}")]
    StatementFailed {
        context: DiagnosticMessage,
        code: Option<String>,
        sql_state: Option<String>,
    },
    #[error("request failed: {context}")]
    RequestFailed {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("statement timed out: {context}")]
    Timeout { context: DiagnosticMessage },
    #[error("session is closed: {context}")]
    SessionClosed { context: DiagnosticMessage },
    #[error("could not close session: {context}")]
    FailedToClose { context: DiagnosticMessage },
}

impl WarehouseError {
    #[track_caller]
    pub fn failed_to_connect(message: impl Into<String>) -> Self {
        Self::FailedToConnect {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn statement(
        message: impl Into<String>,
        code: Option<String>,
        sql_state: Option<String>,
    ) -> Self {
        Self::StatementFailed {
            context: DiagnosticMessage::new(message.into()),
            code,
            sql_state,
        }
    }

    #[track_caller]
    pub fn request(message: impl Into<String>) -> Self {
        Self::RequestFailed {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn session_closed(message: impl Into<String>) -> Self {
        Self::SessionClosed {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn failed_to_close(message: impl Into<String>) -> Self {
        Self::FailedToClose {
            context: DiagnosticMessage::new(message.into()),
        }
    }
}

impl From<reqwest::Error> for WarehouseError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        let message = match err.status() {
            Some(status) => format!("warehouse responded with {status}: {err}"),
            None if err.is_timeout() => format!("request timed out: {err}"),
            None if err.is_connect() => format!("could not reach warehouse: {err}"),
            None => err.to_string(),
        };
        WarehouseError::RequestFailed {
            context: DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    }
}

impl From<WarehouseError> for LoadError {
    #[track_caller]
    fn from(value: WarehouseError) -> Self {
        match value {
            WarehouseError::FailedToConnect { context, source } => {
                LoadError::Connection { context, source }
            }
            WarehouseError::FailedToClose { context } => LoadError::Connection {
                context,
                source: None,
            },
            WarehouseError::StatementFailed { context, code, .. } => LoadError::Statement {
                context,
                code,
                source: None,
            },
            WarehouseError::RequestFailed { context, source } => LoadError::Statement {
                context,
                code: None,
                source,
            },
            WarehouseError::Timeout { context } | WarehouseError::SessionClosed { context } => {
                LoadError::Statement {
                    context,
                    code: None,
                    source: None,
                }
            }
        }
    }
}

/// Opens authenticated warehouse sessions.
#[async_trait]
pub trait WarehouseConnector: Send + Sync {
    type Session: WarehouseSession;

    async fn connect(
        &self,
        credentials: &WarehouseCredentials,
    ) -> Result<Self::Session, WarehouseError>;
}

/// One authenticated session. Statements run one at a time, to completion.
#[async_trait]
pub trait WarehouseSession: Send {
    async fn execute(&mut self, sql: &str) -> Result<QueryResult, WarehouseError>;

    /// Release the session on the warehouse side. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<(), WarehouseError>;

    fn cursor(&mut self) -> Cursor<'_, Self>
    where
        Self: Sized,
    {
        Cursor::new(self)
    }
}
