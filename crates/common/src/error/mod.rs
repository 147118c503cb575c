pub mod diagnostics;
pub use crate::config::error::ConfigError;
pub use diagnostics::DiagnosticMessage;

use std::error::Error as StdError;
use thiserror::Error;

/// Every way a load run can fail, as reported to the operator.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("configuration error: {context}")]
    Configuration {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("credential parse error: {context}")]
    CredentialParse {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("secret retrieval failed: {context}")]
    SecretRetrieval {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("connection failed: {context}")]
    Connection {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("statement failed: {context}")]
    Statement {
        context: DiagnosticMessage,
        /// Warehouse error code, when the warehouse returned one.
        code: Option<String>,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl LoadError {
    #[track_caller]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn credential_parse(message: impl Into<String>) -> Self {
        Self::CredentialParse {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn secret_retrieval<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let message = err.to_string();
        Self::SecretRetrieval {
            context: DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    }

    #[track_caller]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn statement(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Statement {
            context: DiagnosticMessage::new(message.into()),
            code,
            source: None,
        }
    }

    pub fn context(&self) -> &DiagnosticMessage {
        match self {
            LoadError::Configuration { context, .. }
            | LoadError::CredentialParse { context, .. }
            | LoadError::SecretRetrieval { context, .. }
            | LoadError::Connection { context, .. }
            | LoadError::Statement { context, .. } => context,
        }
    }

    /// One line for the operator, without the source location.
    pub fn summary(&self) -> String {
        let kind = match self {
            LoadError::Configuration { .. } => "configuration error",
            LoadError::CredentialParse { .. } => "credential parse error",
            LoadError::SecretRetrieval { .. } => "secret retrieval failed",
            LoadError::Connection { .. } => "connection failed",
            LoadError::Statement { .. } => "statement failed",
        };
        format!("{kind}: {:#}", self.context())
    }

    /// True for failures raised before any warehouse session exists.
    pub fn is_pre_connection(&self) -> bool {
        matches!(
            self,
            LoadError::Configuration { .. }
                | LoadError::CredentialParse { .. }
                | LoadError::SecretRetrieval { .. }
        )
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        if self.is_pre_connection() {
            2
        } else {
            1
        }
    }
}

impl From<ConfigError> for LoadError {
    #[track_caller]
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::CredentialParse { context, source } => {
                LoadError::CredentialParse { context, source }
            }
            other => {
                let message = other.to_string();
                LoadError::Configuration {
                    context: DiagnosticMessage::new(message),
                    source: Some(Box::new(other)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate::FieldProblem;

    #[test]
    fn config_errors_map_to_configuration() {
        let err: LoadError =
            ConfigError::invalid(vec![FieldProblem::missing("SNOWFLAKE_STAGE_NAME")]).into();
        assert!(matches!(err, LoadError::Configuration { .. }));
        assert!(err.to_string().contains("SNOWFLAKE_STAGE_NAME"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn converted_errors_keep_their_source() {
        let err: LoadError =
            ConfigError::invalid(vec![FieldProblem::missing("LOAD_FILE")]).into();
        let source = StdError::source(&err).expect("config error kept as source");
        assert!(source.to_string().contains("LOAD_FILE"));

        assert!(StdError::source(&LoadError::connection("refused")).is_none());
    }

    #[test]
    fn credential_parse_keeps_its_kind() {
        let err: LoadError = ConfigError::credential_parse("missing field `user`").into();
        assert!(matches!(err, LoadError::CredentialParse { .. }));
        assert!(err.is_pre_connection());
    }

    #[test]
    fn summary_drops_the_location() {
        let err = LoadError::connection("Incorrect username or password was specified.");
        assert_eq!(
            err.summary(),
            "connection failed: Incorrect username or password was specified."
        );
        assert!(err.to_string().contains("(at "));
    }

    #[test]
    fn statement_errors_are_runtime_failures() {
        let err = LoadError::statement("Object 'RAW1' does not exist", Some("002003".into()));
        assert!(!err.is_pre_connection());
        assert_eq!(err.exit_code(), 1);
    }
}
