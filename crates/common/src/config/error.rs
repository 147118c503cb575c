use crate::config::validate::FieldProblem;
use crate::error::diagnostics::DiagnosticMessage;
use std::{error::Error as StdError, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {context}")]
    Invalid {
        context: DiagnosticMessage,
        problems: Vec<FieldProblem>,
    },
    #[error("missing file: {context}")]
    MissingFile { context: DiagnosticMessage },
    #[error("could not parse credentials: {context}")]
    CredentialParse {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("load file rejected: {context}")]
    LoadFile {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("env file error: {context}")]
    EnvFile {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("filesystem error: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    #[track_caller]
    pub fn invalid(problems: Vec<FieldProblem>) -> Self {
        let message = problems
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Self::Invalid {
            context: DiagnosticMessage::new(message),
            problems,
        }
    }

    #[track_caller]
    pub fn missing_file(field: &str, path: impl AsRef<Path>) -> Self {
        let message = format!(
            "{} points at '{}', which does not exist",
            field,
            path.as_ref().display()
        );
        Self::MissingFile {
            context: DiagnosticMessage::new(message),
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
    pub fn credential_json(origin: &str, err: serde_json::Error) -> Self {
        let message = format!("{}: {}", origin, err);
        Self::CredentialParse {
            context: DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    }

    #[track_caller]
    pub fn load_file(path: impl AsRef<Path>, err: serde_json::Error) -> Self {
        let message = format!(
            "'{}' is not a valid JSON document: {}",
            path.as_ref().display(),
            err
        );
        Self::LoadFile {
            context: DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    }

    #[track_caller]
    pub fn empty_load_file(path: impl AsRef<Path>) -> Self {
        let message = format!("'{}' holds no JSON documents", path.as_ref().display());
        Self::LoadFile {
            context: DiagnosticMessage::new(message),
            source: None,
        }
    }

    #[track_caller]
    pub fn env_file(path: impl AsRef<Path>, err: dotenv::Error) -> Self {
        let message = format!("could not load '{}': {}", path.as_ref().display(), err);
        Self::EnvFile {
            context: DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    }

    /// Field names reported as missing, in the order they were checked.
    pub fn missing_fields(&self) -> Vec<&str> {
        match self {
            ConfigError::Invalid { problems, .. } => problems
                .iter()
                .filter_map(|p| match p {
                    FieldProblem::Missing { field } => Some(field.as_str()),
                    FieldProblem::Invalid { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();
        ConfigError::Io {
            context: DiagnosticMessage::new(message),
            source: err,
        }
    }
}
