use crate::config::error::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// An unquoted or double-quoted name, optionally qualified as `db.schema.name`.
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    let part = r#"(?:[A-Za-z_][A-Za-z0-9_$]*|"[^"']+")"#;
    Regex::new(&format!(r"^{part}(?:\.{part}){{0,2}}$")).expect("identifier pattern compiles")
});

static STORAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:s3|s3gov|gcs|azure)://[^\s']+$").expect("storage url pattern compiles")
});

/// How many problems to collect before giving up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Check every field and report all problems at once.
    #[default]
    Exhaustive,
    /// Stop at the first problem.
    FirstMissing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    Missing { field: String },
    Invalid { field: String, reason: String },
}

impl FieldProblem {
    pub fn missing(field: impl Into<String>) -> Self {
        FieldProblem::Missing {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FieldProblem::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            FieldProblem::Missing { field } | FieldProblem::Invalid { field, .. } => field,
        }
    }
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::Missing { field } => write!(f, "{field} is missing"),
            FieldProblem::Invalid { field, reason } => write!(f, "{field} {reason}"),
        }
    }
}

/// Accumulates field problems according to a [`ValidationMode`].
///
/// In [`ValidationMode::FirstMissing`] the first recorded problem is returned
/// straight away as an error; otherwise problems pile up until [`finish`].
///
/// [`finish`]: FieldCheck::finish
#[derive(Debug)]
pub struct FieldCheck {
    mode: ValidationMode,
    problems: Vec<FieldProblem>,
}

impl FieldCheck {
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            problems: Vec::new(),
        }
    }

    /// Empty and whitespace-only values count as absent.
    pub fn require(&mut self, field: &str, value: Option<&str>) -> Result<(), ConfigError> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(()),
            _ => self.record(FieldProblem::missing(field)),
        }
    }

    /// Apply `rule` to a present value. Absent values are left to [`require`].
    ///
    /// [`require`]: FieldCheck::require
    pub fn check(
        &mut self,
        field: &str,
        value: Option<&str>,
        rule: fn(&str) -> Result<(), String>,
    ) -> Result<(), ConfigError> {
        match value {
            Some(v) if !v.trim().is_empty() => match rule(v.trim()) {
                Ok(()) => Ok(()),
                Err(reason) => self.record(FieldProblem::invalid(field, reason)),
            },
            _ => Ok(()),
        }
    }

    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    pub fn finish(self) -> Result<(), ConfigError> {
        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::invalid(self.problems))
        }
    }

    fn record(&mut self, problem: FieldProblem) -> Result<(), ConfigError> {
        self.problems.push(problem);
        match self.mode {
            ValidationMode::FirstMissing => {
                Err(ConfigError::invalid(std::mem::take(&mut self.problems)))
            }
            ValidationMode::Exhaustive => Ok(()),
        }
    }
}

pub fn identifier(value: &str) -> Result<(), String> {
    if IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(format!("'{value}' is not a valid warehouse identifier"))
    }
}

pub fn storage_url(value: &str) -> Result<(), String> {
    if STORAGE_URL.is_match(value) {
        Ok(())
    } else {
        Err(format!(
            "'{value}' must be an s3://, s3gov://, gcs:// or azure:// location without quotes or whitespace"
        ))
    }
}

pub fn stage_path(value: &str) -> Result<(), String> {
    if value.contains(['\'', '"']) || value.chars().any(char::is_whitespace) {
        Err(format!("'{value}' must not contain quotes or whitespace"))
    } else if value.trim_start_matches('/').is_empty() {
        Err("must name a file".to_string())
    } else {
        Ok(())
    }
}

/// Trimmed copy of a value that already passed [`FieldCheck`].
pub(crate) fn owned(value: Option<&str>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        for ok in [
            "FF1",
            "raw_table",
            "_x$1",
            "DB.SCHEMA.RAW1",
            r#""My Table""#,
            r#"db."quoted.name""#,
        ] {
            assert!(identifier(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in [
            "1abc",
            "a-b",
            "a b",
            "a;drop",
            "a.b.c.d",
            r#""""#,
            "tbl'",
            r#""ff'x""#,
        ] {
            assert!(identifier(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn storage_urls() {
        assert!(storage_url("s3://bucket/path").is_ok());
        assert!(storage_url("azure://acct.blob.core.windows.net/c/").is_ok());
        assert!(storage_url("https://bucket/path").is_err());
        assert!(storage_url("s3://bucket/it's").is_err());
    }

    #[test]
    fn stage_paths() {
        assert!(stage_path("sample.json").is_ok());
        assert!(stage_path("raw/2024/01/sample.json").is_ok());
        assert!(stage_path("/").is_err());
        assert!(stage_path("a b.json").is_err());
        assert!(stage_path("x'.json").is_err());
    }

    #[test]
    fn exhaustive_collects_every_problem() {
        let mut check = FieldCheck::new(ValidationMode::Exhaustive);
        check.require("A", None).unwrap();
        check.require("B", Some("   ")).unwrap();
        check.require("C", Some("ok")).unwrap();
        check.check("D", Some("1bad"), identifier).unwrap();
        let err = check.finish().unwrap_err();
        assert_eq!(err.missing_fields(), vec!["A", "B"]);
        let text = err.to_string();
        assert!(text.contains("D '1bad' is not a valid warehouse identifier"));
    }

    #[test]
    fn first_missing_short_circuits() {
        let mut check = FieldCheck::new(ValidationMode::FirstMissing);
        let err = check.require("A", None).unwrap_err();
        assert_eq!(err.missing_fields(), vec!["A"]);
    }
}
