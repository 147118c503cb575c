use crate::config::error::ConfigError;
use crate::config::keys::*;
use crate::config::record::{
    AccountLogin, LoadConfig, LoadTargets, SessionScope, TargetInputs, WarehouseCredentials,
};
use crate::config::validate::{owned, FieldCheck, ValidationMode};
use std::collections::HashMap;

/// Parameters handed to a managed job as `--KEY value` or `--KEY=value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobParameters {
    values: HashMap<String, String>,
}

impl JobParameters {
    /// Later occurrences of a key replace earlier ones. Tokens that are not
    /// `--KEY` flags or their values are ignored.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let mut values = HashMap::new();
        let mut iter = args.iter().peekable();
        while let Some(arg) = iter.next() {
            let Some(flag) = arg.strip_prefix("--") else {
                continue;
            };
            if flag.is_empty() {
                continue;
            }
            match flag.split_once('=') {
                Some((key, value)) => {
                    values.insert(key.to_string(), value.to_string());
                }
                None => {
                    let value = match iter.peek() {
                        Some(next) if !next.starts_with("--") => iter.next().cloned(),
                        _ => None,
                    };
                    values.insert(flag.to_string(), value.unwrap_or_default());
                }
            }
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Validate the non-secret parameters. With `inline_login` the account
    /// login is read from `SNOWFLAKE_USERNAME/PASSWORD/ACCOUNT` as well.
    pub fn settings(
        &self,
        validation: ValidationMode,
        inline_login: bool,
    ) -> Result<JobSettings, ConfigError> {
        let mut check = FieldCheck::new(validation);
        let inputs = TargetInputs {
            load_file: self.get(LOAD_FILE),
            stage_name: self.get(SNOWFLAKE_STAGE_NAME),
            raw_table_name: self.get(SNOWFLAKE_RAW_TABLE_NAME),
            file_format_name: self.get(SNOWFLAKE_FILE_FORMAT_NAME),
            storage_integration_name: self.get(SNOWFLAKE_STORAGE_INT_NAME),
            storage_aws_role_arn: self.get(S3_STORAGE_AWS_ROLE_ARN),
            storage_location_url: self.get(S3_STORAGE_ALLOWED_LOCATIONS),
        };
        let targets = LoadTargets::collect(&inputs, &mut check)?;

        for key in [SNOWFLAKE_WAREHOUSE, SNOWFLAKE_DATABASE, SNOWFLAKE_SCHEMA] {
            check.require(key, self.get(key))?;
        }
        if inline_login {
            for key in [SNOWFLAKE_USERNAME, SNOWFLAKE_PASSWORD, SNOWFLAKE_ACCOUNT] {
                check.require(key, self.get(key))?;
            }
        }
        check.finish()?;
        let targets = targets.ok_or_else(|| ConfigError::invalid(Vec::new()))?;

        let scope = SessionScope {
            warehouse: owned(self.get(SNOWFLAKE_WAREHOUSE)),
            database: owned(self.get(SNOWFLAKE_DATABASE)),
            schema: owned(self.get(SNOWFLAKE_SCHEMA)),
        };
        let login = inline_login.then(|| AccountLogin {
            user: owned(self.get(SNOWFLAKE_USERNAME)),
            // passwords are taken verbatim
            password: self.get(SNOWFLAKE_PASSWORD).unwrap_or_default().to_string(),
            account: owned(self.get(SNOWFLAKE_ACCOUNT)),
        });

        Ok(JobSettings {
            targets,
            scope,
            login,
            validation,
        })
    }
}

/// Validated job parameters, waiting for an account login.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub targets: LoadTargets,
    pub scope: SessionScope,
    /// Present when the login came in as plain parameters.
    pub login: Option<AccountLogin>,
    validation: ValidationMode,
}

impl JobSettings {
    /// Finish with a login fetched from elsewhere, typically a secret store.
    pub fn with_login(self, login: AccountLogin) -> Result<LoadConfig, ConfigError> {
        let credentials = WarehouseCredentials::new(login, self.scope);
        credentials.validate(self.validation)?;
        Ok(LoadConfig::new(credentials, self.targets))
    }

    /// Finish with the login supplied as parameters.
    pub fn into_config(mut self) -> Result<LoadConfig, ConfigError> {
        match self.login.take() {
            Some(login) => self.with_login(login),
            None => Err(ConfigError::invalid(vec![
                crate::config::validate::FieldProblem::missing(SNOWFLAKE_USERNAME),
            ])),
        }
    }
}
