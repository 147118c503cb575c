use crate::commands::run::{execute, runtime, validation_mode};
use crate::GlobalArgs;
use clap::Args;
use common::config::keys::{DEFAULT_SECRET_NAME, DEFAULT_SECRET_REGION};
use common::config::JobParameters;
use common::error::LoadError;
use loader::{ConfigSource, CredentialSource};
use log::{info, warn};
use shared_clients::secrets::AwsSecretsManager;
use std::io;

#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Secret holding SNOWFLAKE_USERNAME, SNOWFLAKE_PASSWORD and SNOWFLAKE_ACCOUNT
    #[arg(long = "secret-name", default_value = DEFAULT_SECRET_NAME)]
    pub secret_name: String,

    /// Region of the secret store
    #[arg(long, default_value = DEFAULT_SECRET_REGION)]
    pub region: String,

    /// Take the login from SNOWFLAKE_USERNAME/PASSWORD/ACCOUNT job parameters
    #[arg(long = "no-secrets-manager")]
    pub no_secrets_manager: bool,

    /// Job parameters as `--KEY value` or `--KEY=value`
    #[arg(
        value_name = "JOB_ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub job_args: Vec<String>,
}

/// Load as a managed job. The secret store client is only built when the
/// login comes from it.
pub fn handle_job(args: JobArgs, global: &GlobalArgs) -> Result<(), LoadError> {
    if global.env_file.is_some() {
        warn!("--env-file is ignored for job runs");
    }
    let params = JobParameters::parse(&args.job_args);
    info!("{} job parameter(s) received", params.len());

    let runtime = runtime()?;
    runtime.block_on(async move {
        let credentials = if args.no_secrets_manager {
            CredentialSource::Parameters
        } else {
            CredentialSource::SecretStore {
                secret_name: args.secret_name,
                store: Box::new(AwsSecretsManager::new(args.region).await),
            }
        };
        let source = ConfigSource::Job {
            params,
            credentials,
            validation: validation_mode(global),
        };
        execute(source, global, &mut io::stdout()).await
    })
}
