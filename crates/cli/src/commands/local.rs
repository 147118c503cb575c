use crate::commands::run::{execute_blocking, validation_mode};
use crate::GlobalArgs;
use clap::Args;
use common::config::LocalOptions;
use common::error::LoadError;
use loader::ConfigSource;

#[derive(Args, Debug, Clone, Default)]
pub struct LocalArgs {
    /// Use LOAD_FILE verbatim even when it names a local file
    #[arg(long = "skip-local-file-check")]
    pub skip_local_file_check: bool,
}

pub fn local_source(args: &LocalArgs, global: &GlobalArgs) -> ConfigSource {
    ConfigSource::Local(LocalOptions {
        env_file: global.env_file.clone(),
        validation: validation_mode(global),
        check_load_file: !args.skip_local_file_check,
    })
}

/// Load using `SNOWFLAKE_CRED_FILE` and the other local environment variables.
pub fn handle_local(args: &LocalArgs, global: &GlobalArgs) -> Result<(), LoadError> {
    execute_blocking(local_source(args, global), global)
}
