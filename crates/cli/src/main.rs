mod commands;

use crate::commands::job::{handle_job, JobArgs};
use crate::commands::local::{handle_local, LocalArgs};
use clap::{ArgAction, Args, Parser, Subcommand};
use common::error::LoadError;
use logging::{init_logger, level_for_verbosity};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "snowload",
    version,
    about = "Provision a JSON landing area in Snowflake and bulk-load a staged file"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// `.env` file to load before reading the environment
    #[arg(long = "env-file", value_name = "PATH", global = true)]
    pub env_file: Option<PathBuf>,

    /// Stop at the first missing or invalid setting
    #[arg(long = "fail-fast", global = true)]
    pub fail_fast: bool,

    /// Validate configuration and print the statements without connecting
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,

    /// Give up on the COPY statement after this many seconds
    #[arg(long = "copy-timeout-secs", value_name = "N", global = true)]
    pub copy_timeout_secs: Option<u64>,

    /// Snowflake base URL, instead of the account's default host
    #[arg(long, env = "SNOWFLAKE_HOST", value_name = "URL", global = true)]
    pub host: Option<String>,

    /// More log output on stderr; repeat for trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Load using environment variables and a local credentials file
    Local(LocalArgs),
    /// Load as a managed job, from job parameters and a secret store
    Job(JobArgs),
}

fn run_cmd(func: Result<(), LoadError>) {
    if let Err(e) = func {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(level_for_verbosity(cli.global.verbose));

    match cli.command {
        Cmd::Local(args) => run_cmd(handle_local(&args, &cli.global)),
        Cmd::Job(args) => run_cmd(handle_job(args, &cli.global)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "snowload",
            "local",
            "--skip-local-file-check",
            "--fail-fast",
            "--copy-timeout-secs",
            "600",
        ])
        .unwrap();
        assert!(cli.global.fail_fast);
        assert_eq!(cli.global.copy_timeout_secs, Some(600));
        match cli.command {
            Cmd::Local(args) => assert!(args.skip_local_file_check),
            Cmd::Job(_) => panic!("expected local"),
        }
    }

    #[test]
    fn job_arguments_are_passed_through() {
        let cli = Cli::try_parse_from([
            "snowload",
            "--dry-run",
            "job",
            "--region",
            "eu-west-1",
            "--JOB_NAME",
            "snowflake-load",
            "--LOAD_FILE=sample.json",
        ])
        .unwrap();
        assert!(cli.global.dry_run);
        match cli.command {
            Cmd::Job(args) => {
                assert_eq!(args.region, "eu-west-1");
                assert_eq!(args.secret_name, "snowflake_credentials");
                assert_eq!(
                    args.job_args,
                    vec!["--JOB_NAME", "snowflake-load", "--LOAD_FILE=sample.json"]
                );
            }
            Cmd::Local(_) => panic!("expected job"),
        }
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["snowload", "-vv", "local"]).unwrap();
        assert_eq!(cli.global.verbose, 2);
    }
}
