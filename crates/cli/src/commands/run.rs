use crate::GlobalArgs;
use common::config::ValidationMode;
use common::error::LoadError;
use loader::{resolve_config, ConfigSource, Pipeline, PipelineOptions};
use log::info;
use shared_clients::snowflake::SnowflakeConnector;
use std::io::{self, Write};
use std::time::Duration;
use tokio::runtime::Runtime;

pub fn validation_mode(global: &GlobalArgs) -> ValidationMode {
    if global.fail_fast {
        ValidationMode::FirstMissing
    } else {
        ValidationMode::Exhaustive
    }
}

pub fn pipeline_options(global: &GlobalArgs) -> PipelineOptions {
    PipelineOptions {
        copy_timeout: global.copy_timeout_secs.map(Duration::from_secs),
    }
}

pub fn runtime() -> Result<Runtime, LoadError> {
    Runtime::new().map_err(|e| LoadError::configuration(format!("could not start runtime: {e}")))
}

/// Resolve `source` and either print the plan (dry run) or run it against
/// Snowflake, writing progress to `out`.
pub async fn execute<W: Write>(
    source: ConfigSource,
    global: &GlobalArgs,
    out: &mut W,
) -> Result<(), LoadError> {
    let config = resolve_config(source).await?;
    let pipeline = Pipeline::new(config, pipeline_options(global))?;

    if global.dry_run {
        info!("dry run, not connecting");
        write!(out, "{}", pipeline.plan())
            .map_err(|e| LoadError::configuration(format!("could not write plan: {e}")))?;
        return Ok(());
    }

    let mut connector = SnowflakeConnector::new()?;
    if let Some(host) = &global.host {
        connector = connector.with_base_url(host);
    }
    let report = pipeline.run(&connector, out).await.into_result()?;
    info!(
        "{} statement(s) completed, final state {}",
        report.steps.len(),
        report
            .transitions
            .last()
            .map(ToString::to_string)
            .unwrap_or_default()
    );
    Ok(())
}

pub fn execute_blocking(source: ConfigSource, global: &GlobalArgs) -> Result<(), LoadError> {
    let runtime = runtime()?;
    let mut stdout = io::stdout();
    runtime.block_on(execute(source, global, &mut stdout))
}
