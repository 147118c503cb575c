pub mod load;
pub mod pipeline;
pub mod plan;
pub mod provision;
pub mod resolve;
pub mod state;
pub mod step;

pub use pipeline::{LoadOutcome, LoadReport, Pipeline, PipelineOptions};
pub use plan::{render_plan, StatementPlan, Step};
pub use resolve::{resolve_config, ConfigSource, CredentialSource};
pub use state::PipelineState;

use common::error::LoadError;
use shared_clients::WarehouseConnector;
use std::io::Write;

/// Resolve configuration, then provision and load in one go.
///
/// Configuration failures return before `connector` is touched.
pub async fn run_load<C, W>(
    source: ConfigSource,
    connector: &C,
    options: PipelineOptions,
    out: &mut W,
) -> Result<LoadReport, LoadError>
where
    C: WarehouseConnector,
    W: Write,
{
    let config = resolve_config(source).await?;
    let pipeline = Pipeline::new(config, options)?;
    pipeline.run(connector, out).await.into_result()
}
