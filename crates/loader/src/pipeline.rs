use crate::load::Loader;
use crate::plan::{render_plan, StatementPlan};
use crate::provision::Provisioner;
use crate::state::{PipelineState, StateTrace};
use crate::step::{Progress, StepReport, StepRunner};
use common::config::LoadConfig;
use common::error::LoadError;
use log::{debug, error, info, warn};
use shared_clients::{WarehouseConnector, WarehouseSession};
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Upper bound on the COPY statement. `None` waits for it indefinitely.
    pub copy_timeout: Option<Duration>,
}

/// What a run did: the statements that completed and the states it passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub steps: Vec<StepReport>,
    pub transitions: Vec<PipelineState>,
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub report: LoadReport,
    pub error: Option<LoadError>,
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<LoadReport, LoadError> {
        match self.error {
            None => Ok(self.report),
            Some(err) => Err(err),
        }
    }
}

/// One provisioning-and-load run over a fixed configuration.
#[derive(Debug)]
pub struct Pipeline {
    config: LoadConfig,
    plan: StatementPlan,
    options: PipelineOptions,
    trace: StateTrace,
}

impl Pipeline {
    pub fn new(config: LoadConfig, options: PipelineOptions) -> Result<Self, LoadError> {
        let plan = render_plan(&config.targets)?;
        let mut trace = StateTrace::default();
        trace.advance(PipelineState::Configured);
        debug!(
            "storage integration {} assumes {}",
            config.targets.storage_integration_name, config.targets.storage_aws_role_arn
        );
        Ok(Self {
            config,
            plan,
            options,
            trace,
        })
    }

    pub fn plan(&self) -> &StatementPlan {
        &self.plan
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Connect, provision, load, and close the session whatever happened.
    pub async fn run<C, W>(self, connector: &C, out: &mut W) -> LoadOutcome
    where
        C: WarehouseConnector,
        W: Write,
    {
        let Pipeline {
            config,
            plan,
            options,
            mut trace,
        } = self;
        let mut progress = Progress::new(out);
        let mut steps = Vec::new();

        progress.line("Connecting to Snowflake...");
        let mut session = match connector.connect(&config.credentials).await {
            Ok(session) => session,
            Err(e) => {
                let err = LoadError::from(e);
                error!("{err}");
                progress.line(err.summary());
                trace.fail_and_close();
                return LoadOutcome {
                    report: LoadReport {
                        steps,
                        transitions: trace.into_states(),
                    },
                    error: Some(err),
                };
            }
        };
        trace.advance(PipelineState::Connected);
        progress.line("Connected Successfully.");

        let run_result = {
            let mut cursor = session.cursor();
            let mut runner = StepRunner::new(&mut progress, &mut trace, &mut steps);
            let result = match Provisioner::new(&plan).run(&mut cursor, &mut runner).await {
                Ok(()) => {
                    Loader::new(&plan, options.copy_timeout)
                        .run(&mut cursor, &mut runner)
                        .await
                }
                Err(e) => Err(e),
            };
            cursor.close();
            result
        };

        let close_result = session.close().await.map_err(LoadError::from);
        let error = match (run_result, close_result) {
            (Ok(()), Ok(())) => {
                trace.advance(PipelineState::Closed);
                info!("load finished, session closed");
                None
            }
            (Ok(()), Err(close_err)) => {
                error!("{close_err}");
                progress.line(close_err.summary());
                trace.fail_and_close();
                Some(close_err)
            }
            (Err(run_err), close) => {
                error!("{run_err}");
                progress.line(run_err.summary());
                if let Err(close_err) = close {
                    warn!("session close after failure also failed: {close_err}");
                }
                trace.fail_and_close();
                Some(run_err)
            }
        };

        LoadOutcome {
            report: LoadReport {
                steps,
                transitions: trace.into_states(),
            },
            error,
        }
    }
}
