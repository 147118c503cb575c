use crate::plan::{PlannedStatement, Step};
use crate::state::StateTrace;
use common::error::LoadError;
use log::{info, warn};
use shared_clients::{Cursor, QueryResult, WarehouseError, WarehouseSession};
use std::fmt::Display;
use std::io::Write;
use std::time::Duration;

/// Operator-facing progress output. Write failures are logged, not fatal.
pub struct Progress<'w, W: Write> {
    out: &'w mut W,
}

impl<'w, W: Write> Progress<'w, W> {
    pub fn new(out: &'w mut W) -> Self {
        Self { out }
    }

    pub fn line(&mut self, text: impl Display) {
        if let Err(e) = writeln!(self.out, "{text}").and_then(|_| self.out.flush()) {
            warn!("could not write progress output: {e}");
        }
    }
}

/// A statement that ran, with the warehouse's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    pub sql: String,
    pub result: QueryResult,
}

/// Runs planned statements one by one, reporting and tracking state.
pub struct StepRunner<'a, 'w, W: Write> {
    pub(crate) progress: &'a mut Progress<'w, W>,
    pub(crate) trace: &'a mut StateTrace,
    pub(crate) reports: &'a mut Vec<StepReport>,
}

impl<'a, 'w, W: Write> StepRunner<'a, 'w, W> {
    pub fn new(
        progress: &'a mut Progress<'w, W>,
        trace: &'a mut StateTrace,
        reports: &'a mut Vec<StepReport>,
    ) -> Self {
        Self {
            progress,
            trace,
            reports,
        }
    }

    /// Execute one statement to completion, or until `timeout` elapses.
    pub async fn run<S>(
        &mut self,
        cursor: &mut Cursor<'_, S>,
        statement: &PlannedStatement,
        timeout: Option<Duration>,
    ) -> Result<(), LoadError>
    where
        S: WarehouseSession + ?Sized,
    {
        self.progress.line(statement.step.progress_line());
        info!("running {}", statement.step);

        let executed = match timeout {
            Some(limit) => {
                let running = cursor.execute(&statement.sql);
                match tokio::time::timeout(limit, running).await {
                    Ok(result) => result.cloned(),
                    Err(_) => Err(WarehouseError::timeout(format!(
                        "{} did not finish within {:?}",
                        statement.step, limit
                    ))),
                }
            }
            None => cursor.execute(&statement.sql).await.cloned(),
        };
        let result = executed.map_err(LoadError::from)?;

        if statement.step.is_provisioning() {
            self.progress
                .line(result.status().unwrap_or("(no status returned)"));
        } else if result.rows.is_empty() {
            self.progress.line("(no rows returned)");
        } else {
            self.progress.line(&result);
        }

        self.trace.advance(statement.step.completed_state());
        self.reports.push(StepReport {
            step: statement.step,
            sql: statement.sql.clone(),
            result,
        });
        Ok(())
    }
}
