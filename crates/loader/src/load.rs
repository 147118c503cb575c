use crate::plan::StatementPlan;
use crate::step::StepRunner;
use common::error::LoadError;
use log::info;
use shared_clients::{Cursor, WarehouseSession};
use std::io::Write;
use std::time::Duration;

/// Issues the COPY from the stage into the raw table.
///
/// Files already in the table's load history are skipped by the warehouse;
/// nothing here deduplicates.
pub struct Loader<'p> {
    plan: &'p StatementPlan,
    timeout: Option<Duration>,
}

impl<'p> Loader<'p> {
    pub fn new(plan: &'p StatementPlan, timeout: Option<Duration>) -> Self {
        Self { plan, timeout }
    }

    pub async fn run<S, W>(
        &self,
        cursor: &mut Cursor<'_, S>,
        runner: &mut StepRunner<'_, '_, W>,
    ) -> Result<(), LoadError>
    where
        S: WarehouseSession + ?Sized,
        W: Write,
    {
        let statement = self
            .plan
            .load()
            .ok_or_else(|| LoadError::configuration("plan has no COPY statement"))?;
        runner.run(cursor, statement, self.timeout).await?;
        if let Some(result) = cursor.last_result() {
            info!(
                "copy finished with {} result row(s){}",
                result.row_count(),
                result
                    .query_id
                    .as_deref()
                    .map(|id| format!(" (query {id})"))
                    .unwrap_or_default()
            );
        }
        Ok(())
    }
}
