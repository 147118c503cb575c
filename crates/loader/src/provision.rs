use crate::plan::StatementPlan;
use crate::step::StepRunner;
use common::error::LoadError;
use log::info;
use shared_clients::{Cursor, WarehouseSession};
use std::io::Write;

/// Recreates the file format, raw table and external stage, in that order.
///
/// Every statement is `CREATE OR REPLACE`, so repeating a run converges on the
/// same objects. The first failure stops the remaining statements.
pub struct Provisioner<'p> {
    plan: &'p StatementPlan,
}

impl<'p> Provisioner<'p> {
    pub fn new(plan: &'p StatementPlan) -> Self {
        Self { plan }
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
        for statement in self.plan.provisioning() {
            runner.run(cursor, statement, None).await?;
        }
        info!("warehouse objects provisioned");
        Ok(())
    }
}
