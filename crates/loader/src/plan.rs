use crate::state::PipelineState;
use common::config::LoadTargets;
use common::error::LoadError;
use minijinja::{context, Environment};
use std::fmt;

// `.sql` template names keep minijinja's auto-escaping off.
const TEMPLATES: [(&str, &str); 4] = [
    (
        "file_format.sql",
        "CREATE OR REPLACE FILE FORMAT {{ file_format }} TYPE=JSON",
    ),
    (
        "raw_table.sql",
        "CREATE OR REPLACE TABLE {{ raw_table }} (json_data VARIANT)",
    ),
    (
        "stage.sql",
        "CREATE OR REPLACE STAGE {{ stage }} STORAGE_INTEGRATION={{ integration }} URL='{{ url }}' FILE_FORMAT='{{ file_format }}'",
    ),
    (
        "copy_into.sql",
        "COPY INTO {{ raw_table }} FROM @{{ stage }}/{{ load_file }} FILE_FORMAT='{{ file_format }}'",
    ),
];

/// One of the four statements a run issues, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateFileFormat,
    CreateRawTable,
    CreateStage,
    CopyInto,
}

impl Step {
    pub const ALL: [Step; 4] = [
        Step::CreateFileFormat,
        Step::CreateRawTable,
        Step::CreateStage,
        Step::CopyInto,
    ];

    fn template(self) -> &'static str {
        match self {
            Step::CreateFileFormat => "file_format.sql",
            Step::CreateRawTable => "raw_table.sql",
            Step::CreateStage => "stage.sql",
            Step::CopyInto => "copy_into.sql",
        }
    }

    /// What the operator sees before the statement runs.
    pub fn progress_line(self) -> &'static str {
        match self {
            Step::CreateFileFormat => "Creating File format...",
            Step::CreateRawTable => "Creating raw table for JSON data...",
            Step::CreateStage => "Creating external stage using the S3 bucket...",
            Step::CopyInto => "Copying JSON data from S3 bucket to raw table...",
        }
    }

    /// State reached once the statement succeeds.
    pub fn completed_state(self) -> PipelineState {
        match self {
            Step::CreateFileFormat => PipelineState::FormatCreated,
            Step::CreateRawTable => PipelineState::TableCreated,
            Step::CreateStage => PipelineState::StageCreated,
            Step::CopyInto => PipelineState::Loaded,
        }
    }

    pub fn is_provisioning(self) -> bool {
        !matches!(self, Step::CopyInto)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::CreateFileFormat => "create file format",
            Step::CreateRawTable => "create raw table",
            Step::CreateStage => "create stage",
            Step::CopyInto => "copy into",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStatement {
    pub step: Step,
    pub sql: String,
}

/// The rendered statements for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementPlan {
    statements: Vec<PlannedStatement>,
}

impl StatementPlan {
    pub fn statements(&self) -> &[PlannedStatement] {
        &self.statements
    }

    pub fn provisioning(&self) -> impl Iterator<Item = &PlannedStatement> {
        self.statements.iter().filter(|s| s.step.is_provisioning())
    }

    pub fn load(&self) -> Option<&PlannedStatement> {
        self.statements.iter().find(|s| s.step == Step::CopyInto)
    }

    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.sql.as_str()).collect()
    }
}

impl fmt::Display for StatementPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            writeln!(f, "-- {}", stmt.step)?;
            writeln!(f, "{};", stmt.sql)?;
        }
        Ok(())
    }
}

/// Render the file format, table, stage and COPY statements for `targets`.
pub fn render_plan(targets: &LoadTargets) -> Result<StatementPlan, LoadError> {
    let mut env = Environment::new();
    for (name, source) in TEMPLATES {
        env.add_template(name, source)
            .map_err(|e| LoadError::configuration(format!("template {name}: {e}")))?;
    }
    let ctx = context! {
        file_format => &targets.file_format_name,
        raw_table => &targets.raw_table_name,
        stage => &targets.stage_name,
        integration => &targets.storage_integration_name,
        url => &targets.storage_location_url,
        load_file => &targets.load_file_name,
    };

    let statements = Step::ALL
        .into_iter()
        .map(|step| {
            let sql = env
                .get_template(step.template())
                .and_then(|t| t.render(&ctx))
                .map_err(|e| LoadError::configuration(format!("rendering {step}: {e}")))?;
            Ok(PlannedStatement { step, sql })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    Ok(StatementPlan { statements })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets() -> LoadTargets {
        LoadTargets {
            stage_name: "STG1".into(),
            file_format_name: "FF1".into(),
            storage_integration_name: "INT1".into(),
            raw_table_name: "RAW1".into(),
            storage_location_url: "s3://bucket/path".into(),
            storage_aws_role_arn: "arn:aws:iam::123456789012:role/loader".into(),
            load_file_name: "sample.json".into(),
        }
    }

    #[test]
    fn renders_documented_statements_byte_for_byte() {
        let plan = render_plan(&targets()).unwrap();
        assert_eq!(
            plan.sql(),
            vec![
                "CREATE OR REPLACE FILE FORMAT FF1 TYPE=JSON",
                "CREATE OR REPLACE TABLE RAW1 (json_data VARIANT)",
                "CREATE OR REPLACE STAGE STG1 STORAGE_INTEGRATION=INT1 URL='s3://bucket/path' FILE_FORMAT='FF1'",
                "COPY INTO RAW1 FROM @STG1/sample.json FILE_FORMAT='FF1'",
            ]
        );
    }

    #[test]
    fn qualified_and_quoted_names_are_not_escaped() {
        let mut t = targets();
        t.raw_table_name = r#"RAW_DB.LANDING."Orders & Returns""#.into();
        t.load_file_name = "raw/2024/01/orders.json".into();
        let plan = render_plan(&t).unwrap();
        assert_eq!(
            plan.statements()[1].sql,
            r#"CREATE OR REPLACE TABLE RAW_DB.LANDING."Orders & Returns" (json_data VARIANT)"#
        );
        assert_eq!(
            plan.load().unwrap().sql,
            r#"COPY INTO RAW_DB.LANDING."Orders & Returns" FROM @STG1/raw/2024/01/orders.json FILE_FORMAT='FF1'"#
        );
    }

    #[test]
    fn provisioning_precedes_load() {
        let plan = render_plan(&targets()).unwrap();
        let steps: Vec<Step> = plan.provisioning().map(|s| s.step).collect();
        assert_eq!(
            steps,
            vec![Step::CreateFileFormat, Step::CreateRawTable, Step::CreateStage]
        );
        assert_eq!(plan.load().map(|s| s.step), Some(Step::CopyInto));
    }

    #[test]
    fn display_is_a_runnable_script() {
        let text = render_plan(&targets()).unwrap().to_string();
        assert!(text.starts_with("-- create file format\nCREATE OR REPLACE FILE FORMAT FF1 TYPE=JSON;\n"));
        assert!(text.ends_with("FILE_FORMAT='FF1';\n"));
    }
}
