use crate::{WarehouseError, WarehouseSession};
use std::fmt;

/// Rows returned by one statement. Values arrive as text, `None` for NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub query_id: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            query_id: None,
            columns,
            rows,
        }
    }

    /// First column of the first row, which is where DDL reports its status.
    pub fn status(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Look up a value by column name, case-insensitively.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }
}

impl fmt::Display for QueryResult {
    /// One line per row as `column=value` pairs, `NULL` for missing values.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let rendered = row
                .iter()
                .enumerate()
                .map(|(idx, value)| {
                    let name = self.columns.get(idx).map(String::as_str).unwrap_or("?");
                    format!("{}={}", name, value.as_deref().unwrap_or("NULL"))
                })
                .collect::<Vec<_>>()
                .join(", ");
            f.write_str(&rendered)?;
        }
        Ok(())
    }
}

/// Statement handle borrowed from a session. Holds the most recent result.
pub struct Cursor<'s, S: WarehouseSession + ?Sized> {
    session: &'s mut S,
    last: Option<QueryResult>,
    closed: bool,
}

impl<'s, S: WarehouseSession + ?Sized> Cursor<'s, S> {
    pub fn new(session: &'s mut S) -> Self {
        Self {
            session,
            last: None,
            closed: false,
        }
    }

    pub async fn execute(&mut self, sql: &str) -> Result<&QueryResult, WarehouseError> {
        if self.closed {
            return Err(WarehouseError::session_closed("cursor was already closed"));
        }
        self.last = None;
        let result = self.session.execute(sql).await?;
        Ok(self.last.insert(result))
    }

    pub fn fetch_one(&self) -> Option<&[Option<String>]> {
        self.last.as_ref()?.rows.first().map(Vec::as_slice)
    }

    pub fn fetch_all(&self) -> &[Vec<Option<String>>] {
        self.last.as_ref().map(|r| r.rows.as_slice()).unwrap_or(&[])
    }

    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drop buffered results and refuse further statements.
    pub fn close(&mut self) {
        self.last = None;
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo {
        executed: Vec<String>,
    }

    #[async_trait]
    impl WarehouseSession for Echo {
        async fn execute(&mut self, sql: &str) -> Result<QueryResult, WarehouseError> {
            self.executed.push(sql.to_string());
            Ok(QueryResult::new(
                vec!["status".into()],
                vec![vec![Some(format!("ran {sql}"))]],
            ))
        }

        async fn close(&mut self) -> Result<(), WarehouseError> {
            Ok(())
        }
    }

    fn copy_result() -> QueryResult {
        QueryResult::new(
            vec![
                "file".into(),
                "status".into(),
                "rows_parsed".into(),
                "rows_loaded".into(),
                "first_error".into(),
            ],
            vec![vec![
                Some("s3://bucket/path/sample.json".into()),
                Some("LOADED".into()),
                Some("2".into()),
                Some("2".into()),
                None,
            ]],
        )
    }

    #[test]
    fn status_and_lookup() {
        let result = copy_result();
        assert_eq!(result.status(), Some("s3://bucket/path/sample.json"));
        assert_eq!(result.value(0, "ROWS_LOADED"), Some("2"));
        assert_eq!(result.value(0, "first_error"), None);
        assert_eq!(QueryResult::default().status(), None);
    }

    #[test]
    fn display_names_every_column() {
        assert_eq!(
            copy_result().to_string(),
            "file=s3://bucket/path/sample.json, status=LOADED, rows_parsed=2, rows_loaded=2, first_error=NULL"
        );
    }

    #[tokio::test]
    async fn cursor_keeps_last_result_until_closed() {
        let mut session = Echo { executed: vec![] };
        let mut cursor = session.cursor();
        cursor.execute("SELECT 1").await.unwrap();
        assert_eq!(
            cursor.fetch_one(),
            Some(&[Some("ran SELECT 1".to_string())][..])
        );
        assert_eq!(cursor.fetch_all().len(), 1);

        cursor.close();
        assert!(cursor.fetch_one().is_none());
        let err = cursor.execute("SELECT 2").await.unwrap_err();
        assert!(matches!(err, WarehouseError::SessionClosed { .. }));
        drop(cursor);
        assert_eq!(session.executed, vec!["SELECT 1"]);
    }
}
