use tablewright_common::Result;
use tracing::info;

use crate::database::{Database, Row, SqlValue};

/// Wraps a handle so that nothing is written.
///
/// Schema lookups and queries reach the wrapped database; statements are
/// recorded instead of executed. Lookups therefore do not see changes made
/// earlier in the same run.
#[derive(Debug)]
pub struct DryRun<D> {
    inner: D,
    statements: Vec<(String, Vec<SqlValue>)>,
}

impl<D: Database> DryRun<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            statements: Vec::new(),
        }
    }

    /// Statements that would have run, in order, with their parameters.
    pub fn statements(&self) -> &[(String, Vec<SqlValue>)] {
        &self.statements
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: Database> Database for DryRun<D> {
    fn table_exists(&mut self, table: &str) -> Result<bool> {
        self.inner.table_exists(table)
    }

    fn field_exists(&mut self, table: &str, field: &str, use_cache: bool) -> Result<bool> {
        self.inner.field_exists(table, field, use_cache)
    }

    fn index_exists(&mut self, table: &str, index: &str) -> Result<bool> {
        self.inner.index_exists(table, index)
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        info!(params = params.len(), "dry run: {sql}");
        self.statements.push((sql.to_string(), params.to_vec()));
        Ok(0)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.inner.query(sql, params)
    }

    fn last_insert_id(&mut self) -> u64 {
        0
    }

    fn clear_schema_cache(&mut self) {
        self.inner.clear_schema_cache();
    }
}
