use std::collections::{HashMap, HashSet};

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, Params, Value};
use tablewright_common::{Error, Result};
use tracing::{debug, info};

use crate::database::{Database, Row, SqlValue};

/// [`Database`] over a blocking MySQL connection.
///
/// Column lists are cached per table for `field_exists(.., use_cache = true)`
/// and dropped whenever a DDL statement goes through `execute`.
pub struct MysqlDatabase {
    conn: Conn,
    columns: ColumnCache,
}

/// Column names per table, read on first use.
#[derive(Debug, Default)]
struct ColumnCache {
    tables: HashMap<String, HashSet<String>>,
}

impl ColumnCache {
    /// Answer from the cache when allowed and filled, otherwise reload the
    /// table's columns through `load` first.
    fn lookup(
        &mut self,
        table: &str,
        field: &str,
        use_cache: bool,
        load: impl FnOnce(&str) -> Result<HashSet<String>>,
    ) -> Result<bool> {
        if !use_cache || !self.tables.contains_key(table) {
            let columns = load(table)?;
            self.tables.insert(table.to_string(), columns);
        }
        Ok(self
            .tables
            .get(table)
            .is_some_and(|columns| columns.contains(field)))
    }

    fn clear(&mut self) {
        self.tables.clear();
    }
}

impl MysqlDatabase {
    pub fn connect(url: &str) -> Result<Self> {
        let opts = Opts::from_url(url)
            .map_err(|e| Error::Config(format!("invalid database url: {e}")))?;
        let host = opts.get_ip_or_hostname().to_string();
        let conn = Conn::new(opts)
            .map_err(|e| Error::Database(format!("failed to connect to {host}: {e}")))?;
        info!("connected to mysql at {host}");

        Ok(Self {
            conn,
            columns: ColumnCache::default(),
        })
    }

    fn count(&mut self, sql: &str, params: Params) -> Result<i64> {
        let count: Option<i64> = self
            .conn
            .exec_first(sql, params)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count.unwrap_or(0))
    }
}

impl Database for MysqlDatabase {
    fn table_exists(&mut self, table: &str) -> Result<bool> {
        let count = self.count(
            "SELECT COUNT(*) FROM information_schema.tables
             WHERE table_schema = DATABASE() AND table_name = ?",
            Params::Positional(vec![table.into()]),
        )?;
        Ok(count > 0)
    }

    fn field_exists(&mut self, table: &str, field: &str, use_cache: bool) -> Result<bool> {
        let conn = &mut self.conn;
        self.columns.lookup(table, field, use_cache, |t| load_columns(conn, t))
    }

    fn index_exists(&mut self, table: &str, index: &str) -> Result<bool> {
        let count = self.count(
            "SELECT COUNT(*) FROM information_schema.statistics
             WHERE table_schema = DATABASE() AND table_name = ? AND index_name = ?",
            Params::Positional(vec![table.into(), index.into()]),
        )?;
        Ok(count > 0)
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        debug!("executing: {sql}");
        let outcome = if params.is_empty() {
            self.conn.query_drop(sql)
        } else {
            self.conn.exec_drop(sql, to_params(params))
        };
        outcome.map_err(|e| Error::Database(e.to_string()))?;

        if is_ddl(sql) {
            self.columns.clear();
        }
        Ok(self.conn.affected_rows())
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let rows: Vec<mysql::Row> = if params.is_empty() {
            self.conn.query::<mysql::Row, _>(sql)
        } else {
            self.conn.exec::<mysql::Row, _, _>(sql, to_params(params))
        }
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| row.unwrap().into_iter().map(from_value).collect())
            .collect())
    }

    fn last_insert_id(&mut self) -> u64 {
        self.conn.last_insert_id()
    }

    fn clear_schema_cache(&mut self) {
        self.columns.clear();
    }
}

fn load_columns(conn: &mut Conn, table: &str) -> Result<HashSet<String>> {
    let names: Vec<String> = conn
        .exec(
            "SELECT column_name FROM information_schema.columns
             WHERE table_schema = DATABASE() AND table_name = ?",
            (table,),
        )
        .map_err(|e| Error::Database(format!("failed to list columns of {table}: {e}")))?;
    Ok(names.into_iter().collect())
}

fn is_ddl(sql: &str) -> bool {
    let head: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    matches!(head.as_str(), "ALTER" | "CREATE" | "DROP" | "RENAME")
}

fn to_params(params: &[SqlValue]) -> Params {
    Params::Positional(
        params
            .iter()
            .map(|p| match p {
                SqlValue::Null => Value::NULL,
                SqlValue::Int(v) => Value::Int(*v),
                SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
            })
            .collect(),
    )
}

fn from_value(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(v) => SqlValue::Int(v),
        Value::UInt(v) => i64::try_from(v)
            .map(SqlValue::Int)
            .unwrap_or_else(|_| SqlValue::Text(v.to_string())),
        Value::Bytes(bytes) => SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Float(v) => SqlValue::Text(v.to_string()),
        Value::Double(v) => SqlValue::Text(v.to_string()),
        Value::Date(y, m, d, h, i, s, _) => SqlValue::Text(format!(
            "{y:04}-{m:02}-{d:02} {h:02}:{i:02}:{s:02}"
        )),
        Value::Time(neg, days, h, i, s, _) => {
            let hours = days * 24 + u32::from(h);
            let sign = if neg { "-" } else { "" };
            SqlValue::Text(format!("{sign}{hours:02}:{i:02}:{s:02}"))
        }
    }
}
