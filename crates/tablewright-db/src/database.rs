use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tablewright_common::Result;

/// A value bound to a statement parameter or read back from a result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
}

impl SqlValue {
    /// Integer view of the value. MySQL's text protocol returns numbers as
    /// strings, so textual digits are accepted too.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Null => None,
            Self::Int(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Int(v) => Some(v.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(&quote_literal(s)),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

// Plan files are written by hand: booleans become the 0/1 MySQL stores for
// them, and decimals travel as text so the server does the conversion.
impl<'de> Deserialize<'de> for SqlValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Null,
            Bool(bool),
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Null => Self::Null,
            Raw::Bool(b) => Self::Int(i64::from(b)),
            Raw::Int(v) => Self::Int(v),
            Raw::Float(v) => Self::Text(v.to_string()),
            Raw::Text(s) => Self::Text(s),
        })
    }
}

/// One result row, columns in SELECT order.
pub type Row = Vec<SqlValue>;

/// Column name to value, as inserted by `insert_in_table` and rule registration.
pub type Record = BTreeMap<String, SqlValue>;

/// The live database a migration runs against.
///
/// Every call is a blocking round-trip. Values always travel as bound
/// parameters; only identifiers are spliced into statement text, through
/// [`quote_identifier`].
pub trait Database {
    fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Whether `table` has a column named `field`. With `use_cache` the
    /// handle may answer from columns it read earlier in the run.
    fn field_exists(&mut self, table: &str, field: &str, use_cache: bool) -> Result<bool>;

    fn index_exists(&mut self, table: &str, index: &str) -> Result<bool>;

    /// Run a statement and return the number of affected rows. Engine
    /// rejections come back as `Error::Database` carrying the engine text.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Identifier generated by the last INSERT.
    fn last_insert_id(&mut self) -> u64;

    /// Forget any cached table or column layout.
    fn clear_schema_cache(&mut self);
}

/// Quote a table, column or index name.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal for statements that cannot take bound
/// parameters (DEFAULT and COMMENT clauses of DDL).
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// `INSERT INTO t (a, b) VALUES (?, ?)` for the given columns.
pub(crate) fn insert_statement<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_identifier(c.as_ref())).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_identifier(table),
        names.join(", ")
    )
}

/// `?, ?, ?` for an IN list of `count` values.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// First column of the first row as an integer, e.g. a `COUNT(*)` or `MAX()`.
pub(crate) fn scalar_i64(rows: &[Row]) -> Option<i64> {
    rows.first()?.first()?.as_i64()
}
