//! In-memory stand-ins for the database and the progress/log sinks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use tablewright_common::{Error, Result};

use crate::database::{Database, Row, SqlValue};
use crate::migration::Migration;
use crate::progress::{LogSink, ProgressEvent, ProgressReporter, ProgressSink};

#[derive(Debug, Clone, Default)]
pub struct MemTable {
    pub columns: Vec<String>,
    pub indexes: BTreeSet<String>,
}

/// Schema model that understands the DDL the engine generates and records
/// every statement it is handed.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    pub tables: BTreeMap<String, MemTable>,
    pub executed: Vec<(String, Vec<SqlValue>)>,
    pub queried: Vec<(String, Vec<SqlValue>)>,
    /// Statements containing this text are rejected.
    pub fail_on: Option<String>,
    responses: Vec<(String, Vec<Row>)>,
    next_id: u64,
}

impl MemoryDatabase {
    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.tables.insert(
            table.to_string(),
            MemTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                indexes: BTreeSet::new(),
            },
        );
        self
    }

    pub fn with_index(mut self, table: &str, index: &str) -> Self {
        self.tables
            .entry(table.to_string())
            .or_default()
            .indexes
            .insert(index.to_string());
        self
    }

    /// Answer the next query containing `needle` with `rows`.
    pub fn respond(&mut self, needle: &str, rows: Vec<Row>) {
        self.responses.push((needle.to_string(), rows));
    }

    pub fn statements(&self) -> Vec<&str> {
        self.executed.iter().map(|(sql, _)| sql.as_str()).collect()
    }

    pub fn columns(&self, table: &str) -> Vec<String> {
        self.tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default()
    }

    fn apply_ddl(&mut self, sql: &str) {
        let names = identifiers(sql);
        if sql.starts_with("ALTER TABLE") {
            let Some(table) = names.first() else { return };
            let body = sql.splitn(2, "` ").nth(1).unwrap_or("");
            let entry = self.tables.entry(table.clone()).or_default();
            for clause in body.split(" ,\n") {
                let ids = identifiers(clause);
                if clause.starts_with("ADD INDEX")
                    || clause.starts_with("ADD UNIQUE")
                    || clause.starts_with("ADD FULLTEXT")
                {
                    entry.indexes.insert(ids[0].clone());
                } else if clause.starts_with("DROP INDEX") {
                    entry.indexes.remove(&ids[0]);
                } else if clause.starts_with("ADD") {
                    entry.columns.push(ids[0].clone());
                } else if clause.starts_with("DROP") {
                    entry.columns.retain(|c| c != &ids[0]);
                } else if clause.starts_with("CHANGE") {
                    for c in entry.columns.iter_mut() {
                        if c == &ids[0] {
                            *c = ids[1].clone();
                        }
                    }
                }
            }
        } else if sql.starts_with("RENAME TABLE") {
            if let Some(table) = self.tables.remove(&names[0]) {
                self.tables.insert(names[1].clone(), table);
            }
        } else if sql.starts_with("DROP TABLE") {
            self.tables.remove(&names[0]);
        } else if sql.starts_with("CREATE TABLE") {
            let copy = self.tables.get(&names[1]).cloned().unwrap_or_default();
            self.tables.insert(names[0].clone(), copy);
        } else if sql.starts_with("INSERT") {
            self.next_id += 1;
        }
    }
}

/// Backtick-quoted names in order of appearance.
fn identifiers(sql: &str) -> Vec<String> {
    sql.split('`')
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .map(|(_, s)| s.to_string())
        .collect()
}

impl Database for MemoryDatabase {
    fn table_exists(&mut self, table: &str) -> Result<bool> {
        Ok(self.tables.contains_key(table))
    }

    fn field_exists(&mut self, table: &str, field: &str, _use_cache: bool) -> Result<bool> {
        Ok(self
            .tables
            .get(table)
            .is_some_and(|t| t.columns.iter().any(|c| c == field)))
    }

    fn index_exists(&mut self, table: &str, index: &str) -> Result<bool> {
        Ok(self
            .tables
            .get(table)
            .is_some_and(|t| t.indexes.contains(index)))
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.executed.push((sql.to_string(), params.to_vec()));
        if let Some(needle) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(Error::Database(format!("rejected: {needle}")));
            }
        }
        self.apply_ddl(sql);
        Ok(1)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.queried.push((sql.to_string(), params.to_vec()));
        match self.responses.iter().position(|(needle, _)| sql.contains(needle.as_str())) {
            Some(pos) => Ok(self.responses.remove(pos).1),
            None => Ok(Vec::new()),
        }
    }

    fn last_insert_id(&mut self) -> u64 {
        self.next_id
    }

    fn clear_schema_cache(&mut self) {}
}

/// Progress sink keeping a one-line description of every event.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with("warning"))
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&mut self, event: ProgressEvent<'_>) {
        let line = match event {
            ProgressEvent::AreaOpened { area } => format!("area: {area}"),
            ProgressEvent::Message { area, text, .. } => format!("message[{area}]: {text}"),
            ProgressEvent::Title(title) => format!("title: {title}"),
            ProgressEvent::Warning {
                text,
                emphasized: false,
            } => format!("warning: {text}"),
            ProgressEvent::Warning {
                text,
                emphasized: true,
            } => format!("warning!: {text}"),
        };
        self.events.lock().unwrap().push(line);
    }
}

/// Log sink recording every write attempt and answering with a fixed outcome.
#[derive(Debug, Clone)]
pub struct RecordingLog {
    attempts: Arc<Mutex<Vec<(String, String)>>>,
    succeed: bool,
}

impl RecordingLog {
    pub fn new(succeed: bool) -> Self {
        Self {
            attempts: Arc::default(),
            succeed,
        }
    }

    pub fn attempts(&self) -> Vec<(String, String)> {
        self.attempts.lock().unwrap().clone()
    }
}

impl LogSink for RecordingLog {
    fn write(&mut self, name: &str, message: &str) -> bool {
        self.attempts
            .lock()
            .unwrap()
            .push((name.to_string(), message.to_string()));
        self.succeed
    }
}

/// A `9.2` migration over `db` with recording sinks.
pub fn migration(db: MemoryDatabase) -> (Migration<MemoryDatabase>, RecordingProgress) {
    let progress = RecordingProgress::default();
    let reporter = ProgressReporter::new(
        "9.2",
        Box::new(progress.clone()),
        Box::new(RecordingLog::new(true)),
    );
    (Migration::new(db, reporter), progress)
}
