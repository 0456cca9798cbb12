pub mod changes;
pub mod config_defaults;
pub mod database;
pub mod display_prefs;
pub mod dry_run;
pub mod field_type;
pub mod migration;
pub mod mysql_database;
pub mod plan;
pub mod progress;
pub mod queries;
pub mod rules;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

pub use changes::{AlterClause, ChangeSet, ColumnPosition};
pub use database::{Database, Record, Row, SqlValue, quote_identifier, quote_literal};
pub use dry_run::DryRun;
pub use field_type::{FieldOptions, FieldType, IndexKind};
pub use migration::{AppTables, Migration};
pub use mysql_database::MysqlDatabase;
pub use plan::{Operation, Plan};
pub use progress::{
    ConsoleProgress, FileLogSink, LogSink, ProgressEvent, ProgressReporter, ProgressSink,
    TracingLogSink, format_elapsed,
};
pub use queries::{QueryPhase, QueryQueue, QueuedQuery};
pub use version::Version;
