use std::collections::BTreeMap;

use tablewright_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::changes::{AlterClause, ChangeSet, ColumnPosition, alter_statement};
use crate::config_defaults::ConfigDefaults;
use crate::database::{
    Database, Record, Row, SqlValue, insert_statement, placeholders, quote_identifier,
};
use crate::field_type::{FieldOptions, FieldType, IndexKind};
use crate::progress::ProgressReporter;
use crate::queries::{QueryPhase, QueryQueue};
use crate::version::Version;

/// Names of the application tables the engine writes to itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTables {
    pub configs: String,
    pub rules: String,
    pub rule_criteria: String,
    pub rule_actions: String,
    pub display_preferences: String,
}

impl AppTables {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            configs: format!("{prefix}configs"),
            rules: format!("{prefix}rules"),
            rule_criteria: format!("{prefix}rulecriterias"),
            rule_actions: format!("{prefix}ruleactions"),
            display_preferences: format!("{prefix}displaypreferences"),
        }
    }
}

impl Default for AppTables {
    fn default() -> Self {
        Self::with_prefix("glpi_")
    }
}

/// One migration run against a live database.
///
/// Column and index changes are queued per table and applied as a single
/// `ALTER TABLE` each by [`Migration::execute_migration`], between the
/// pre-queries and the post-queries. Table-level operations (drop, rename,
/// copy, insert) run immediately. Every operation checks the live schema
/// first, so replaying a migration that already partly ran is safe.
pub struct Migration<D> {
    pub(crate) db: D,
    pub(crate) changes: ChangeSet,
    pub(crate) queries: QueryQueue,
    pub(crate) configs: ConfigDefaults,
    pub(crate) progress: ProgressReporter,
    pub(crate) tables: AppTables,
}

impl<D: Database> Migration<D> {
    pub fn new(db: D, progress: ProgressReporter) -> Self {
        Self {
            db,
            changes: ChangeSet::default(),
            queries: QueryQueue::default(),
            configs: ConfigDefaults::default(),
            progress,
            tables: AppTables::default(),
        }
    }

    pub fn with_tables(mut self, tables: AppTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn version(&self) -> &Version {
        self.progress.version()
    }

    pub fn set_version(&mut self, version: impl Into<Version>) {
        self.progress.set_version(version);
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn into_database(self) -> D {
        self.db
    }

    pub fn progress(&mut self) -> &mut ProgressReporter {
        &mut self.progress
    }

    pub fn display_message(&mut self, text: &str) {
        self.progress.display_message(text);
    }

    pub fn display_title(&mut self, title: &str) {
        self.progress.display_title(title);
    }

    pub fn display_warning(&mut self, text: &str, emphasized: bool) {
        self.progress.display_warning(text, emphasized);
    }

    /// Clauses queued for `table` and not yet applied.
    pub fn pending_changes(&self, table: &str) -> &[AlterClause] {
        self.changes.pending(table)
    }

    /// Configuration values queued for `context` and not yet stored.
    pub fn pending_config(&self, context: &str) -> Option<&BTreeMap<String, String>> {
        self.configs.pending(context)
    }

    /// Queue a new column. Returns `false` when the column already exists.
    ///
    /// A non-empty `options.update` applies the table's queued changes right
    /// away, then fills the new column for existing rows.
    pub fn add_field(
        &mut self,
        table: &str,
        field: &str,
        field_type: &FieldType,
        options: &FieldOptions,
    ) -> Result<bool> {
        let definition = field_type.definition(options.value.as_deref(), options.no_default)?;
        if definition.is_empty() {
            return Ok(false);
        }
        if self.db.field_exists(table, field, false)? {
            debug!("{table}.{field} already exists");
            return Ok(false);
        }

        let position = if !options.after.is_empty() {
            Some(ColumnPosition::After(options.after.clone()))
        } else if options.first {
            Some(ColumnPosition::First)
        } else {
            None
        };
        self.changes.push(
            table,
            AlterClause::AddColumn {
                field: field.to_string(),
                definition,
                comment: non_empty(&options.comment),
                nullable: options.nullable,
                position,
            },
        );

        if !options.update.is_empty() {
            self.migration_one_table(table)?;
            let sql = format!(
                "UPDATE {} SET {} = {} {}",
                quote_identifier(table),
                quote_identifier(field),
                options.update,
                options.condition
            );
            let context = format!("{} set {field} in {table}", self.version());
            self.execute_or_die(sql.trim_end(), &[], context)?;
        }
        Ok(true)
    }

    /// Queue a rename and/or retype of `old_field`. Returns `false` when
    /// `old_field` does not exist.
    pub fn change_field(
        &mut self,
        table: &str,
        old_field: &str,
        new_field: &str,
        field_type: &FieldType,
        options: &FieldOptions,
    ) -> Result<bool> {
        let definition = field_type.definition(options.value.as_deref(), options.no_default)?;
        if !self.db.field_exists(table, old_field, false)? {
            debug!("{table}.{old_field} does not exist");
            return Ok(false);
        }

        // A replayed rename finds the target already there.
        if old_field != new_field && self.db.field_exists(table, new_field, true)? {
            self.changes
                .push(table, AlterClause::DropColumn(new_field.to_string()));
        }
        if !definition.is_empty() {
            self.changes.push(
                table,
                AlterClause::ChangeColumn {
                    from: old_field.to_string(),
                    to: new_field.to_string(),
                    definition,
                    comment: non_empty(&options.comment),
                },
            );
        }
        Ok(true)
    }

    pub fn drop_field(&mut self, table: &str, field: &str) -> Result<bool> {
        if !self.db.field_exists(table, field, false)? {
            return Ok(false);
        }
        self.changes
            .push(table, AlterClause::DropColumn(field.to_string()));
        Ok(true)
    }

    /// Queue an index over `fields`. An empty `index_name` names the index
    /// after its fields joined with `_`. `length` > 0 indexes a prefix of
    /// every field.
    pub fn add_key<S: AsRef<str>>(
        &mut self,
        table: &str,
        fields: &[S],
        index_name: &str,
        kind: IndexKind,
        length: u32,
    ) -> Result<bool> {
        let columns: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
        if columns.is_empty() {
            return Err(Error::Other(format!("index on {table} needs at least one field")));
        }
        let name = if index_name.is_empty() {
            columns.join("_")
        } else {
            index_name.to_string()
        };

        if self.db.index_exists(table, &name)? {
            debug!("index {name} already exists on {table}");
            return Ok(false);
        }
        self.changes.push(
            table,
            AlterClause::AddIndex {
                kind,
                name,
                columns,
                length,
            },
        );
        Ok(true)
    }

    pub fn drop_key(&mut self, table: &str, index_name: &str) -> Result<bool> {
        if !self.db.index_exists(table, index_name)? {
            return Ok(false);
        }
        self.changes
            .push(table, AlterClause::DropIndex(index_name.to_string()));
        Ok(true)
    }

    /// Drop `table` right away if it exists.
    pub fn drop_table(&mut self, table: &str) -> Result<bool> {
        if !self.db.table_exists(table)? {
            return Ok(false);
        }
        let sql = format!("DROP TABLE {}", quote_identifier(table));
        let context = format!("{} drop {table}", self.version());
        self.execute_or_die(&sql, &[], context)?;
        Ok(true)
    }

    /// Rename right away, only when `old_table` exists and `new_table` does not.
    pub fn rename_table(&mut self, old_table: &str, new_table: &str) -> Result<bool> {
        if self.db.table_exists(new_table)? || !self.db.table_exists(old_table)? {
            return Ok(false);
        }
        let sql = format!(
            "RENAME TABLE {} TO {}",
            quote_identifier(old_table),
            quote_identifier(new_table)
        );
        let context = format!("{} rename {old_table}", self.version());
        self.execute_or_die(&sql, &[], context)?;
        Ok(true)
    }

    /// Create `new_table` with the structure of `old_table` and copy every
    /// row, only when `old_table` exists and `new_table` does not.
    pub fn copy_table(&mut self, old_table: &str, new_table: &str) -> Result<bool> {
        if self.db.table_exists(new_table)? || !self.db.table_exists(old_table)? {
            return Ok(false);
        }

        let create = format!(
            "CREATE TABLE {} LIKE {}",
            quote_identifier(new_table),
            quote_identifier(old_table)
        );
        let context = format!("{} create {new_table}", self.version());
        self.execute_or_die(&create, &[], context)?;

        let copy = format!(
            "INSERT INTO {} SELECT * FROM {}",
            quote_identifier(new_table),
            quote_identifier(old_table)
        );
        let context = format!("{} copy from {old_table} to {new_table}", self.version());
        self.execute_or_die(&copy, &[], context)?;
        Ok(true)
    }

    /// Insert `row` right away, keeping only columns the table has. Returns
    /// the generated id, or `None` when nothing was inserted.
    pub fn insert_in_table(&mut self, table: &str, row: &Record) -> Result<Option<u64>> {
        if row.is_empty() || !self.db.table_exists(table)? {
            return Ok(None);
        }

        let mut columns = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());
        for (field, value) in row {
            if self.db.field_exists(table, field, true)? {
                columns.push(field.as_str());
                values.push(value.clone());
            } else {
                debug!("{table} has no column {field}, value dropped");
            }
        }
        if columns.is_empty() {
            warn!("none of the given columns exist in {table}, nothing inserted");
            return Ok(None);
        }

        let sql = insert_statement(table, &columns);
        let context = format!("{} insert in {table}", self.version());
        self.execute_or_die(&sql, &values, context)?;
        Ok(Some(self.db.last_insert_id()))
    }

    /// Apply every queued clause for `table` as one `ALTER TABLE`.
    pub fn migration_one_table(&mut self, table: &str) -> Result<()> {
        let Some(clauses) = self.changes.take(table) else {
            return Ok(());
        };

        let sql = alter_statement(table, &clauses);
        self.progress
            .display_message(&format!("Change of the database layout - {table}"));
        let context = format!("{} multiple alter in {table}", self.version());
        self.execute_or_die(&sql, &[], context)?;
        info!("altered {table} ({} clauses)", clauses.len());
        Ok(())
    }

    /// Run pre-queries, every queued table change, post-queries, then store
    /// missing configuration values.
    pub fn execute_migration(&mut self) -> Result<()> {
        self.run_queued(QueryPhase::Pre)?;

        for table in self.changes.tables() {
            self.migration_one_table(&table)?;
        }

        self.run_queued(QueryPhase::Post)?;
        self.store_config()?;

        // Tables may have been renamed.
        self.db.clear_schema_cache();

        self.progress.display_message("Task completed.");
        Ok(())
    }

    pub fn add_pre_query(
        &mut self,
        statement: impl Into<String>,
        message: Option<&str>,
    ) -> &mut Self {
        self.queries
            .push(QueryPhase::Pre, statement, message.map(str::to_string));
        self
    }

    pub fn add_post_query(
        &mut self,
        statement: impl Into<String>,
        message: Option<&str>,
    ) -> &mut Self {
        self.queries
            .push(QueryPhase::Post, statement, message.map(str::to_string));
        self
    }

    /// Move each existing table out of the way as `backup_<table>`.
    /// Returns whether any backup was made.
    pub fn backup_tables<S: AsRef<str>>(&mut self, tables: &[S]) -> Result<bool> {
        let mut backed_up = false;
        for table in tables {
            let table = table.as_ref();
            if !self.db.table_exists(table)? {
                continue;
            }
            let backup = format!("backup_{table}");
            self.drop_table(&backup)?;
            self.progress.display_warning(
                &format!("{table} table already exists. A backup has been done to {backup}"),
                false,
            );
            backed_up = true;
            self.rename_table(table, &backup)?;
        }

        if backed_up {
            self.progress.display_warning(
                "You can delete backup tables if you have no need of them.",
                true,
            );
        }
        Ok(backed_up)
    }

    /// Queue configuration values, created at the end of the run only if
    /// the active context does not have them yet.
    pub fn add_config<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.configs.add(values);
        self
    }

    pub fn set_context(&mut self, context: impl Into<String>) -> &mut Self {
        self.configs.set_context(context);
        self
    }

    pub(crate) fn execute_or_die(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        context: String,
    ) -> Result<u64> {
        self.db.execute(sql, params).map_err(|e| fail_with(context, e))
    }

    pub(crate) fn query_or_die(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        context: String,
    ) -> Result<Vec<Row>> {
        self.db.query(sql, params).map_err(|e| fail_with(context, e))
    }

    fn run_queued(&mut self, phase: QueryPhase) -> Result<()> {
        let queued = self.queries.queued(phase).to_vec();
        for query in queued {
            let context = query.message.unwrap_or_else(|| {
                let phase = match phase {
                    QueryPhase::Pre => "pre",
                    QueryPhase::Post => "post",
                };
                format!("{} {phase}-migration query", self.version())
            });
            self.execute_or_die(&query.statement, &[], context)?;
        }
        self.queries.clear(phase);
        Ok(())
    }

    fn store_config(&mut self) -> Result<()> {
        let table = self.tables.configs.clone();
        for (context, mut values) in self.configs.take() {
            if values.is_empty() {
                continue;
            }

            let sql = format!(
                "SELECT {name} FROM {} WHERE {} = ? AND {name} IN ({})",
                quote_identifier(&table),
                quote_identifier("context"),
                placeholders(values.len()),
                name = quote_identifier("name"),
            );
            let mut params = vec![SqlValue::from(context.as_str())];
            params.extend(values.keys().map(|k| SqlValue::from(k.as_str())));
            let existing = self.query_or_die(
                &sql,
                &params,
                format!("{} read configuration of {context}", self.version()),
            )?;
            for row in existing {
                if let Some(name) = row.first().and_then(SqlValue::to_text) {
                    values.remove(&name);
                }
            }
            if values.is_empty() {
                continue;
            }

            let insert = insert_statement(&table, &["context", "name", "value"]);
            for (name, value) in &values {
                let context_msg = format!("{} add configuration {name}", self.version());
                self.execute_or_die(
                    &insert,
                    &[
                        SqlValue::from(context.as_str()),
                        SqlValue::from(name.as_str()),
                        SqlValue::from(value.as_str()),
                    ],
                    context_msg,
                )?;
            }

            let added: Vec<&str> = values.keys().map(String::as_str).collect();
            self.progress.display_message(&format!(
                "Configuration values added for {}.",
                added.join(", ")
            ));
        }
        Ok(())
    }
}

/// Attach the operator-facing context to an engine rejection.
fn fail_with(context: String, error: Error) -> Error {
    match error {
        Error::Database(message) => Error::sql(context, message),
        other => other,
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryDatabase, migration};

    fn tickets() -> MemoryDatabase {
        MemoryDatabase::default().with_table("glpi_tickets", &["id", "name", "status"])
    }

    #[test]
    fn add_field_skips_existing_column() {
        let (mut m, _) = migration(tickets());
        let options = FieldOptions::default();
        assert!(!m.add_field("glpi_tickets", "name", &FieldType::String, &options).unwrap());
        assert!(m.pending_changes("glpi_tickets").is_empty());

        assert!(m.add_field("glpi_tickets", "is_late", &FieldType::Bool, &options).unwrap());
        assert_eq!(m.pending_changes("glpi_tickets").len(), 1);
        assert!(m.database().executed.is_empty());
    }

    #[test]
    fn add_field_placement_and_modifiers_reach_the_alter() {
        let (mut m, _) = migration(tickets());
        let first = FieldOptions {
            first: true,
            nullable: true,
            comment: "external reference".into(),
            ..Default::default()
        };
        m.add_field("glpi_tickets", "ref", &FieldType::String, &first)
            .unwrap();
        let both = FieldOptions {
            first: true,
            after: "name".into(),
            ..Default::default()
        };
        m.add_field("glpi_tickets", "is_late", &FieldType::Bool, &both)
            .unwrap();
        m.execute_migration().unwrap();

        assert_eq!(
            m.database().statements(),
            vec![
                "ALTER TABLE `glpi_tickets` ADD `ref` VARCHAR(255) COLLATE utf8_unicode_ci \
                 DEFAULT NULL COMMENT 'external reference' NULL FIRST ,\n\
                 ADD `is_late` TINYINT(1) NOT NULL DEFAULT '0' AFTER `name`"
            ]
        );
    }

    #[test]
    fn add_field_with_update_flushes_then_backfills() {
        let (mut m, _) = migration(tickets());
        m.drop_field("glpi_tickets", "status").unwrap();
        let options = FieldOptions {
            update: "`id` * 2".into(),
            condition: "WHERE `id` > 10".into(),
            ..Default::default()
        };
        m.add_field("glpi_tickets", "weight", &FieldType::Integer, &options)
            .unwrap();

        let db = m.database();
        assert_eq!(
            db.statements(),
            vec![
                "ALTER TABLE `glpi_tickets` DROP `status` ,\nADD `weight` INT(11) NOT NULL DEFAULT '0'",
                "UPDATE `glpi_tickets` SET `weight` = `id` * 2 WHERE `id` > 10",
            ]
        );
        assert!(m.pending_changes("glpi_tickets").is_empty());
    }

    #[test]
    fn invalid_default_is_fatal_even_for_existing_columns() {
        let (mut m, _) = migration(tickets());
        let err = m
            .add_field(
                "glpi_tickets",
                "name",
                &FieldType::Integer,
                &FieldOptions::with_value("abc"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDefaultValue { .. }));
    }

    #[test]
    fn change_field_onto_existing_name_drops_target_first() {
        let db = MemoryDatabase::default().with_table("t", &["id", "old", "new"]);
        let (mut m, _) = migration(db);
        let options = FieldOptions::default();
        assert!(m.change_field("t", "old", "new", &FieldType::Integer, &options).unwrap());
        m.execute_migration().unwrap();

        let db = m.into_database();
        assert_eq!(
            db.statements(),
            vec!["ALTER TABLE `t` DROP `new` ,\nCHANGE `old` `new` INT(11) NOT NULL DEFAULT '0'"]
        );
        assert_eq!(db.columns("t"), vec!["id".to_string(), "new".to_string()]);
    }

    #[test]
    fn change_field_on_missing_column_is_a_no_op() {
        let (mut m, _) = migration(tickets());
        let options = FieldOptions::default();
        let changed = m
            .change_field("glpi_tickets", "gone", "back", &FieldType::Text, &options)
            .unwrap();
        assert!(!changed);
        assert!(m.pending_changes("glpi_tickets").is_empty());
    }

    #[test]
    fn composite_unique_key_with_prefix_length() {
        let db = MemoryDatabase::default().with_table("t", &["a", "b"]);
        let (mut m, _) = migration(db);
        assert!(m.add_key("t", &["a", "b"], "", IndexKind::Unique, 10).unwrap());

        assert_eq!(
            m.pending_changes("t"),
            &[AlterClause::AddIndex {
                kind: IndexKind::Unique,
                name: "a_b".into(),
                columns: vec!["a".into(), "b".into()],
                length: 10,
            }]
        );
        assert_eq!(
            m.pending_changes("t")[0].to_string(),
            "ADD UNIQUE `a_b` (`a`(10), `b`(10))"
        );
    }

    #[test]
    fn existing_index_is_left_alone_and_drop_key_needs_one() {
        let db = MemoryDatabase::default()
            .with_table("t", &["a"])
            .with_index("t", "a");
        let (mut m, _) = migration(db);
        assert!(!m.add_key("t", &["a"], "", IndexKind::Index, 0).unwrap());
        assert!(!m.drop_key("t", "missing").unwrap());
        assert!(m.drop_key("t", "a").unwrap());
        assert_eq!(m.pending_changes("t"), &[AlterClause::DropIndex("a".into())]);
    }

    #[test]
    fn execute_migration_orders_pre_alter_post() {
        let (mut m, progress) = migration(tickets());
        m.add_pre_query(
            "UPDATE `glpi_tickets` SET `status` = 1 WHERE `status` = 0",
            Some("fix status"),
        )
        .add_post_query("UPDATE `glpi_tickets` SET `is_late` = 1", None);
        m.add_field("glpi_tickets", "is_late", &FieldType::Bool, &FieldOptions::default())
            .unwrap();
        m.execute_migration().unwrap();

        let statements = m.database().statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("UPDATE `glpi_tickets` SET `status`"));
        assert!(statements[1].starts_with("ALTER TABLE `glpi_tickets` ADD `is_late`"));
        assert!(statements[2].starts_with("UPDATE `glpi_tickets` SET `is_late`"));

        let events = progress.events();
        assert!(events.iter().any(|e| e.ends_with("Change of the database layout - glpi_tickets")));
        assert!(events.last().unwrap().ends_with("Task completed."));
    }

    #[test]
    fn tables_flush_in_first_touched_order() {
        let db = MemoryDatabase::default()
            .with_table("b", &["id"])
            .with_table("a", &["id"]);
        let (mut m, _) = migration(db);
        m.add_field("b", "x", &FieldType::Integer, &FieldOptions::default()).unwrap();
        m.add_field("a", "x", &FieldType::Integer, &FieldOptions::default()).unwrap();
        m.add_field("b", "y", &FieldType::Integer, &FieldOptions::default()).unwrap();
        m.execute_migration().unwrap();

        let statements = m.database().statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("ALTER TABLE `b`"));
        assert!(statements[1].starts_with("ALTER TABLE `a`"));
    }

    #[test]
    fn failing_pre_query_stops_the_run_with_its_message() {
        let mut db = tickets();
        db.fail_on = Some("broken".into());
        let (mut m, _) = migration(db);
        m.add_pre_query("UPDATE broken", Some("9.2 fix tickets"));
        m.add_field("glpi_tickets", "is_late", &FieldType::Bool, &FieldOptions::default())
            .unwrap();

        let err = m.execute_migration().unwrap_err();
        match err {
            Error::SqlExecution { context, message } => {
                assert_eq!(context, "9.2 fix tickets");
                assert!(message.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(m.database().statements(), vec!["UPDATE broken"]);
    }

    #[test]
    fn failing_alter_reports_table_context() {
        let mut db = tickets();
        db.fail_on = Some("ALTER TABLE".into());
        let (mut m, _) = migration(db);
        m.drop_field("glpi_tickets", "status").unwrap();

        let err = m.execute_migration().unwrap_err();
        assert!(err.to_string().starts_with("9.2 multiple alter in glpi_tickets: "));
    }

    #[test]
    fn second_run_performs_no_structural_statements() {
        fn run(db: MemoryDatabase) -> MemoryDatabase {
            let (mut m, _) = migration(db);
            m.add_field("glpi_tickets", "is_late", &FieldType::Bool, &FieldOptions::default())
                .unwrap();
            m.add_key("glpi_tickets", &["is_late"], "", IndexKind::Index, 0)
                .unwrap();
            m.drop_field("glpi_tickets", "status").unwrap();
            m.rename_table("glpi_old", "glpi_new").unwrap();
            m.copy_table("glpi_tickets", "glpi_tickets_copy").unwrap();
            m.execute_migration().unwrap();
            m.into_database()
        }

        let db = run(tickets().with_table("glpi_old", &["id"]));
        assert!(db.tables.contains_key("glpi_new"));
        let after_first = db.executed.len();
        let schema_first = db.columns("glpi_tickets");
        assert_eq!(schema_first, vec!["id", "name", "is_late"]);

        let db = run(db);
        assert_eq!(db.executed.len(), after_first);
        assert_eq!(db.columns("glpi_tickets"), schema_first);
    }

    #[test]
    fn rename_and_copy_need_source_and_free_target() {
        let db = MemoryDatabase::default()
            .with_table("a", &["id"])
            .with_table("b", &["id"]);
        let (mut m, _) = migration(db);
        assert!(!m.rename_table("a", "b").unwrap());
        assert!(!m.rename_table("missing", "c").unwrap());
        assert!(!m.copy_table("a", "b").unwrap());

        assert!(m.copy_table("a", "c").unwrap());
        assert_eq!(
            m.database().statements(),
            vec![
                "CREATE TABLE `c` LIKE `a`",
                "INSERT INTO `c` SELECT * FROM `a`"
            ]
        );
    }

    #[test]
    fn insert_keeps_only_existing_columns() {
        let (mut m, _) = migration(tickets());
        let mut row = Record::new();
        row.insert("name".into(), "Printer jam".into());
        row.insert("bogus".into(), SqlValue::Int(1));

        let id = m.insert_in_table("glpi_tickets", &row).unwrap();
        assert_eq!(id, Some(1));
        let (sql, params) = &m.database().executed[0];
        assert_eq!(sql, "INSERT INTO `glpi_tickets` (`name`) VALUES (?)");
        assert_eq!(params, &vec![SqlValue::Text("Printer jam".into())]);

        assert_eq!(m.insert_in_table("missing", &row).unwrap(), None);
        assert_eq!(m.insert_in_table("glpi_tickets", &Record::new()).unwrap(), None);
    }

    #[test]
    fn backup_replaces_stale_backup_and_warns_twice() {
        let db = MemoryDatabase::default()
            .with_table("foo", &["id"])
            .with_table("backup_foo", &["id"]);
        let (mut m, progress) = migration(db);

        assert!(m.backup_tables(&["foo", "absent"]).unwrap());
        assert_eq!(
            m.database().statements(),
            vec!["DROP TABLE `backup_foo`", "RENAME TABLE `foo` TO `backup_foo`"]
        );
        let warnings = progress.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("foo table already exists"));
        assert!(warnings[1].starts_with("warning!:"));

        let (mut m, progress) = migration(MemoryDatabase::default());
        assert!(!m.backup_tables(&["foo"]).unwrap());
        assert!(progress.warnings().is_empty());
    }

    #[test]
    fn config_flush_inserts_only_missing_keys() {
        let mut db = MemoryDatabase::default();
        db.respond("FROM `glpi_configs`", vec![vec![SqlValue::Text("x".into())]]);
        let (mut m, progress) = migration(db);
        m.add_config(BTreeMap::from([("x", "1"), ("y", "2")]));
        assert_eq!(m.pending_config("core").map(BTreeMap::len), Some(2));
        m.execute_migration().unwrap();
        assert!(m.pending_config("core").is_none());

        let db = m.database();
        assert_eq!(
            db.queried[0].1,
            vec![
                SqlValue::Text("core".into()),
                SqlValue::Text("x".into()),
                SqlValue::Text("y".into())
            ]
        );
        assert_eq!(db.executed.len(), 1);
        assert_eq!(
            db.executed[0].0,
            "INSERT INTO `glpi_configs` (`context`, `name`, `value`) VALUES (?, ?, ?)"
        );
        assert_eq!(
            db.executed[0].1,
            vec![
                SqlValue::Text("core".into()),
                SqlValue::Text("y".into()),
                SqlValue::Text("2".into())
            ]
        );
        assert!(
            progress
                .events()
                .iter()
                .any(|e| e.ends_with("Configuration values added for y."))
        );
    }

    #[test]
    fn config_flush_reports_nothing_when_all_present() {
        let mut db = MemoryDatabase::default();
        db.respond("FROM `glpi_configs`", vec![vec![SqlValue::Text("x".into())]]);
        let (mut m, progress) = migration(db);
        m.set_context("plugin:fields").add_config([("x", "1")]);
        m.execute_migration().unwrap();

        assert_eq!(m.database().queried[0].1[0], SqlValue::Text("plugin:fields".into()));
        assert!(m.database().executed.is_empty());
        assert!(!progress.events().iter().any(|e| e.contains("Configuration values")));
    }

    #[test]
    fn custom_prefix_changes_application_tables() {
        let tables = AppTables::with_prefix("app_");
        assert_eq!(tables.configs, "app_configs");
        assert_eq!(tables.rule_criteria, "app_rulecriterias");
        assert_eq!(AppTables::default().display_preferences, "glpi_displaypreferences");
    }
}
