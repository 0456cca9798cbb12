use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tablewright_common::{Error, Result};
use tracing::{debug, info};

use crate::database::{Database, Record, SqlValue};
use crate::field_type::{FieldOptions, FieldType, IndexKind};
use crate::migration::Migration;
use crate::version::Version;

/// One migration step, as written in a plan file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    AddField {
        table: String,
        field: String,
        #[serde(rename = "type")]
        field_type: FieldType,
        #[serde(default)]
        options: FieldOptions,
    },
    ChangeField {
        table: String,
        from: String,
        to: String,
        #[serde(rename = "type")]
        field_type: FieldType,
        #[serde(default)]
        options: FieldOptions,
    },
    DropField {
        table: String,
        field: String,
    },
    AddKey {
        table: String,
        fields: Vec<String>,
        #[serde(default)]
        name: String,
        #[serde(default, rename = "type")]
        kind: IndexKind,
        #[serde(default)]
        length: u32,
    },
    DropKey {
        table: String,
        name: String,
    },
    /// Apply the queued changes of one table now.
    MigrateTable {
        table: String,
    },
    DropTable {
        table: String,
    },
    RenameTable {
        from: String,
        to: String,
    },
    CopyTable {
        from: String,
        to: String,
    },
    InsertInTable {
        table: String,
        row: Record,
    },
    BackupTables {
        tables: Vec<String>,
    },
    PreQuery {
        sql: String,
        #[serde(default)]
        message: Option<String>,
    },
    PostQuery {
        sql: String,
        #[serde(default)]
        message: Option<String>,
    },
    AddConfig {
        values: BTreeMap<String, SqlValue>,
    },
    SetContext {
        context: String,
    },
    SetVersion {
        version: Version,
    },
    CreateRule {
        rule: Record,
        #[serde(default)]
        criteria: Vec<Record>,
        #[serde(default)]
        actions: Vec<Record>,
    },
    UpdateDisplayPrefs {
        #[serde(default)]
        add: BTreeMap<String, Vec<i64>>,
        #[serde(default)]
        delete: BTreeMap<String, Vec<i64>>,
    },
}

impl Operation {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddField { .. } => "add_field",
            Self::ChangeField { .. } => "change_field",
            Self::DropField { .. } => "drop_field",
            Self::AddKey { .. } => "add_key",
            Self::DropKey { .. } => "drop_key",
            Self::MigrateTable { .. } => "migrate_table",
            Self::DropTable { .. } => "drop_table",
            Self::RenameTable { .. } => "rename_table",
            Self::CopyTable { .. } => "copy_table",
            Self::InsertInTable { .. } => "insert_in_table",
            Self::BackupTables { .. } => "backup_tables",
            Self::PreQuery { .. } => "pre_query",
            Self::PostQuery { .. } => "post_query",
            Self::AddConfig { .. } => "add_config",
            Self::SetContext { .. } => "set_context",
            Self::SetVersion { .. } => "set_version",
            Self::CreateRule { .. } => "create_rule",
            Self::UpdateDisplayPrefs { .. } => "update_display_prefs",
        }
    }
}

/// A versioned list of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub version: Version,
    #[serde(default)]
    pub steps: Vec<Operation>,
}

impl Plan {
    /// Read a plan from a `.yml`, `.yaml`, `.toml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self> {
        let plan: Self = tablewright_config::read_document(path)
            .map_err(|e| Error::Plan(format!("{}: {e}", path.display())))?;
        info!(
            "loaded plan {} ({} steps) from {}",
            plan.version,
            plan.steps.len(),
            path.display()
        );
        Ok(plan)
    }

    /// Catch mistakes that would otherwise only surface halfway through a
    /// run: bad type/default combinations and empty indexes.
    pub fn validate(&self) -> Result<()> {
        for (i, step) in self.steps.iter().enumerate() {
            let at = |e: Error| Error::Plan(format!("step {} ({}): {e}", i + 1, step.name()));
            match step {
                Operation::AddField {
                    field_type,
                    options,
                    ..
                }
                | Operation::ChangeField {
                    field_type,
                    options,
                    ..
                } => {
                    field_type
                        .definition(options.value.as_deref(), options.no_default)
                        .map_err(at)?;
                }
                Operation::AddKey { table, fields, .. } if fields.is_empty() => {
                    return Err(at(Error::Other(format!(
                        "index on {table} needs at least one field"
                    ))));
                }
                Operation::BackupTables { tables } if tables.is_empty() => {
                    return Err(at(Error::Other("no table to back up".into())));
                }
                Operation::AddConfig { values } => {
                    config_values(values).map_err(at)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Configuration values as stored, refusing nulls: a setting has no NULL state.
fn config_values(values: &BTreeMap<String, SqlValue>) -> Result<Vec<(&str, String)>> {
    values
        .iter()
        .map(|(name, value)| match value.to_text() {
            Some(text) => Ok((name.as_str(), text)),
            None => Err(Error::Other(format!("configuration value {name} is null"))),
        })
        .collect()
}

impl<D: Database> Migration<D> {
    /// Run one plan step.
    pub fn apply(&mut self, step: &Operation) -> Result<()> {
        let changed = match step {
            Operation::AddField {
                table,
                field,
                field_type,
                options,
            } => self.add_field(table, field, field_type, options)?,
            Operation::ChangeField {
                table,
                from,
                to,
                field_type,
                options,
            } => self.change_field(table, from, to, field_type, options)?,
            Operation::DropField { table, field } => self.drop_field(table, field)?,
            Operation::AddKey {
                table,
                fields,
                name,
                kind,
                length,
            } => self.add_key(table, fields, name, *kind, *length)?,
            Operation::DropKey { table, name } => self.drop_key(table, name)?,
            Operation::MigrateTable { table } => {
                self.migration_one_table(table)?;
                true
            }
            Operation::DropTable { table } => self.drop_table(table)?,
            Operation::RenameTable { from, to } => self.rename_table(from, to)?,
            Operation::CopyTable { from, to } => self.copy_table(from, to)?,
            Operation::InsertInTable { table, row } => self.insert_in_table(table, row)?.is_some(),
            Operation::BackupTables { tables } => self.backup_tables(tables)?,
            Operation::PreQuery { sql, message } => {
                self.add_pre_query(sql.as_str(), message.as_deref());
                true
            }
            Operation::PostQuery { sql, message } => {
                self.add_post_query(sql.as_str(), message.as_deref());
                true
            }
            Operation::AddConfig { values } => {
                self.add_config(config_values(values)?);
                true
            }
            Operation::SetContext { context } => {
                self.set_context(context.as_str());
                true
            }
            Operation::SetVersion { version } => {
                self.set_version(version.clone());
                true
            }
            Operation::CreateRule {
                rule,
                criteria,
                actions,
            } => self.create_rule(rule, criteria, actions)?.is_some(),
            Operation::UpdateDisplayPrefs { add, delete } => {
                self.update_display_prefs(add, delete)?;
                true
            }
        };

        if !changed {
            debug!("{} left the schema as it was", step.name());
        }
        Ok(())
    }

    /// Run every step of `plan` under its version, then apply what was queued.
    pub fn run_plan(&mut self, plan: &Plan) -> Result<()> {
        self.set_version(plan.version.clone());
        self.display_title(&format!("Migration to {}", plan.version));
        for step in &plan.steps {
            self.apply(step)?;
        }
        self.execute_migration()
    }
}
