use std::fmt;

use crate::database::{quote_identifier, quote_literal};
use crate::field_type::IndexKind;

/// Where `ADD` places a new column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    First,
    After(String),
}

/// One clause of a batched `ALTER TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterClause {
    AddColumn {
        field: String,
        definition: String,
        comment: Option<String>,
        nullable: bool,
        position: Option<ColumnPosition>,
    },
    ChangeColumn {
        from: String,
        to: String,
        definition: String,
        comment: Option<String>,
    },
    DropColumn(String),
    AddIndex {
        kind: IndexKind,
        name: String,
        columns: Vec<String>,
        /// Prefix length applied to every column, 0 for none.
        length: u32,
    },
    DropIndex(String),
}

impl fmt::Display for AlterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddColumn {
                field,
                definition,
                comment,
                nullable,
                position,
            } => {
                write!(f, "ADD {} {definition}", quote_identifier(field))?;
                if let Some(comment) = comment {
                    write!(f, " COMMENT {}", quote_literal(comment))?;
                }
                if *nullable {
                    f.write_str(" NULL")?;
                }
                match position {
                    Some(ColumnPosition::After(col)) => {
                        write!(f, " AFTER {}", quote_identifier(col))
                    }
                    Some(ColumnPosition::First) => f.write_str(" FIRST"),
                    None => Ok(()),
                }
            }
            Self::ChangeColumn {
                from,
                to,
                definition,
                comment,
            } => {
                write!(
                    f,
                    "CHANGE {} {} {definition}",
                    quote_identifier(from),
                    quote_identifier(to)
                )?;
                if let Some(comment) = comment {
                    write!(f, " COMMENT {}", quote_literal(comment))?;
                }
                Ok(())
            }
            Self::DropColumn(field) => write!(f, "DROP {}", quote_identifier(field)),
            Self::AddIndex {
                kind,
                name,
                columns,
                length,
            } => {
                let columns: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        if *length > 0 {
                            format!("{}({length})", quote_identifier(c))
                        } else {
                            quote_identifier(c)
                        }
                    })
                    .collect();
                write!(
                    f,
                    "ADD {kind} {} ({})",
                    quote_identifier(name),
                    columns.join(", ")
                )
            }
            Self::DropIndex(name) => write!(f, "DROP INDEX {}", quote_identifier(name)),
        }
    }
}

/// Structural changes waiting to be applied, grouped per table.
///
/// Tables keep the order in which they were first touched. A table only has
/// an entry while it holds unflushed clauses.
#[derive(Debug, Default)]
pub struct ChangeSet {
    tables: Vec<(String, Vec<AlterClause>)>,
}

impl ChangeSet {
    pub fn push(&mut self, table: &str, clause: AlterClause) {
        match self.tables.iter_mut().find(|(name, _)| name == table) {
            Some((_, clauses)) => clauses.push(clause),
            None => self.tables.push((table.to_string(), vec![clause])),
        }
    }

    /// Remove and return the pending clauses of `table`.
    pub fn take(&mut self, table: &str) -> Option<Vec<AlterClause>> {
        let pos = self.tables.iter().position(|(name, _)| name == table)?;
        Some(self.tables.remove(pos).1)
    }

    pub fn pending(&self, table: &str) -> &[AlterClause] {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, clauses)| clauses.as_slice())
            .unwrap_or(&[])
    }

    /// Tables with pending clauses, in first-touched order.
    pub fn tables(&self) -> Vec<String> {
        self.tables.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Join every clause for `table` into a single statement.
pub fn alter_statement(table: &str, clauses: &[AlterClause]) -> String {
    let body: Vec<String> = clauses.iter().map(ToString::to_string).collect();
    format!("ALTER TABLE {} {}", quote_identifier(table), body.join(" ,\n"))
}
