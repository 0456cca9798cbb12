use std::collections::BTreeMap;

use tablewright_common::Result;
use tracing::debug;

use crate::database::{
    Database, SqlValue, insert_statement, placeholders, quote_identifier, scalar_i64,
};
use crate::migration::Migration;

/// Owner of the preferences used when nobody has any for an item type yet.
const DEFAULT_USER: i64 = 0;

impl<D: Database> Migration<D> {
    /// Add and remove list columns in users' display preferences.
    ///
    /// Both maps go from item type to column numbers. Added columns are
    /// appended after each user's last one; if no user has preferences for
    /// the item type, the default user gets them ranked from 1.
    pub fn update_display_prefs(
        &mut self,
        to_add: &BTreeMap<String, Vec<i64>>,
        to_del: &BTreeMap<String, Vec<i64>>,
    ) -> Result<()> {
        let table = self.tables.display_preferences.clone();
        self.progress
            .display_message(&format!("Data migration - {table}"));

        let t = quote_identifier(&table);
        let itemtype = quote_identifier("itemtype");
        let users_id = quote_identifier("users_id");
        let num = quote_identifier("num");
        let insert = insert_statement(&table, &["itemtype", "num", "rank", "users_id"]);

        for (item, columns) in to_add {
            let item_value = SqlValue::from(item.as_str());
            let sql = format!("SELECT DISTINCT {users_id} FROM {t} WHERE {itemtype} = ?");
            let context = format!("{} read display preferences of {item}", self.version());
            let users: Vec<i64> = self
                .query_or_die(&sql, &[item_value.clone()], context)?
                .iter()
                .filter_map(|row| row.first().and_then(SqlValue::as_i64))
                .collect();

            if users.is_empty() {
                for (rank, column) in (1..).zip(columns) {
                    let context = format!(
                        "{} add display preference {column} for {item}",
                        self.version()
                    );
                    self.execute_or_die(
                        &insert,
                        &[
                            item_value.clone(),
                            SqlValue::Int(*column),
                            SqlValue::Int(rank),
                            SqlValue::Int(DEFAULT_USER),
                        ],
                        context,
                    )?;
                }
                continue;
            }

            for user in users {
                let sql = format!(
                    "SELECT MAX({}) FROM {t} WHERE {users_id} = ? AND {itemtype} = ?",
                    quote_identifier("rank")
                );
                let context = format!("{} rank display preferences of {item}", self.version());
                let rows = self.query_or_die(
                    &sql,
                    &[SqlValue::Int(user), item_value.clone()],
                    context,
                )?;
                let mut rank = scalar_i64(&rows).unwrap_or(0) + 1;

                for column in columns {
                    let sql = format!(
                        "SELECT COUNT(*) FROM {t} \
                         WHERE {users_id} = ? AND {num} = ? AND {itemtype} = ?"
                    );
                    let context = format!("{} read display preferences of {item}", self.version());
                    let rows = self.query_or_die(
                        &sql,
                        &[SqlValue::Int(user), SqlValue::Int(*column), item_value.clone()],
                        context,
                    )?;
                    if scalar_i64(&rows).unwrap_or(0) > 0 {
                        debug!("user {user} already shows column {column} of {item}");
                        continue;
                    }

                    let context = format!(
                        "{} add display preference {column} for {item}",
                        self.version()
                    );
                    self.execute_or_die(
                        &insert,
                        &[
                            item_value.clone(),
                            SqlValue::Int(*column),
                            SqlValue::Int(rank),
                            SqlValue::Int(user),
                        ],
                        context,
                    )?;
                    rank += 1;
                }
            }
        }

        for (item, columns) in to_del {
            if columns.is_empty() {
                continue;
            }
            let sql = format!(
                "DELETE FROM {t} WHERE {itemtype} = ? AND {num} IN ({})",
                placeholders(columns.len())
            );
            let mut params = vec![SqlValue::from(item.as_str())];
            params.extend(columns.iter().map(|c| SqlValue::Int(*c)));
            let context = format!("{} delete display preferences of {item}", self.version());
            self.execute_or_die(&sql, &params, context)?;
        }
        Ok(())
    }
}
