use tablewright_common::Result;
use tracing::{debug, info};

use crate::database::{Database, Record, SqlValue, insert_statement, quote_identifier, scalar_i64};
use crate::migration::Migration;

impl<D: Database> Migration<D> {
    /// Register a rule with its criteria and actions.
    ///
    /// A rule whose name is already taken is left alone and `None` is
    /// returned. Otherwise the rule is ranked last among rules of the same
    /// `sub_type` and its new id is returned.
    pub fn create_rule(
        &mut self,
        rule: &Record,
        criteria: &[Record],
        actions: &[Record],
    ) -> Result<Option<u64>> {
        let rules = self.tables.rules.clone();
        let name = rule.get("name").cloned().unwrap_or(SqlValue::Null);
        let label = name.to_text().unwrap_or_default();

        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            quote_identifier(&rules),
            quote_identifier("name")
        );
        let context = format!("{} look up rule {label}", self.version());
        let existing = self.query_or_die(&sql, &[name], context)?;
        if scalar_i64(&existing).unwrap_or(0) > 0 {
            debug!("rule {label:?} already registered");
            return Ok(None);
        }

        let sub_type = rule.get("sub_type").cloned().unwrap_or(SqlValue::Null);
        let sql = format!(
            "SELECT MAX({}) FROM {} WHERE {} = ?",
            quote_identifier("ranking"),
            quote_identifier(&rules),
            quote_identifier("sub_type")
        );
        let context = format!("{} rank rule {label}", self.version());
        let rows = self.query_or_die(&sql, &[sub_type], context)?;
        let ranking = scalar_i64(&rows).map_or(1, |max| max + 1);

        let mut row = rule.clone();
        row.remove("ranking");
        row.insert(
            "comment".into(),
            format!("Automatically generated by migration {}", self.version()).into(),
        );
        row.insert("description".into(), "".into());

        let context = format!("{} create rule {label}", self.version());
        self.insert_row(&rules, ("ranking", SqlValue::Int(ranking)), &row, context)?;
        let rule_id = self.db.last_insert_id();
        let id_value = SqlValue::Int(rule_id as i64);

        let criteria_table = self.tables.rule_criteria.clone();
        for criterion in criteria {
            let context = format!("{} add criterion to rule {label}", self.version());
            self.insert_row(&criteria_table, ("rules_id", id_value.clone()), criterion, context)?;
        }

        let actions_table = self.tables.rule_actions.clone();
        for action in actions {
            let context = format!("{} add action to rule {label}", self.version());
            self.insert_row(&actions_table, ("rules_id", id_value.clone()), action, context)?;
        }

        info!("registered rule {label:?} with id {rule_id} at rank {ranking}");
        Ok(Some(rule_id))
    }

    /// Insert `lead` followed by every column of `row`.
    fn insert_row(
        &mut self,
        table: &str,
        lead: (&str, SqlValue),
        row: &Record,
        context: String,
    ) -> Result<u64> {
        let (lead_column, lead_value) = lead;
        let mut columns = vec![lead_column];
        let mut values = vec![lead_value];
        for (column, value) in row {
            if column != lead_column {
                columns.push(column.as_str());
                values.push(value.clone());
            }
        }
        let sql = insert_statement(table, &columns);
        self.execute_or_die(&sql, &values, context)
    }
}
