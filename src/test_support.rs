use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::conn::{CancelToken, Connection};
use crate::value::{Row, Value};

#[derive(Debug, Clone)]
pub(crate) struct UndoRow {
    pub branch_id: i64,
    pub xid: String,
    pub log_status: i64,
    pub context: String,
    pub rollback_info: Vec<u8>,
}

/// In-memory stand-in for a database connection.
///
/// Serves `INFORMATION_SCHEMA` rows registered with `add_table`, keeps undo
/// log rows with snapshot-based begin/commit/rollback, and records every
/// statement it is handed. Compensating statements are only recorded.
#[derive(Debug, Default)]
pub(crate) struct MemoryConnection {
    columns: HashMap<(String, String), Vec<Row>>,
    indexes: HashMap<(String, String), Vec<Row>>,
    undo_rows: Vec<UndoRow>,
    snapshot: Option<Vec<UndoRow>>,
    queries: Vec<(String, Vec<Value>)>,
    executed: Vec<(String, Vec<Value>)>,
    fail_patterns: Vec<String>,
    fail_commit: bool,
    fail_rollback: bool,
    commits: usize,
    rollbacks: usize,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, schema: &str, table: &str, columns: Vec<Row>, indexes: Vec<Row>) {
        let key = (schema.to_string(), table.to_string());
        self.columns.insert(key.clone(), columns);
        self.indexes.insert(key, indexes);
    }

    pub fn insert_undo_row(
        &mut self,
        xid: &str,
        branch_id: i64,
        log_status: i64,
        context: &str,
        rollback_info: Vec<u8>,
    ) {
        self.undo_rows.push(UndoRow {
            branch_id,
            xid: xid.to_string(),
            log_status,
            context: context.to_string(),
            rollback_info,
        });
    }

    pub fn undo_row_count(&self, xid: &str, branch_id: i64) -> usize {
        self.undo_rows
            .iter()
            .filter(|r| r.xid == xid && r.branch_id == branch_id)
            .count()
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    pub fn queries(&self) -> &[(String, Vec<Value>)] {
        &self.queries
    }

    pub fn executed(&self) -> &[(String, Vec<Value>)] {
        &self.executed
    }

    /// Statements other than undo log maintenance.
    pub fn compensations(&self) -> Vec<&(String, Vec<Value>)> {
        self.executed
            .iter()
            .filter(|(sql, _)| !sql.contains("branch_xid"))
            .collect()
    }

    pub fn catalog_queries(&self) -> usize {
        self.queries
            .iter()
            .filter(|(sql, _)| sql.contains("INFORMATION_SCHEMA"))
            .count()
    }

    /// Fail any statement whose text contains `pattern`.
    pub fn fail_on(&mut self, pattern: &str) {
        self.fail_patterns.push(pattern.to_string());
    }

    pub fn fail_commit(&mut self) {
        self.fail_commit = true;
    }

    pub fn fail_rollback(&mut self) {
        self.fail_rollback = true;
    }

    fn check_injected(&self, sql: &str) -> Result<()> {
        if let Some(pattern) = self.fail_patterns.iter().find(|p| sql.contains(p.as_str())) {
            bail!("injected failure on statement matching {pattern:?}");
        }
        Ok(())
    }

    fn delete_undo_rows(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let before = self.undo_rows.len();
        if sql.contains(" IN ") {
            let Some(start) = sql.find("branch_xid IN (") else {
                bail!("unsupported batch delete: {sql}");
            };
            let rest = &sql[start..];
            let Some(end) = rest.find(')') else {
                bail!("unsupported batch delete: {sql}");
            };
            let branch_count = rest[..end].matches('?').count();
            let branch_ids: Vec<i64> = params[..branch_count]
                .iter()
                .filter_map(Value::as_i64)
                .collect();
            let xids: Vec<String> = params[branch_count..]
                .iter()
                .filter_map(Value::as_text)
                .collect();
            self.undo_rows
                .retain(|r| !(branch_ids.contains(&r.branch_id) && xids.contains(&r.xid)));
        } else {
            let branch_id = params.first().and_then(Value::as_i64);
            let xid = params.get(1).and_then(Value::as_text);
            self.undo_rows
                .retain(|r| !(Some(r.branch_id) == branch_id && Some(&r.xid) == xid.as_ref()));
        }
        Ok((before - self.undo_rows.len()) as u64)
    }
}

impl Connection for MemoryConnection {
    fn begin(&mut self, _cancel: &CancelToken) -> Result<()> {
        if self.snapshot.is_some() {
            bail!("transaction already open");
        }
        self.snapshot = Some(self.undo_rows.clone());
        Ok(())
    }

    fn commit(&mut self, _cancel: &CancelToken) -> Result<()> {
        if self.fail_commit {
            bail!("injected commit failure");
        }
        if self.snapshot.take().is_none() {
            bail!("commit without transaction");
        }
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self, _cancel: &CancelToken) -> Result<()> {
        if self.fail_rollback {
            bail!("injected rollback failure");
        }
        match self.snapshot.take() {
            Some(rows) => self.undo_rows = rows,
            None => bail!("rollback without transaction"),
        }
        self.rollbacks += 1;
        Ok(())
    }

    fn query(&mut self, _cancel: &CancelToken, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.check_injected(sql)?;
        self.queries.push((sql.to_string(), params.to_vec()));

        let catalog_key = || {
            (
                params.first().and_then(Value::as_text).unwrap_or_default(),
                params.get(1).and_then(Value::as_text).unwrap_or_default(),
            )
        };

        if sql.contains("`INFORMATION_SCHEMA`.`COLUMNS`") {
            return Ok(self.columns.get(&catalog_key()).cloned().unwrap_or_default());
        }
        if sql.contains("`INFORMATION_SCHEMA`.`STATISTICS`") {
            return Ok(self.indexes.get(&catalog_key()).cloned().unwrap_or_default());
        }
        if sql.ends_with("FOR UPDATE") {
            let branch_id = params.first().and_then(Value::as_i64);
            let xid = params.get(1).and_then(Value::as_text);
            return Ok(self
                .undo_rows
                .iter()
                .filter(|r| Some(r.branch_id) == branch_id && Some(&r.xid) == xid.as_ref())
                .map(|r| {
                    vec![
                        Value::Int(r.log_status),
                        Value::Varchar(r.context.clone()),
                        Value::Bytes(r.rollback_info.clone()),
                    ]
                })
                .collect());
        }
        bail!("unsupported query: {sql}")
    }

    fn execute(&mut self, _cancel: &CancelToken, sql: &str, params: &[Value]) -> Result<u64> {
        self.check_injected(sql)?;
        self.executed.push((sql.to_string(), params.to_vec()));

        if sql.starts_with("DELETE FROM") && sql.contains("branch_xid") {
            return self.delete_undo_rows(sql, params);
        }
        Ok(1)
    }
}

/// A row shaped like the MySQL column catalog query result.
pub(crate) fn column_row(
    schema: &str,
    table: &str,
    name: &str,
    data_type: &str,
    key: &str,
    nullable: &str,
    extra: &str,
) -> Row {
    vec![
        Value::from("def"),
        Value::from(table),
        Value::from(schema),
        Value::from(name),
        Value::from(data_type),
        Value::from(data_type),
        Value::from(key),
        Value::from(nullable),
        Value::from(extra),
    ]
}

/// A row shaped like the MySQL index catalog query result.
pub(crate) fn index_row(index_name: &str, column: &str, non_unique: &str) -> Row {
    vec![
        Value::from(index_name),
        Value::from(column),
        Value::from(non_unique),
        Value::from("BTREE"),
        Value::from("A"),
        Value::Int(0),
    ]
}
