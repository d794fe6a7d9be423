use crate::conn::{CancelToken, Connection};
use crate::error::{Result, UndoError};
use crate::sql_util::add_escape;
use crate::types::{DbType, TableMeta};
use crate::undo::{Field, RowImage, SqlUndoLog};

use super::{run_statements, UndoExecutor, UndoStatement};

// Original INSERT: delete the inserted rows (after image) by primary key.
pub struct MysqlUndoInsertExecutor;

// Original UPDATE: write the before image back over the row.
pub struct MysqlUndoUpdateExecutor;

// Original DELETE: re-insert the deleted rows (before image).
pub struct MysqlUndoDeleteExecutor;

fn require_meta(undo_log: &SqlUndoLog) -> Result<&TableMeta> {
    undo_log.table_meta().ok_or_else(|| {
        UndoError::Resolution(format!("table meta not resolved for {}", undo_log.table_name))
    })
}

// Every primary key column must be present, or the WHERE clause would
// match sibling rows of a composite key.
fn primary_keys<'a>(row: &'a RowImage, meta: &TableMeta) -> Result<Vec<&'a Field>> {
    let key_names = meta.primary_key_names();
    if key_names.is_empty() {
        return Err(UndoError::Resolution(format!(
            "table {} has no primary key",
            meta.table_name
        )));
    }

    let pk = row.primary_keys(Some(meta));
    if let Some(missing) = key_names
        .iter()
        .find(|name| !pk.iter().any(|f| f.name.eq_ignore_ascii_case(name)))
    {
        return Err(UndoError::Resolution(format!(
            "primary key column {missing} missing from row image of {}",
            meta.table_name
        )));
    }
    Ok(pk)
}

fn where_clause(pk: &[&Field]) -> String {
    pk.iter()
        .map(|f| format!("{} = ?", add_escape(&f.name, DbType::MySql)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn table_name(undo_log: &SqlUndoLog) -> String {
    add_escape(&undo_log.table_name, DbType::MySql)
}

impl MysqlUndoInsertExecutor {
    pub fn build_statements(undo_log: &SqlUndoLog) -> Result<Vec<UndoStatement>> {
        let meta = require_meta(undo_log)?;
        let table = table_name(undo_log);

        undo_log
            .after_image
            .rows
            .iter()
            .map(|row| {
                let pk = primary_keys(row, meta)?;
                Ok(UndoStatement {
                    sql: format!("DELETE FROM {table} WHERE {}", where_clause(&pk)),
                    params: pk.iter().map(|f| f.value.clone()).collect(),
                })
            })
            .collect()
    }
}

impl MysqlUndoUpdateExecutor {
    pub fn build_statements(undo_log: &SqlUndoLog) -> Result<Vec<UndoStatement>> {
        let meta = require_meta(undo_log)?;
        let table = table_name(undo_log);

        let mut statements = Vec::with_capacity(undo_log.before_image.rows.len());
        for row in &undo_log.before_image.rows {
            let pk = primary_keys(row, meta)?;
            let sets = row.non_primary_keys(Some(meta));
            if sets.is_empty() {
                continue;
            }

            let assignments = sets
                .iter()
                .map(|f| format!("{} = ?", add_escape(&f.name, DbType::MySql)))
                .collect::<Vec<_>>()
                .join(", ");
            let params = sets
                .iter()
                .chain(pk.iter())
                .map(|f| f.value.clone())
                .collect();

            statements.push(UndoStatement {
                sql: format!("UPDATE {table} SET {assignments} WHERE {}", where_clause(&pk)),
                params,
            });
        }
        Ok(statements)
    }
}

impl MysqlUndoDeleteExecutor {
    pub fn build_statements(undo_log: &SqlUndoLog) -> Result<Vec<UndoStatement>> {
        require_meta(undo_log)?;
        let table = table_name(undo_log);

        Ok(undo_log
            .before_image
            .rows
            .iter()
            .filter(|row| !row.fields.is_empty())
            .map(|row| {
                let columns = row
                    .fields
                    .iter()
                    .map(|f| add_escape(&f.name, DbType::MySql))
                    .collect::<Vec<_>>()
                    .join(", ");
                let marks = vec!["?"; row.fields.len()].join(", ");
                UndoStatement {
                    sql: format!("INSERT INTO {table} ({columns}) VALUES ({marks})"),
                    params: row.fields.iter().map(|f| f.value.clone()).collect(),
                }
            })
            .collect())
    }
}

impl UndoExecutor for MysqlUndoInsertExecutor {
    fn execute_on(
        &self,
        cancel: &CancelToken,
        _db_type: DbType,
        undo_log: &SqlUndoLog,
        conn: &mut dyn Connection,
    ) -> Result<()> {
        run_statements(cancel, Self::build_statements(undo_log)?, conn)
    }
}

impl UndoExecutor for MysqlUndoUpdateExecutor {
    fn execute_on(
        &self,
        cancel: &CancelToken,
        _db_type: DbType,
        undo_log: &SqlUndoLog,
        conn: &mut dyn Connection,
    ) -> Result<()> {
        run_statements(cancel, Self::build_statements(undo_log)?, conn)
    }
}

impl UndoExecutor for MysqlUndoDeleteExecutor {
    fn execute_on(
        &self,
        cancel: &CancelToken,
        _db_type: DbType,
        undo_log: &SqlUndoLog,
        conn: &mut dyn Connection,
    ) -> Result<()> {
        run_statements(cancel, Self::build_statements(undo_log)?, conn)
    }
}
