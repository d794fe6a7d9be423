use tracing::error;

use crate::conn::{CancelToken, Connection};
use crate::error::{Result, UndoError};
use crate::sql_util::placeholders;
use crate::value::{column, opt_text, Value};

use super::UndoLogStatus;

pub const BRANCH_ID_COLUMN: &str = "branch_xid";
pub const XID_COLUMN: &str = "xid";

/// One persisted undo row, as selected for rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoLogRecord {
    pub log_status: UndoLogStatus,
    pub context: String,
    pub rollback_info: Vec<u8>,
}

/// Statements against the undo log table.
#[derive(Debug, Clone)]
pub struct UndoLogStore {
    table: String,
}

impl UndoLogStore {
    pub fn new(table: impl Into<String>) -> Self {
        UndoLogStore {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn select_sql(&self) -> String {
        format!(
            "SELECT `log_status`,`context`,`rollback_info` FROM {} WHERE {BRANCH_ID_COLUMN} = ? AND {XID_COLUMN} = ? FOR UPDATE",
            self.table
        )
    }

    pub fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {BRANCH_ID_COLUMN} = ? AND {XID_COLUMN} = ?",
            self.table
        )
    }

    pub fn batch_delete_sql(&self, xid_count: usize, branch_id_count: usize) -> Result<String> {
        if xid_count == 0 || branch_id_count == 0 {
            return Err(UndoError::ParamFault);
        }
        Ok(format!(
            "DELETE FROM {} WHERE {BRANCH_ID_COLUMN} IN {} AND {XID_COLUMN} IN {}",
            self.table,
            placeholders(branch_id_count),
            placeholders(xid_count)
        ))
    }

    /// Lock and read every undo row of a branch. Must run inside a local
    /// transaction for the row lock to hold until commit.
    pub fn select_for_update(
        &self,
        cancel: &CancelToken,
        xid: &str,
        branch_id: i64,
        conn: &mut dyn Connection,
    ) -> Result<Vec<UndoLogRecord>> {
        cancel.check()?;
        let rows = conn
            .query(
                cancel,
                &self.select_sql(),
                &[Value::Int(branch_id), Value::from(xid)],
            )
            .map_err(|e| {
                error!(xid, branch_id, error = %e, "select undo log failed");
                UndoError::execution("select undo log", e)
            })?;

        rows.into_iter()
            .map(|row| {
                let status = column(&row, 0, "log_status")?;
                let code = status.as_i64().ok_or_else(|| {
                    UndoError::Decode(format!("invalid undo log status {status:?}"))
                })?;
                let context = opt_text(&row, 1, "context")?;
                let rollback_info = column(&row, 2, "rollback_info")?
                    .clone()
                    .into_bytes()
                    .unwrap_or_default();
                Ok(UndoLogRecord {
                    log_status: UndoLogStatus::from_code(code),
                    context,
                    rollback_info,
                })
            })
            .collect()
    }

    pub fn delete_undo_log(
        &self,
        cancel: &CancelToken,
        xid: &str,
        branch_id: i64,
        conn: &mut dyn Connection,
    ) -> Result<()> {
        cancel.check()?;
        conn.execute(
            cancel,
            &self.delete_sql(),
            &[Value::Int(branch_id), Value::from(xid)],
        )
        .map_err(|e| {
            error!(xid, branch_id, error = %e, "delete undo log failed");
            UndoError::execution("delete undo log", e)
        })?;
        Ok(())
    }

    /// Delete the undo rows of several branches in one statement, one bound
    /// placeholder per id.
    pub fn batch_delete_undo_log(
        &self,
        cancel: &CancelToken,
        xids: &[String],
        branch_ids: &[i64],
        conn: &mut dyn Connection,
    ) -> Result<()> {
        let sql = self
            .batch_delete_sql(xids.len(), branch_ids.len())
            .inspect_err(|e| error!(error = %e, "build batch delete undo log sql failed"))?;

        let params: Vec<Value> = branch_ids
            .iter()
            .map(|id| Value::Int(*id))
            .chain(xids.iter().map(|xid| Value::from(xid.as_str())))
            .collect();

        cancel.check()?;
        conn.execute(cancel, &sql, &params).map_err(|e| {
            error!(error = %e, "batch delete undo log failed");
            UndoError::execution("batch delete undo log", e)
        })?;
        Ok(())
    }
}
