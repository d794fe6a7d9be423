pub mod mysql;

use std::collections::HashMap;

use tracing::debug;

use crate::conn::{CancelToken, Connection};
use crate::error::{Result, UndoError};
use crate::types::{DbType, SqlType};
use crate::value::Value;

use super::SqlUndoLog;

pub use mysql::{MysqlUndoDeleteExecutor, MysqlUndoInsertExecutor, MysqlUndoUpdateExecutor};

/// A compensating statement with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Applies the compensation for one undo entry on the caller's connection,
/// inside the caller's transaction.
pub trait UndoExecutor: Send + Sync {
    fn execute_on(
        &self,
        cancel: &CancelToken,
        db_type: DbType,
        undo_log: &SqlUndoLog,
        conn: &mut dyn Connection,
    ) -> Result<()>;
}

/// Executors keyed by engine and original statement kind.
pub struct UndoExecutorRegistry {
    executors: HashMap<(DbType, SqlType), Box<dyn UndoExecutor>>,
}

impl UndoExecutorRegistry {
    pub fn empty() -> Self {
        UndoExecutorRegistry {
            executors: HashMap::new(),
        }
    }

    /// Registry with the MySQL insert/update/delete executors.
    pub fn mysql() -> Self {
        let mut registry = Self::empty();
        registry.register(DbType::MySql, SqlType::Insert, Box::new(MysqlUndoInsertExecutor));
        registry.register(DbType::MySql, SqlType::Update, Box::new(MysqlUndoUpdateExecutor));
        registry.register(DbType::MySql, SqlType::Delete, Box::new(MysqlUndoDeleteExecutor));
        registry
    }

    pub fn register(&mut self, db_type: DbType, sql_type: SqlType, executor: Box<dyn UndoExecutor>) {
        self.executors.insert((db_type, sql_type), executor);
    }

    pub fn resolve(&self, db_type: DbType, sql_type: SqlType) -> Result<&dyn UndoExecutor> {
        self.executors
            .get(&(db_type, sql_type))
            .map(|e| e.as_ref())
            .ok_or_else(|| {
                UndoError::Resolution(format!("no undo executor for {db_type} {sql_type}"))
            })
    }
}

/// Run prepared compensating statements in order.
pub(crate) fn run_statements(
    cancel: &CancelToken,
    statements: Vec<UndoStatement>,
    conn: &mut dyn Connection,
) -> Result<()> {
    for stmt in statements {
        cancel.check()?;
        debug!(sql = %stmt.sql, "execute undo statement");
        conn.execute(cancel, &stmt.sql, &stmt.params)
            .map_err(|e| UndoError::execution(format!("execute undo sql: {}", stmt.sql), e))?;
    }
    Ok(())
}
