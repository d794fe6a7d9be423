//! Undo log model and the rollback engine.
//!
//! A branch's undo row carries a serialized `BranchUndoLog`: one
//! `SqlUndoLog` per data-modifying statement, in execution order, each with
//! the before and after images of the rows it touched. Rolling the branch
//! back replays those entries newest-first through undo executors and then
//! deletes the row, all inside one local transaction.

pub mod context;
pub mod executor;
pub mod manager;
pub mod parser;
pub mod store;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{SqlType, TableMeta};
use crate::value::Value;

pub use executor::{UndoExecutor, UndoExecutorRegistry};
pub use manager::UndoLogManager;
pub use parser::{JsonUndoLogParser, UndoLogParser, UndoLogParserRegistry};
pub use store::{UndoLogRecord, UndoLogStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoLogStatus {
    /// Compensation still pending.
    Normal,
    /// The global transaction already finished; nothing to undo.
    GlobalFinished,
    Unknown(i64),
}

impl UndoLogStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => UndoLogStatus::Normal,
            1 => UndoLogStatus::GlobalFinished,
            other => UndoLogStatus::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            UndoLogStatus::Normal => 0,
            UndoLogStatus::GlobalFinished => 1,
            UndoLogStatus::Unknown(code) => *code,
        }
    }

    pub fn can_undo(&self) -> bool {
        *self == UndoLogStatus::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    #[default]
    Null,
    PrimaryKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub key_type: KeyType,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowImage {
    pub fields: Vec<Field>,
}

impl RowImage {
    /// Fields forming the primary key: the table's primary index when known,
    /// otherwise the fields flagged as keys in the image.
    pub fn primary_keys(&self, meta: Option<&TableMeta>) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| match meta {
                Some(meta) => meta.is_primary_key(&f.name),
                None => f.key_type == KeyType::PrimaryKey,
            })
            .collect()
    }

    pub fn non_primary_keys(&self, meta: Option<&TableMeta>) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| match meta {
                Some(meta) => !meta.is_primary_key(&f.name),
                None => f.key_type != KeyType::PrimaryKey,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableImage {
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub rows: Vec<RowImage>,
}

impl TableImage {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Undo record of one original statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlUndoLog {
    pub sql_type: SqlType,
    pub table_name: String,
    #[serde(default)]
    pub before_image: TableImage,
    #[serde(default)]
    pub after_image: TableImage,
    #[serde(skip)]
    pub table_meta: Option<Arc<TableMeta>>,
}

impl SqlUndoLog {
    pub fn new(sql_type: SqlType, table_name: impl Into<String>) -> Self {
        SqlUndoLog {
            sql_type,
            table_name: table_name.into(),
            before_image: TableImage::default(),
            after_image: TableImage::default(),
            table_meta: None,
        }
    }

    pub fn set_table_meta(&mut self, meta: Arc<TableMeta>) {
        self.table_meta = Some(meta);
    }

    pub fn table_meta(&self) -> Option<&TableMeta> {
        self.table_meta.as_deref()
    }
}

/// Decoded `rollback_info` of one undo row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchUndoLog {
    #[serde(default)]
    pub xid: String,
    #[serde(default)]
    pub branch_id: i64,
    #[serde(default)]
    pub sql_undo_logs: Vec<SqlUndoLog>,
}
