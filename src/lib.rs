//! AT-mode branch rollback: replays a branch's undo log newest-first inside
//! one local transaction, then deletes the undo row.

pub mod config;
pub mod conn;
pub mod error;
pub mod meta;
pub mod protocol;
pub mod sql_util;
pub mod types;
pub mod undo;
pub mod value;

#[cfg(test)]
mod test_support;

pub use config::UndoConfig;
pub use conn::{CancelToken, Connection};
pub use error::{Result, UndoError};
pub use meta::{TableMetaCache, TableMetaLoader, TableMetaSource};
pub use types::{DbType, SqlType, TableMeta};
pub use undo::UndoLogManager;
pub use value::{Row, Value};
