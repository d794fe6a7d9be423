use std::env;

use crate::error::{Result, UndoError};

pub const DEFAULT_UNDO_LOG_TABLE: &str = "undo_log";
pub const DEFAULT_SERIALIZER: &str = "json";
pub const COMPRESSOR_NONE: &str = "NONE";

const ENV_UNDO_LOG_TABLE: &str = "UNDO_LOG_TABLE";
const ENV_SERIALIZATION: &str = "UNDO_LOG_SERIALIZATION";
const ENV_COMPRESS_TYPE: &str = "UNDO_LOG_COMPRESS_TYPE";
const ENV_DB_NAME: &str = "UNDO_DB_NAME";

/// Settings for the undo log manager.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoConfig {
    /// Name of the undo log table in the business database.
    pub undo_log_table: String,

    /// Serializer used when a row's context carries no `serializer` key.
    pub default_serializer: String,

    /// Reserved: payload compression is not applied yet.
    pub compress_enabled: bool,
    pub compress_type: String,

    /// Schema whose catalog the table meta cache reflects.
    pub db_name: String,
}

impl Default for UndoConfig {
    fn default() -> Self {
        UndoConfig {
            undo_log_table: DEFAULT_UNDO_LOG_TABLE.to_string(),
            default_serializer: DEFAULT_SERIALIZER.to_string(),
            compress_enabled: false,
            compress_type: COMPRESSOR_NONE.to_string(),
            db_name: String::new(),
        }
    }
}

impl UndoConfig {
    /// Defaults overridden by `UNDO_LOG_TABLE`, `UNDO_LOG_SERIALIZATION`,
    /// `UNDO_LOG_COMPRESS_TYPE` and `UNDO_DB_NAME`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = UndoConfig::default();
        if let Some(table) = lookup(ENV_UNDO_LOG_TABLE).filter(|v| !v.trim().is_empty()) {
            config.undo_log_table = table.trim().to_string();
        }
        if let Some(serializer) = lookup(ENV_SERIALIZATION).filter(|v| !v.trim().is_empty()) {
            config.default_serializer = serializer.trim().to_lowercase();
        }
        if let Some(compress) = lookup(ENV_COMPRESS_TYPE).filter(|v| !v.trim().is_empty()) {
            config.compress_type = compress.trim().to_uppercase();
            config.compress_enabled = config.compress_type != COMPRESSOR_NONE;
        }
        if let Some(db_name) = lookup(ENV_DB_NAME) {
            config.db_name = db_name.trim().to_string();
        }
        config
    }

    /// Check the settings a catalog-backed manager depends on. An empty
    /// schema would make every unqualified table lookup miss.
    pub fn validate(&self) -> Result<()> {
        if self.undo_log_table.trim().is_empty() {
            return Err(UndoError::Config("undo log table name is empty".to_string()));
        }
        if self.db_name.trim().is_empty() {
            return Err(UndoError::Config(format!(
                "database name is empty, set {ENV_DB_NAME}"
            )));
        }
        Ok(())
    }

    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    pub fn with_undo_log_table(mut self, table: impl Into<String>) -> Self {
        self.undo_log_table = table.into();
        self
    }
}
