use thiserror::Error;

pub type Result<T, E = UndoError> = std::result::Result<T, E>;

/// Errors surfaced by the metadata loader, the undo log store and the
/// rollback engine.
#[derive(Debug, Error)]
pub enum UndoError {
    /// The catalog returned no columns or no indexes for a table.
    #[error("not found: {0}")]
    NotFound(String),

    /// Empty xid or branch id list passed to a batch delete.
    #[error("xid or branch_id can't be empty")]
    ParamFault,

    /// A persisted payload or wire message could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Any prepare/exec/scan/commit error reported by the connection.
    #[error("execution failed: {context}")]
    Execution {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// No table metadata, parser or undo executor for an undo entry.
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Settings that cannot work, caught when a manager is built.
    #[error("invalid config: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl UndoError {
    pub fn execution(context: impl Into<String>, source: anyhow::Error) -> Self {
        UndoError::Execution {
            context: context.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for UndoError {
    fn from(e: serde_json::Error) -> Self {
        UndoError::Decode(e.to_string())
    }
}
