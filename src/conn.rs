use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::error::UndoError;
use crate::value::{Row, Value};

/// A single relational connection hosting at most one local transaction.
///
/// Statements use `?` placeholders bound positionally from `params`. The
/// caller's `CancelToken` is passed through so a driver can abort a blocked
/// call; the engine also checks it before every call.
pub trait Connection {
    fn begin(&mut self, cancel: &CancelToken) -> Result<()>;

    fn commit(&mut self, cancel: &CancelToken) -> Result<()>;

    fn rollback(&mut self, cancel: &CancelToken) -> Result<()>;

    /// Run a statement that returns rows.
    fn query(&mut self, cancel: &CancelToken, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Run a statement that modifies rows, returning the affected count.
    fn execute(&mut self, cancel: &CancelToken, sql: &str, params: &[Value]) -> Result<u64>;
}

/// Cancellation flag plus optional deadline, shared by every database call
/// made on behalf of one request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Cancel this token and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn check(&self) -> Result<(), UndoError> {
        if self.is_cancelled() {
            return Err(UndoError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(UndoError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
