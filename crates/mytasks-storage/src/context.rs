//! Per-call deadlines.
//!
//! Every store operation takes an [`OpContext`]. Waiting for the connection
//! and plain reads are cut off when the deadline passes. Writes check the
//! deadline before they start; once a transaction has begun it either
//! commits or rolls back as a whole, and multi-row rewrites check between
//! rows and roll back on expiry.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{DbError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpContext {
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that never expires.
    pub fn background() -> Self {
        OpContext { deadline: None }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        OpContext {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        OpContext {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fails with [`DbError::DeadlineExceeded`] once the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(DbError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Runs `fut` until it finishes or the deadline passes, whichever is first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| DbError::DeadlineExceeded)?,
            None => fut.await,
        }
    }
}
