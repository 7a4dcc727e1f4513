use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::DataError;

/// Per-call execution context: a cancellation token and an optional deadline.
///
/// Every backend round trip runs through [`QueryCtx::run`]. Cloning shares
/// the token, so cancelling the original cancels all clones.
#[derive(Debug, Clone, Default)]
pub struct QueryCtx {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast when the context is already cancelled or expired.
    pub fn check(&self) -> Result<(), DataError> {
        if self.cancel.is_cancelled() {
            return Err(DataError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DataError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the context is cancelled or the
    /// deadline passes first. The future is dropped on interruption.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, DataError>
    where
        F: Future<Output = Result<T, DataError>>,
    {
        self.check()?;
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(DataError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => Err(DataError::DeadlineExceeded),
                res = fut => res,
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(DataError::Cancelled),
                res = fut => res,
            },
        }
    }
}
