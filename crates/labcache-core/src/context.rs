//! Per-call cancellation and deadline propagation.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation handle and optional deadline attached by the caller.
///
/// Cloning shares the same token; [`CallContext::child`] derives a token that
/// is cancelled with its parent but can also be cancelled on its own.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self { cancel: CancellationToken::new(), deadline: None }
    }

    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self { cancel, deadline: None }
    }

    /// Attach a deadline. An earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn child(&self) -> Self {
        Self { cancel: self.cancel.child_token(), deadline: self.deadline }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `limit`, shortened to the time left before the caller's deadline.
    pub fn effective_timeout(&self, limit: Duration) -> Duration {
        match self.deadline {
            Some(deadline) => limit.min(deadline.saturating_duration_since(Instant::now())),
            None => limit,
        }
    }
}
