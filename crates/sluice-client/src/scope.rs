use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// A cancellation scope for a call or a context: a token that can be
/// cancelled explicitly, plus an optional deadline.
///
/// The surfaced cause distinguishes the two: an explicit cancel is
/// [`Error::Cancelled`], an elapsed deadline is [`Error::Timeout`].
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// Scope with no deadline; fires only on explicit cancel.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Cancels the scope; all calls bound to it abort.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// The error a fired scope surfaces: explicit cancel wins over an
    /// elapsed deadline.
    pub(crate) fn cause(&self) -> Error {
        if self.token.is_cancelled() {
            Error::Cancelled
        } else {
            Error::Timeout
        }
    }

    /// Resolves when the scope fires. A scope with no deadline and no
    /// cancel never resolves.
    pub(crate) async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}
