//! Caller-controlled interruption of an invocation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::InvokeError;

/// Cancellation token plus optional hard deadline shared by every stage of one
/// invocation: streaming attempts, backoff sleeps and the fallback call.
#[derive(Debug, Clone)]
pub struct CallScope {
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl CallScope {
    pub fn new(cancel: CancellationToken, deadline: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: deadline.map(|budget| (Instant::now() + budget, budget)),
        }
    }

    /// Scope that is never interrupted.
    pub fn unbounded() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    /// Fail fast if the scope is already interrupted.
    pub fn check(&self) -> Result<(), InvokeError> {
        if self.cancel.is_cancelled() {
            return Err(InvokeError::CancellationRequested);
        }
        match self.deadline {
            Some((at, budget)) if Instant::now() >= at => {
                Err(InvokeError::DeadlineExceeded { deadline: budget })
            }
            _ => Ok(()),
        }
    }

    /// Resolves once the caller cancels or the deadline passes.
    pub async fn interrupted(&self) -> InvokeError {
        match self.deadline {
            Some((at, budget)) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => InvokeError::CancellationRequested,
                _ = tokio::time::sleep_until(at) => InvokeError::DeadlineExceeded { deadline: budget },
            },
            None => {
                self.cancel.cancelled().await;
                InvokeError::CancellationRequested
            }
        }
    }

    /// Run `fut` unless the scope is interrupted first.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, InvokeError>
    where
        F: Future<Output = Result<T, InvokeError>>,
    {
        tokio::select! {
            biased;
            err = self.interrupted() => Err(err),
            result = fut => result,
        }
    }
}
