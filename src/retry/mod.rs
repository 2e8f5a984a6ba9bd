//! Bounded retries around streaming attempts.

mod policy;

pub use policy::RetryPlan;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::InvokeError;
use crate::observability::{NoopObserver, Observer, ObserverEvent};
use crate::scope::CallScope;

/// Parse `Retry-After` header value as a delay.
///
/// Supports:
/// - Delta-seconds (`Retry-After: 5`)
/// - HTTP-date (`Retry-After: Wed, 21 Oct 2015 07:28:00 GMT`)
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    if let Ok(when) = httpdate::parse_http_date(raw) {
        let now = std::time::SystemTime::now();
        if let Ok(delay) = when.duration_since(now) {
            return Some(delay);
        }
        return Some(Duration::from_secs(0));
    }

    None
}

/// Runs attempts produced by a factory until one succeeds, a failure is not
/// retryable, or the plan is exhausted.
///
/// The factory receives the 1-based attempt number and must build a fresh
/// attempt each time. The last error is returned unchanged.
pub struct RetryCoordinator {
    plan: RetryPlan,
    observer: Arc<dyn Observer>,
}

impl RetryCoordinator {
    pub fn new(plan: RetryPlan) -> Self {
        Self {
            plan,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn plan(&self) -> &RetryPlan {
        &self.plan
    }

    /// Delay before the attempt following `attempt`, honouring a
    /// server-provided `Retry-After` over the computed backoff.
    pub fn delay_after(&self, attempt: u32, err: &InvokeError) -> Duration {
        let base = err
            .retry_after()
            .unwrap_or_else(|| self.plan.backoff_delay(attempt));
        self.plan.with_jitter(base)
    }

    pub async fn run<T, Op, Fut>(&self, scope: &CallScope, mut attempt_fn: Op) -> Result<T, InvokeError>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, InvokeError>>,
    {
        let max_attempts = self.plan.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match attempt_fn(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= max_attempts || !err.is_retryable() {
                return Err(err);
            }

            let delay = self.delay_after(attempt, &err);
            self.observer.record_event(&ObserverEvent::RetryScheduled {
                attempt,
                delay,
                cause: err.kind(),
            });

            scope
                .guard(async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
            attempt += 1;
        }
    }
}
