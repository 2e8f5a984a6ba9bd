use tracing::{debug, info, warn};

use super::traits::{Observer, ObserverEvent, ObserverMetric};

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::StreamOpened { attempt } => {
                debug!(attempt, "incremental feed opened");
            }
            ObserverEvent::TriggerSent { attempt } => {
                debug!(attempt, "streaming trigger issued");
            }
            ObserverEvent::FrameDropped { attempt } => {
                debug!(attempt, "frame before open signal dropped");
            }
            ObserverEvent::FrameReceived { attempt, envelope } => {
                tracing::trace!(attempt, envelope, "frame received");
            }
            ObserverEvent::IdleTimeout { attempt, idle } => {
                warn!(attempt, idle_ms = idle.as_millis() as u64, "feed went idle");
            }
            ObserverEvent::SessionSettled { attempt, outcome } => match outcome {
                Ok(len) => debug!(attempt, text_len = len, "streaming session settled"),
                Err(kind) => debug!(attempt, kind = %kind, "streaming session failed"),
            },
            ObserverEvent::RetryScheduled {
                attempt,
                delay,
                cause,
            } => {
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    cause = %cause,
                    "streaming attempt failed, retrying"
                );
            }
            ObserverEvent::FallbackEngaged { cause } => {
                info!(cause = %cause, "streaming exhausted, falling back to single-shot call");
            }
            ObserverEvent::SingleShotCompleted { status } => {
                debug!(status, "single-shot call completed");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::InvocationLatency(d) => {
                debug!(latency_ms = d.as_millis() as u64, "invocation latency");
            }
            ObserverMetric::FramesReceived(n) => {
                debug!(frames = n, "frames received");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
