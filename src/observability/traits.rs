use std::time::Duration;

use crate::error::ErrorKind;

/// Discrete diagnostic events emitted while an invocation runs.
///
/// Events carry identifiers and classifications only; request arguments and
/// response content never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    StreamOpened { attempt: u32 },
    TriggerSent { attempt: u32 },
    /// A frame arrived before the open signal and was dropped.
    FrameDropped { attempt: u32 },
    FrameReceived { attempt: u32, envelope: &'static str },
    IdleTimeout { attempt: u32, idle: Duration },
    SessionSettled { attempt: u32, outcome: Result<usize, ErrorKind> },
    RetryScheduled { attempt: u32, delay: Duration, cause: ErrorKind },
    FallbackEngaged { cause: ErrorKind },
    SingleShotCompleted { status: u16 },
}

/// Numeric measurements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverMetric {
    InvocationLatency(Duration),
    FramesReceived(u64),
}

/// Diagnostics sink injected into every component at construction.
pub trait Observer: Send + Sync {
    fn record_event(&self, event: &ObserverEvent);

    fn record_metric(&self, metric: &ObserverMetric);

    fn flush(&self) {}

    fn name(&self) -> &str;
}

/// Discards everything. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record_event(&self, _event: &ObserverEvent) {}

    fn record_metric(&self, _metric: &ObserverMetric) {}

    fn name(&self) -> &str {
        "noop"
    }
}
