//! Diagnostics for the invocation client.
//!
//! Components receive an [`Observer`] at construction instead of writing to
//! an ambient output channel. [`NoopObserver`] is the default,
//! [`LogObserver`] forwards to `tracing`, and [`RecordingObserver`] keeps
//! everything in memory so tests can assert on what was emitted.

pub mod log;
pub mod traits;

pub use log::LogObserver;
pub use traits::{NoopObserver, Observer, ObserverEvent, ObserverMetric};

use std::sync::{Arc, Mutex};

/// Composite observer that dispatches to multiple backends.
pub struct CompositeObserver {
    observers: Vec<Arc<dyn Observer>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn Observer>>) -> Self {
        Self { observers }
    }

    pub fn add(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }
}

impl Observer for CompositeObserver {
    fn record_event(&self, event: &ObserverEvent) {
        for observer in &self.observers {
            observer.record_event(event);
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        for observer in &self.observers {
            observer.record_metric(metric);
        }
    }

    fn flush(&self) {
        for observer in &self.observers {
            observer.flush();
        }
    }

    fn name(&self) -> &str {
        "composite"
    }
}

/// In-memory observer.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
    metrics: Mutex<Vec<ObserverMetric>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn metrics(&self) -> Vec<ObserverMetric> {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&ObserverEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl Observer for RecordingObserver {
    fn record_event(&self, event: &ObserverEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.push(metric.clone());
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}
