//! In-memory exporter for tests and local inspection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::observability::exporter::{HistogramObservation, TelemetryExporter};
use crate::observability::span::FinishedSpan;
use crate::observability::telemetry::TelemetryError;

#[derive(Default)]
struct Recorded {
    spans: Mutex<Vec<FinishedSpan>>,
    histograms: Mutex<Vec<HistogramObservation>>,
    shutdown_calls: AtomicUsize,
    shut_down: AtomicBool,
}

/// Collects everything it is given until shut down, then rejects exports
/// like a real exporter. Cloning shares the same storage.
///
/// Failure knobs let tests exercise error paths: rejected histograms, a
/// failing flush, or a flush slower than the shutdown deadline.
#[derive(Clone, Default)]
pub struct InMemoryExporter {
    recorded: Arc<Recorded>,
    fail_histograms: bool,
    shutdown_failure: Option<String>,
    shutdown_delay: Option<Duration>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every histogram observation.
    pub fn fail_histograms(mut self) -> Self {
        self.fail_histograms = true;
        self
    }

    /// Make `shutdown` return a flush error.
    pub fn fail_shutdown(mut self, message: impl Into<String>) -> Self {
        self.shutdown_failure = Some(message.into());
        self
    }

    /// Make `shutdown` take at least `delay`.
    pub fn slow_shutdown(mut self, delay: Duration) -> Self {
        self.shutdown_delay = Some(delay);
        self
    }

    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.recorded
            .spans
            .lock()
            .map(|spans| spans.clone())
            .unwrap_or_default()
    }

    pub fn spans_named(&self, name: &str) -> Vec<FinishedSpan> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }

    pub fn histograms(&self) -> Vec<HistogramObservation> {
        self.recorded
            .histograms
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn histograms_named(&self, name: &str) -> Vec<HistogramObservation> {
        self.histograms()
            .into_iter()
            .filter(|h| h.name == name)
            .collect()
    }

    pub fn shutdown_calls(&self) -> usize {
        self.recorded.shutdown_calls.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.recorded.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetryExporter for InMemoryExporter {
    fn export_span(&self, span: FinishedSpan) -> Result<(), TelemetryError> {
        if self.is_shut_down() {
            return Err(TelemetryError::Closed);
        }
        let mut spans = self
            .recorded
            .spans
            .lock()
            .map_err(|_| TelemetryError::Export("span store poisoned".into()))?;
        spans.push(span);
        Ok(())
    }

    fn export_histogram(&self, observation: HistogramObservation) -> Result<(), TelemetryError> {
        if self.is_shut_down() {
            return Err(TelemetryError::Closed);
        }
        if self.fail_histograms {
            return Err(TelemetryError::Export(format!(
                "histogram {} rejected",
                observation.name
            )));
        }
        let mut histograms = self
            .recorded
            .histograms
            .lock()
            .map_err(|_| TelemetryError::Export("histogram store poisoned".into()))?;
        histograms.push(observation);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TelemetryError> {
        self.recorded.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.shutdown_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.shutdown_failure {
            return Err(TelemetryError::Flush(message.clone()));
        }
        self.recorded.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::context::SpanContext;
    use crate::observability::telemetry::Telemetry;

    #[tokio::test]
    async fn test_exports_rejected_after_shutdown() {
        let exporter = InMemoryExporter::new();
        let telemetry = Telemetry::new("test", Arc::new(exporter.clone()));

        let (ctx, span) = telemetry.start_span(&SpanContext::none(), "before");
        span.end();
        telemetry.record_histogram(&ctx, "example.before", 1.0, &[]);

        exporter.shutdown().await.unwrap();
        assert!(exporter.is_shut_down());

        let (ctx, span) = telemetry.start_span(&SpanContext::none(), "after");
        span.end();
        telemetry.record_histogram(&ctx, "example.after", 1.0, &[]);

        assert_eq!(exporter.spans().len(), 1);
        assert_eq!(exporter.spans()[0].name, "before");
        assert_eq!(exporter.histograms().len(), 1);
        assert_eq!(exporter.histograms()[0].name, "example.before");
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_accepting() {
        let exporter = InMemoryExporter::new().fail_shutdown("disk full");
        assert!(matches!(
            exporter.shutdown().await,
            Err(TelemetryError::Flush(m)) if m == "disk full"
        ));
        assert!(!exporter.is_shut_down());
        assert_eq!(exporter.shutdown_calls(), 1);
    }
}
