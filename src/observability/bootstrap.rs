//! Process-wide observability setup and teardown.
//!
//! [`Observability::acquire`] installs the logging subscriber, the metrics
//! recorder and the span exporter exactly once per process and returns the
//! [`Telemetry`] handle that is injected everywhere else.
//! [`Observability::release`] consumes the value, so teardown can happen only
//! once and only by its owner.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::config::{Mode, ObservabilityConfig};
use crate::persistence::StoreError;
use crate::observability::exporter::{LogExporter, TelemetryExporter};
use crate::observability::logging;
use crate::observability::metrics;
use crate::observability::telemetry::{Telemetry, TelemetryError};

static ACQUIRED: AtomicBool = AtomicBool::new(false);

/// Fatal errors during startup.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("observability already initialized in this process")]
    AlreadyInitialized,

    #[error("failed to install log subscriber: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to prepare user store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// The acquired observability backend.
pub struct Observability {
    mode: Mode,
    telemetry: Telemetry,
}

impl Observability {
    /// Initialize logging, metrics and span export for the process.
    ///
    /// Plain mode installs logging only and yields a disabled telemetry.
    pub fn acquire(mode: Mode, config: &ObservabilityConfig) -> Result<Self, BootstrapError> {
        if ACQUIRED.swap(true, Ordering::SeqCst) {
            return Err(BootstrapError::AlreadyInitialized);
        }

        logging::init_logging(config)?;

        let telemetry = match mode {
            Mode::Plain => Telemetry::disabled(),
            Mode::Traced => {
                let scrape = config.metrics_address.as_deref().filter(|a| !a.is_empty());
                if let Some(raw) = scrape {
                    let addr: SocketAddr = raw
                        .parse()
                        .map_err(|_| BootstrapError::MetricsAddress(raw.to_string()))?;
                    metrics::init_metrics(addr)?;
                }
                let exporter = LogExporter::new(&config.service_name, config.span_batch_size);
                Telemetry::new(&config.service_name, Arc::new(exporter))
            }
        };

        tracing::info!(
            mode = %mode,
            service = %config.service_name,
            telemetry_enabled = telemetry.is_enabled(),
            "Observability initialized"
        );

        Ok(Self { mode, telemetry })
    }

    /// Build from an explicit exporter without touching process-wide state.
    ///
    /// Plain mode ignores the exporter.
    pub fn with_exporter(
        mode: Mode,
        service_name: &str,
        exporter: Arc<dyn TelemetryExporter>,
    ) -> Self {
        let telemetry = match mode {
            Mode::Plain => Telemetry::disabled(),
            Mode::Traced => Telemetry::new(service_name, exporter),
        };
        Self { mode, telemetry }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Handle to inject into components that emit telemetry.
    pub fn telemetry(&self) -> Telemetry {
        self.telemetry.clone()
    }

    /// Flush and release the telemetry backend.
    pub async fn release(self) -> Result<(), TelemetryError> {
        tracing::info!("Shutting down telemetry");
        self.telemetry.shutdown().await
    }
}
