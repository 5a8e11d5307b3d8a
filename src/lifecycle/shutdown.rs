//! Shutdown coordination and failure reporting.

use std::fmt;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinError;

use crate::observability::TelemetryError;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A component stopped during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Listener,
    Telemetry,
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Listener => f.write_str("listener"),
            Participant::Telemetry => f.write_str("telemetry"),
        }
    }
}

/// Why one participant failed to stop cleanly.
#[derive(Debug, Error)]
pub enum ParticipantFailure {
    #[error("listener: serve loop failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("listener: serve task did not complete: {0}")]
    ServeTask(#[source] JoinError),

    #[error("telemetry: {0}")]
    Telemetry(#[source] TelemetryError),

    #[error("{0}: did not stop before the shutdown deadline")]
    DeadlineExceeded(Participant),
}

impl ParticipantFailure {
    pub fn participant(&self) -> Participant {
        match self {
            ParticipantFailure::Serve(_) | ParticipantFailure::ServeTask(_) => {
                Participant::Listener
            }
            ParticipantFailure::Telemetry(_) => Participant::Telemetry,
            ParticipantFailure::DeadlineExceeded(participant) => *participant,
        }
    }
}

/// Every participant failure from one shutdown, none discarded.
#[derive(Debug, Error)]
pub struct ShutdownError {
    pub failures: Vec<ParticipantFailure>,
}

impl ShutdownError {
    /// `None` when every participant stopped cleanly.
    pub fn from_failures(failures: Vec<ParticipantFailure>) -> Option<Self> {
        (!failures.is_empty()).then_some(Self { failures })
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("shutdown failed: ")?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}
