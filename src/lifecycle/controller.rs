//! Process lifecycle: start serving, wait for termination, shut down within
//! a deadline.
//!
//! # Phases
//! ```text
//! Idle → Starting → Serving → ShuttingDown → Stopped
//!           ↓          ↓                        ↓
//!         Failed     (serve error still        Failed (any participant
//!                     shuts down)                      failed to stop)
//! ```
//!
//! # Design Decisions
//! - The listener is bound by the caller and owned here from then on
//! - The listener drains before telemetry is flushed, both against one deadline
//! - Every participant failure is kept; none masks another

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use axum::http::uri::InvalidUri;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{timeout_at, Instant};

use crate::config::{AppConfig, Mode};
use crate::http::{build_router, AppState, Dependencies};
use crate::lifecycle::shutdown::{Participant, ParticipantFailure, Shutdown, ShutdownError};
use crate::observability::{InstrumentationGateway, Observability, Telemetry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Idle,
    Starting,
    Serving,
    ShuttingDown,
    Stopped,
    Failed,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Idle => "idle",
            LifecyclePhase::Starting => "starting",
            LifecyclePhase::Serving => "serving",
            LifecyclePhase::ShuttingDown => "shutting-down",
            LifecyclePhase::Stopped => "stopped",
            LifecyclePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read listener address: {0}")]
    ListenerAddress(#[source] io::Error),

    #[error("invalid sub-request target: {0}")]
    SubrequestTarget(#[from] InvalidUri),
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

type ServeOutcome = Result<io::Result<()>, JoinError>;

/// Drives one server from startup to a bounded shutdown.
pub struct LifecycleController {
    mode: Mode,
    deps: Dependencies,
    telemetry: Telemetry,
    config: AppConfig,
    phase: watch::Sender<LifecyclePhase>,
}

impl LifecycleController {
    pub fn new(mode: Mode, deps: Dependencies, telemetry: Telemetry, config: AppConfig) -> Self {
        let (phase, _) = watch::channel(LifecyclePhase::Idle);
        Self {
            mode,
            deps,
            telemetry,
            config,
            phase,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions. The receiver outlives the controller.
    pub fn subscribe(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    /// Serve on `listener` until `termination` resolves or the serve loop
    /// ends, then stop the listener and release `observability`.
    ///
    /// Returns after the listener is stopped, even when shutdown failed.
    pub async fn run<F>(
        self,
        listener: TcpListener,
        observability: Observability,
        termination: F,
    ) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()> + Send,
    {
        self.transition(LifecyclePhase::Starting);

        let router = match self.prepare(&listener) {
            Ok(router) => router,
            Err(e) => {
                tracing::error!(error = %e, "Startup failed");
                self.transition(LifecyclePhase::Failed);
                if let Err(e) = observability.release().await {
                    tracing::warn!(error = %e, "Telemetry release failed after startup error");
                }
                return Err(e.into());
            }
        };

        let shutdown = Shutdown::new();
        let mut drain = shutdown.subscribe();
        let mut server: JoinHandle<io::Result<()>> = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = drain.recv().await;
                })
                .await
        });
        self.transition(LifecyclePhase::Serving);

        let finished = tokio::select! {
            outcome = &mut server => {
                tracing::error!("Serve loop exited before termination was requested");
                Some(outcome)
            }
            () = termination => {
                tracing::info!("Termination requested");
                None
            }
        };

        self.transition(LifecyclePhase::ShuttingDown);
        let grace = Duration::from_secs(self.config.timeouts.shutdown_secs);
        let deadline = Instant::now() + grace;
        tracing::info!(grace_secs = grace.as_secs(), "Shutdown started");

        // Flush only after the drain so spans of in-flight requests are exported.
        let listener_result = stop_listener(&shutdown, server, finished, deadline).await;
        let telemetry_result = release_observability(observability, deadline).await;

        let failures: Vec<ParticipantFailure> = [listener_result, telemetry_result]
            .into_iter()
            .filter_map(Result::err)
            .collect();

        self.transition(LifecyclePhase::Stopped);
        match ShutdownError::from_failures(failures) {
            None => {
                tracing::info!("Shutdown complete");
                Ok(())
            }
            Some(err) => {
                tracing::error!(error = %err, "Shutdown completed with failures");
                self.transition(LifecyclePhase::Failed);
                Err(err.into())
            }
        }
    }

    fn prepare(&self, listener: &TcpListener) -> Result<axum::Router, StartupError> {
        let local_addr = listener.local_addr().map_err(StartupError::ListenerAddress)?;
        let state = AppState::new(
            self.deps.clone(),
            self.telemetry.clone(),
            &self.config,
            local_addr,
        )?;
        let gateway = InstrumentationGateway::for_mode(self.mode, &self.telemetry);

        tracing::info!(
            address = %local_addr,
            mode = %self.mode,
            tracing = gateway.is_tracing(),
            subrequest_target = %state.client.target(),
            "HTTP server starting"
        );
        Ok(build_router(state, &gateway, &self.config))
    }

    fn transition(&self, next: LifecyclePhase) {
        let previous = self.phase.send_replace(next);
        tracing::debug!(from = %previous, to = %next, "Lifecycle phase changed");
    }
}

/// Drain the listener. A serve error or a deadline overrun is this
/// participant's failure; on overrun the serve task is aborted.
async fn stop_listener(
    shutdown: &Shutdown,
    mut server: JoinHandle<io::Result<()>>,
    finished: Option<ServeOutcome>,
    deadline: Instant,
) -> Result<(), ParticipantFailure> {
    shutdown.trigger();

    let outcome = match finished {
        Some(outcome) => outcome,
        None => match timeout_at(deadline, &mut server).await {
            Ok(outcome) => outcome,
            Err(_) => {
                server.abort();
                let _ = server.await;
                tracing::warn!("Listener drain overran the deadline, connections aborted");
                return Err(ParticipantFailure::DeadlineExceeded(Participant::Listener));
            }
        },
    };

    match outcome {
        Ok(Ok(())) => {
            tracing::info!("HTTP server stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(ParticipantFailure::Serve(e)),
        Err(e) => Err(ParticipantFailure::ServeTask(e)),
    }
}

async fn release_observability(
    observability: Observability,
    deadline: Instant,
) -> Result<(), ParticipantFailure> {
    match timeout_at(deadline, observability.release()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ParticipantFailure::Telemetry(e)),
        Err(_) => Err(ParticipantFailure::DeadlineExceeded(Participant::Telemetry)),
    }
}
