//! Traced user service.
//!
//! ```text
//!   MODE=plain|traced
//!        │
//!        ▼
//!   Observability::acquire ──▶ Telemetry handle
//!        │                          │
//!        ▼                          ▼
//!   TcpListener::bind        MemoryStore → UserService
//!        │                          │
//!        └──────▶ LifecycleController::run ◀── SIGINT / SIGTERM
//!                        │
//!                        ▼
//!         drain listener ∥ flush telemetry (one deadline)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use traced_user_service::config::load_config;
use traced_user_service::lifecycle::termination_signal;
use traced_user_service::observability::BootstrapError;
use traced_user_service::persistence::{MemoryStore, UserStore};
use traced_user_service::service::UserService;
use traced_user_service::{AppConfig, Dependencies, LifecycleController, Mode, Observability};

#[derive(Debug, Parser)]
#[command(name = "traced-user-service", version, about = "User directory with switchable tracing")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    let mode = Mode::from_env();
    let observability = match Observability::acquire(mode, &config.observability) {
        Ok(observability) => observability,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %mode,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        shutdown_timeout_secs = config.timeouts.shutdown_secs,
        "traced-user-service starting"
    );

    let store = Arc::new(MemoryStore::new());
    if let Err(e) = store.prepare().await {
        return abort(observability, BootstrapError::from(e)).await;
    }
    let telemetry = observability.telemetry();
    let deps = Dependencies {
        user_service: Arc::new(UserService::new(store, telemetry.clone())),
    };

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(source) => {
            let err = BootstrapError::Bind {
                address: config.listener.bind_address.clone(),
                source,
            };
            return abort(observability, err).await;
        }
    };

    let controller = LifecycleController::new(mode, deps, telemetry, config);
    match controller.run(listener, observability, termination_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Service terminated with errors");
            ExitCode::FAILURE
        }
    }
}

/// Report a fatal startup error after logging is up, then release telemetry.
async fn abort(observability: Observability, err: BootstrapError) -> ExitCode {
    tracing::error!(error = %err, "Startup failed");
    if let Err(e) = observability.release().await {
        tracing::warn!(error = %e, "Telemetry release failed");
    }
    ExitCode::FAILURE
}
