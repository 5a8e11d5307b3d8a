//! Traced user service library.
//!
//! A small user directory over HTTP whose request path can run bare or fully
//! instrumented, selected once per process through `MODE`.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod persistence;
pub mod service;

pub use config::{AppConfig, Mode};
pub use http::{AppState, Dependencies};
pub use lifecycle::{LifecycleController, LifecycleError, LifecyclePhase, Shutdown, ShutdownError};
pub use observability::{Observability, Telemetry};
