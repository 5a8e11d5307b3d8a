//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (controller.rs):
//!     Build state → Wrap routes → Serve on the pre-bound listener
//!
//! Termination (signals.rs):
//!     SIGTERM/SIGINT → controller leaves Serving
//!
//! Shutdown (controller.rs, shutdown.rs):
//!     Drain listener → release telemetry, one shared deadline → aggregate failures
//! ```

pub mod controller;
pub mod shutdown;
pub mod signals;

pub use controller::{LifecycleController, LifecycleError, LifecyclePhase, StartupError};
pub use shutdown::{Participant, ParticipantFailure, Shutdown, ShutdownError};
pub use signals::termination_signal;
