//! Server lifecycle
//!
//! ```text
//! Initializing ──start()──► Running ──stop / failure──► Stopping ──► Stopped
//!       │                                                              ▲
//!       └────────────────────── startup error ─────────────────────────┘
//! ```
//!
//! Only the orchestrator moves the state. Anything else (signal listener,
//! callers, pipeline tasks) can only ask for a stop through a
//! [`ShutdownTrigger`], which sets a flag and wakes the supervisor.

pub mod orchestrator;
pub mod signal;
pub mod state;

pub use orchestrator::{Orchestrator, ServerHandle};
pub use signal::{spawn_signal_listener, wait_for_termination, TerminationSignals};
pub use state::{LifecycleState, ShutdownTrigger};
