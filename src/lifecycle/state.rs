//! Lifecycle state machine and stop requests

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Server lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, nothing started yet
    Initializing,
    /// Pipeline and listeners running
    Running,
    /// Teardown in progress
    Stopping,
    /// Everything released
    Stopped,
}

impl LifecycleState {
    /// Whether `next` is a legal successor
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;

        matches!(
            (self, next),
            (Initializing, Running)
                | (Initializing, Stopped)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// Whether the server has finished
    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Stopped
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Initializing => "initializing",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Observable lifecycle state owned by the orchestrator
#[derive(Debug, Clone)]
pub(crate) struct StateCell {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Initializing);
        Self { tx: Arc::new(tx) }
    }

    pub(crate) fn get(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Move to `next` if legal; returns whether the state changed
    pub(crate) fn transition(&self, next: LifecycleState) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });

        if changed {
            tracing::info!(state = %next, "Lifecycle transition");
        }
        changed
    }

    /// Wait until `target` (or a later state) is reached
    pub(crate) async fn wait_for(&self, target: LifecycleState) {
        let mut rx = self.tx.subscribe();
        let _ = rx
            .wait_for(|state| *state == target || state.is_terminal())
            .await;
    }
}

/// Handle for requesting a stop
///
/// Cloneable and cheap; `request_stop` only flips a flag and wakes waiters,
/// so it is fine to call from a signal-handling task.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    /// Create a trigger with no stop requested
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop
    ///
    /// Returns true for the first request, false if one was already made.
    pub fn request_stop(&self) -> bool {
        self.tx.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        })
    }

    /// Whether a stop has been requested
    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once a stop has been requested
    pub async fn requested(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}
