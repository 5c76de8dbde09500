//! Process termination signals
//!
//! Signals never run teardown themselves. Each one is turned into a
//! [`ShutdownTrigger::request_stop`] call; the orchestrator's supervisor task
//! does the actual work.

use std::io;

use tokio::task::JoinHandle;

use super::state::ShutdownTrigger;

/// Listener for SIGINT, SIGTERM, SIGHUP and SIGQUIT
#[cfg(unix)]
pub struct TerminationSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    /// Install the handlers
    pub fn new() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    /// Wait for the next signal; returns its name
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.hangup.recv() => "SIGHUP",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}

/// Listener for ctrl-c
#[cfg(not(unix))]
pub struct TerminationSignals {
    _private: (),
}

#[cfg(not(unix))]
impl TerminationSignals {
    /// Install the handler
    pub fn new() -> io::Result<Self> {
        Ok(Self { _private: () })
    }

    /// Wait for the next ctrl-c
    pub async fn recv(&mut self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    }
}

/// Wait for the first termination signal; returns its name
pub async fn wait_for_termination() -> io::Result<&'static str> {
    let mut signals = TerminationSignals::new()?;
    Ok(signals.recv().await)
}

/// Forward every termination signal to `trigger`
///
/// The first signal requests a stop; later ones are logged and ignored, so an
/// impatient second ctrl-c cannot re-enter teardown.
pub fn spawn_signal_listener(trigger: ShutdownTrigger) -> io::Result<JoinHandle<()>> {
    let mut signals = TerminationSignals::new()?;

    Ok(tokio::spawn(async move {
        loop {
            let name = signals.recv().await;

            if trigger.request_stop() {
                tracing::info!(
                    signal = name,
                    pid = std::process::id(),
                    "Termination signal received, stopping"
                );
            } else {
                tracing::warn!(signal = name, "Signal received while already stopping, ignored");
            }
        }
    }))
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    fn raise(signal: &str) {
        let status = std::process::Command::new("kill")
            .arg(format!("-{}", signal))
            .arg(std::process::id().to_string())
            .status()
            .unwrap();
        assert!(status.success());
    }

    // One test so raised signals never reach another test's listener
    #[tokio::test]
    async fn test_termination_signals() {
        let waiter = tokio::spawn(wait_for_termination());
        // Give the handlers time to install
        tokio::time::sleep(Duration::from_millis(50)).await;

        raise("QUIT");
        let name = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(name, "SIGQUIT");

        let trigger = ShutdownTrigger::new();
        let listener = spawn_signal_listener(trigger.clone()).unwrap();

        raise("HUP");
        tokio::time::timeout(Duration::from_secs(5), trigger.requested())
            .await
            .unwrap();
        assert!(trigger.is_requested());

        // A second signal is absorbed and the listener keeps running
        raise("HUP");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!listener.is_finished());
        assert!(!trigger.request_stop());

        listener.abort();
    }
}
