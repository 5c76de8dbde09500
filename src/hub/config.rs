//! Hub configuration

use std::time::Duration;

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Longest a single session may hold up a broadcast (or the handshake)
    pub send_timeout: Duration,

    /// Chunks buffered per session between the hub and its socket writer
    pub session_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(250),
            session_queue: 64,
        }
    }
}

impl HubConfig {
    /// Set the per-session send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the per-session queue length
    pub fn session_queue(mut self, chunks: usize) -> Self {
        self.session_queue = chunks.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.send_timeout, Duration::from_millis(250));
        assert_eq!(config.session_queue, 64);
    }

    #[test]
    fn test_session_queue_never_zero() {
        // mpsc::channel panics on zero capacity
        let config = HubConfig::default().session_queue(0);

        assert_eq!(config.session_queue, 1);
    }
}
