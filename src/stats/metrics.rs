//! Statistics for the pipeline and the broadcast hub

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Pipeline-level statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Raw frames pulled from the capture source
    pub frames_captured: u64,
    /// Raw frames written to the transcoder
    pub frames_written: u64,
    /// Raw frames discarded because the transcoder input was full
    pub frames_dropped: u64,
    /// Compressed chunks read from the transcoder
    pub chunks_forwarded: u64,
    /// Compressed bytes read from the transcoder
    pub bytes_forwarded: u64,
    /// Time since the pipeline started
    pub uptime: Duration,
    /// Output bitrate estimate (bits/sec)
    pub bitrate: u64,
}

impl PipelineStats {
    /// Calculate bitrate from forwarded bytes and uptime
    pub fn calculate_bitrate(&mut self) {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            self.bitrate = (self.bytes_forwarded * 8) / secs;
        }
    }
}

/// Live counters updated by the pipeline tasks
#[derive(Debug)]
pub struct PipelineCounters {
    started_at: Instant,
    frames_captured: AtomicU64,
    frames_written: AtomicU64,
    frames_dropped: AtomicU64,
    chunks_forwarded: AtomicU64,
    bytes_forwarded: AtomicU64,
}

impl PipelineCounters {
    /// Start counting from now
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_captured: AtomicU64::new(0),
            frames_written: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            chunks_forwarded: AtomicU64::new(0),
            bytes_forwarded: AtomicU64::new(0),
        }
    }

    /// Count a frame pulled from the capture source
    pub fn record_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a frame written to the transcoder
    pub fn record_written(&self) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a dropped frame; returns the new dropped total
    pub fn record_dropped(&self) -> u64 {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count a chunk read from the transcoder
    pub fn record_forwarded(&self, bytes: usize) {
        self.chunks_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Take a snapshot
    pub fn snapshot(&self) -> PipelineStats {
        let mut stats = PipelineStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            chunks_forwarded: self.chunks_forwarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
            bitrate: 0,
        };
        stats.calculate_bitrate();
        stats
    }
}

impl Default for PipelineCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Hub-level statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Sessions currently receiving the stream
    pub active_sessions: usize,
    /// Sessions that completed registration
    pub sessions_registered: u64,
    /// Sessions removed after a failed or timed-out send
    pub sessions_dropped: u64,
    /// Sessions discarded because the handshake could not be sent
    pub handshakes_failed: u64,
    /// Chunks passed to `broadcast`
    pub chunks_broadcast: u64,
    /// Bytes passed to `broadcast`
    pub bytes_broadcast: u64,
}

/// Live hub counters
#[derive(Debug, Default)]
pub struct HubCounters {
    sessions_registered: AtomicU64,
    sessions_dropped: AtomicU64,
    handshakes_failed: AtomicU64,
    chunks_broadcast: AtomicU64,
    bytes_broadcast: AtomicU64,
}

impl HubCounters {
    /// Count a completed registration
    pub fn record_registered(&self) {
        self.sessions_registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a session removed after a failed send
    pub fn record_dropped(&self) {
        self.sessions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a session discarded at handshake
    pub fn record_handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a chunk handed to `broadcast`
    pub fn record_broadcast(&self, bytes: usize) {
        self.chunks_broadcast.fetch_add(1, Ordering::Relaxed);
        self.bytes_broadcast.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Take a snapshot; the active count comes from the session set
    pub fn snapshot(&self, active_sessions: usize) -> HubStats {
        HubStats {
            active_sessions,
            sessions_registered: self.sessions_registered.load(Ordering::Relaxed),
            sessions_dropped: self.sessions_dropped.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            chunks_broadcast: self.chunks_broadcast.load(Ordering::Relaxed),
            bytes_broadcast: self.bytes_broadcast.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stats_calculate_bitrate() {
        let mut stats = PipelineStats {
            bytes_forwarded: 1_000_000,
            uptime: Duration::from_secs(10),
            ..Default::default()
        };

        stats.calculate_bitrate();

        // 1,000,000 bytes * 8 bits / 10 seconds
        assert_eq!(stats.bitrate, 800_000);
    }

    #[test]
    fn test_pipeline_stats_zero_uptime() {
        let mut stats = PipelineStats {
            bytes_forwarded: 1_000_000,
            ..Default::default()
        };

        stats.calculate_bitrate();

        assert_eq!(stats.bitrate, 0);
    }

    #[test]
    fn test_pipeline_counters() {
        let counters = PipelineCounters::new();

        counters.record_captured();
        counters.record_captured();
        counters.record_written();
        assert_eq!(counters.record_dropped(), 1);
        counters.record_forwarded(512);
        counters.record_forwarded(100);

        let stats = counters.snapshot();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.frames_written, 1);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.chunks_forwarded, 2);
        assert_eq!(stats.bytes_forwarded, 612);
    }

    #[test]
    fn test_hub_counters_snapshot() {
        let counters = HubCounters::default();

        counters.record_registered();
        counters.record_registered();
        counters.record_dropped();
        counters.record_handshake_failed();
        counters.record_broadcast(10);

        assert_eq!(
            counters.snapshot(1),
            HubStats {
                active_sessions: 1,
                sessions_registered: 2,
                sessions_dropped: 1,
                handshakes_failed: 1,
                chunks_broadcast: 1,
                bytes_broadcast: 10,
            }
        );
    }
}
