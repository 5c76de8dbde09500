//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::capture::{CaptureSettings, Orientation};
use crate::error::{Error, Result};
use crate::hub::HubConfig;
use crate::protocol::constants::{DEFAULT_HTTP_PORT, DEFAULT_STREAM_PORT};
use crate::server::assets::StaticAssets;
use crate::transcoder::TranscoderConfig;

/// Colors substituted into the viewer page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Foreground color
    pub color: String,
    /// Page background color
    pub bgcolor: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            color: "#444".to_string(),
            bgcolor: "#333".to_string(),
        }
    }
}

/// What the capture task does when the transcoder input is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    /// Discard the new frame so capture stays real time
    #[default]
    DropFrames,
    /// Wait for room, slowing capture to the transcoder's pace
    Block,
}

/// Server configuration options
///
/// Built once at startup and handed to the orchestrator; nothing in it
/// changes while the server runs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Capture resolution, framerate and orientation
    pub capture: CaptureSettings,

    /// Address for the viewer page
    pub http_addr: SocketAddr,

    /// Address for the streaming (WebSocket) listener
    pub stream_addr: SocketAddr,

    /// Page colors
    pub theme: Theme,

    /// Transcoder process settings
    pub transcoder: TranscoderConfig,

    /// Fan-out settings
    pub hub: HubConfig,

    /// Capture behavior when the transcoder falls behind
    pub backpressure: BackpressurePolicy,

    /// Raw frames buffered between capture and the transcoder
    pub frame_queue: usize,

    /// Maximum concurrent viewer connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY on viewer sockets
    pub tcp_nodelay: bool,

    /// WebSocket upgrade must complete within this time
    pub handshake_timeout: Duration,

    /// Longest a single socket write to a viewer may take
    pub write_timeout: Duration,

    /// Bound on each wait during teardown
    pub shutdown_timeout: Duration,

    /// Pause after configuring the camera before streaming
    pub warmup: Duration,

    /// Viewer page template and client script
    pub assets: StaticAssets,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSettings::default(),
            http_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            stream_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_STREAM_PORT)),
            theme: Theme::default(),
            transcoder: TranscoderConfig::default(),
            hub: HubConfig::default(),
            backpressure: BackpressurePolicy::default(),
            frame_queue: 4,
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Important for low latency
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(5),
            warmup: Duration::ZERO,
            assets: StaticAssets::default(),
        }
    }
}

impl ServerConfig {
    /// Set the capture resolution
    pub fn resolution(mut self, width: u16, height: u16) -> Self {
        self.capture.width = width;
        self.capture.height = height;
        self
    }

    /// Set the capture framerate
    pub fn framerate(mut self, framerate: u32) -> Self {
        self.capture.framerate = framerate;
        self
    }

    /// Set the mirror flags
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.capture.orientation = orientation;
        self
    }

    /// Set the HTTP bind address
    pub fn http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    /// Set the streaming bind address
    pub fn stream_addr(mut self, addr: SocketAddr) -> Self {
        self.stream_addr = addr;
        self
    }

    /// Set the page colors
    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Set the transcoder configuration
    pub fn transcoder(mut self, transcoder: TranscoderConfig) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// Set the hub configuration
    pub fn hub(mut self, hub: HubConfig) -> Self {
        self.hub = hub;
        self
    }

    /// Set the backpressure policy
    pub fn backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }

    /// Set the raw frame queue length
    pub fn frame_queue(mut self, frames: usize) -> Self {
        self.frame_queue = frames.max(1);
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the teardown bound
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the camera warm-up delay
    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Set the page assets
    pub fn assets(mut self, assets: StaticAssets) -> Self {
        self.assets = assets;
        self
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(Error::Config(format!(
                "resolution {} has a zero dimension",
                self.capture.resolution()
            )));
        }
        if self.capture.framerate == 0 {
            return Err(Error::Config("framerate must be positive".into()));
        }
        if self.frame_queue == 0 {
            return Err(Error::Config("frame queue must hold at least one frame".into()));
        }
        if self.transcoder.read_chunk_size == 0 {
            return Err(Error::Config("read chunk size must be positive".into()));
        }
        if self.transcoder.program.is_empty() {
            return Err(Error::Config("transcoder program is empty".into()));
        }
        Ok(())
    }
}
