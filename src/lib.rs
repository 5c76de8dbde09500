//! camstream: live camera relay
//!
//! Raw frames from a camera are piped through an external transcoder
//! (ffmpeg by default) and the compressed output is fanned out to every
//! connected WebSocket viewer. A small HTTP server hands out the viewer page.
//!
//! ```text
//!  CaptureSource ──yuv420p──► Transcoder ──mpeg1──► BroadcastHub ──► viewer
//!                            (child proc)                       ├──► viewer
//!                                                               └──► viewer
//!  StaticAssetServer: /index.html, /jsmpg.js
//! ```
//!
//! # Example
//!
//! ```no_run
//! use camstream::{CommandCapture, Orchestrator, ServerConfig};
//!
//! # async fn run() -> camstream::Result<()> {
//! let orchestrator = Orchestrator::new(ServerConfig::default())?;
//! let handle = orchestrator.start(CommandCapture::new()).await?;
//!
//! camstream::lifecycle::spawn_signal_listener(handle.trigger())?;
//! println!("Open {}", handle.http_url());
//!
//! if let Some(failure) = handle.wait().await {
//!     eprintln!("stopped: {}", failure);
//! }
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod protocol;
pub mod server;
pub mod stats;
pub mod transcoder;

pub use capture::{CaptureSettings, CaptureSource, CommandCapture, Orientation, TestPattern};
pub use error::{CaptureError, Error, HubError, PipelineFailure, Result, TranscoderError};
pub use hub::{BroadcastHub, HubConfig, ViewerSession};
pub use lifecycle::{LifecycleState, Orchestrator, ServerHandle, ShutdownTrigger};
pub use protocol::StreamHandshake;
pub use server::{BackpressurePolicy, ServerConfig, StaticAssetServer, StreamServer, Theme};
pub use transcoder::TranscoderConfig;
