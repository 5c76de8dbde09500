//! Network front ends
//!
//! - [`StreamServer`]: WebSocket listener delivering the hub's stream
//! - [`StaticAssetServer`]: HTTP listener for the viewer page and script

pub mod assets;
pub mod config;
pub mod http;
pub mod listener;

pub use assets::{render_template, StaticAssets};
pub use config::{BackpressurePolicy, ServerConfig, Theme};
pub use http::StaticAssetServer;
pub use listener::StreamServer;
