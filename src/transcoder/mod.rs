//! External transcoder
//!
//! The transcoder is a child process (ffmpeg by default) that reads raw
//! frames on stdin and writes compressed video on stdout. It is split into
//! three owned parts so each pipeline task holds exactly what it uses:
//!
//! ```text
//!   capture task ──► TranscoderSink ──stdin──► [process] ──stdout──► TranscoderSource ──► forward task
//!                                                  ▲
//!                                       Transcoder (owns Child, stop())
//! ```
//!
//! Dropping the sink closes stdin, which is how the process learns no more
//! input will arrive.

pub mod config;
pub mod process;

pub use config::TranscoderConfig;
pub use process::{Transcoder, TranscoderSink, TranscoderSource};
