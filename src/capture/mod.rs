//! Capture sources
//!
//! A capture source produces raw yuv420p frames at a fixed resolution and
//! framerate. The orchestrator configures it once and then pulls frames in a
//! loop until it returns `None` (source ended) or an error.

pub mod command;
pub mod pattern;

use std::future::Future;

use bytes::Bytes;

use crate::error::CaptureError;

pub use command::CommandCapture;
pub use pattern::TestPattern;

/// Mirror flags, set according to how the camera is mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Orientation {
    /// Mirror left-right
    pub hflip: bool,
    /// Mirror top-bottom
    pub vflip: bool,
}

/// Resolution, rate and orientation requested from the capture source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Frame width in pixels
    pub width: u16,
    /// Frame height in pixels
    pub height: u16,
    /// Frames per second
    pub framerate: u32,
    /// Mirror flags
    pub orientation: Orientation,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            framerate: 24,
            // Camera board mounted upside down
            orientation: Orientation {
                hflip: false,
                vflip: true,
            },
        }
    }
}

impl CaptureSettings {
    /// Size in bytes of one yuv420p frame
    pub fn frame_size(&self) -> usize {
        let pixels = self.width as usize * self.height as usize;
        pixels + pixels / 2
    }

    /// Resolution as the `WxH` string transcoders expect
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Origin of raw video frames
///
/// `next_frame` may block until the next frame is available; the
/// orchestrator runs it on its own task.
pub trait CaptureSource: Send + 'static {
    /// Apply resolution/framerate/orientation and acquire the device
    fn configure(&mut self, settings: &CaptureSettings) -> Result<(), CaptureError>;

    /// Next raw frame, or `None` once the source has ended
    fn next_frame(&mut self) -> impl Future<Output = Result<Option<Bytes>, CaptureError>> + Send;

    /// Release the device
    fn close(&mut self) {}
}
