//! Synthetic test-pattern source
//!
//! Produces yuv420p frames with a vertical luma gradient and a bright bar
//! that sweeps left to right, so orientation and frame order are visible in
//! the decoded stream without any camera attached.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::time::{Interval, MissedTickBehavior};

use super::{CaptureSettings, CaptureSource};
use crate::error::CaptureError;

const BAR_WIDTH: usize = 16;
const BAR_STEP: usize = 4;
const BAR_LUMA: u8 = 235;
const CHROMA_NEUTRAL: u8 = 128;

/// Test-pattern capture source
pub struct TestPattern {
    settings: Option<CaptureSettings>,
    paced: bool,
    ticker: Option<Interval>,
    frame_limit: Option<u64>,
    frames_produced: u64,
}

impl TestPattern {
    /// Endless pattern paced at the configured framerate
    pub fn new() -> Self {
        Self {
            settings: None,
            paced: true,
            ticker: None,
            frame_limit: None,
            frames_produced: 0,
        }
    }

    /// End the source after `limit` frames
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Produce frames as fast as they are pulled
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Number of frames produced so far
    pub fn frames_produced(&self) -> u64 {
        self.frames_produced
    }

    fn render(settings: &CaptureSettings, index: u64) -> Bytes {
        let width = settings.width as usize;
        let height = settings.height as usize;
        let mut buf = BytesMut::with_capacity(settings.frame_size());

        let bar_start = (index as usize * BAR_STEP) % width.max(1);

        for row in 0..height {
            let src_row = if settings.orientation.vflip {
                height - 1 - row
            } else {
                row
            };
            let gradient = 16 + (src_row * 200 / height.max(1)) as u8;

            for col in 0..width {
                let src_col = if settings.orientation.hflip {
                    width - 1 - col
                } else {
                    col
                };
                let in_bar = src_col >= bar_start && src_col < bar_start + BAR_WIDTH;
                buf.put_u8(if in_bar { BAR_LUMA } else { gradient });
            }
        }

        // U and V planes, quarter size each
        buf.put_bytes(CHROMA_NEUTRAL, width * height / 2);

        buf.freeze()
    }
}

impl Default for TestPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for TestPattern {
    fn configure(&mut self, settings: &CaptureSettings) -> Result<(), CaptureError> {
        if settings.width == 0 || settings.height == 0 || settings.framerate == 0 {
            return Err(CaptureError::Unavailable(format!(
                "unsupported mode {}@{}",
                settings.resolution(),
                settings.framerate
            )));
        }

        tracing::debug!(
            resolution = %settings.resolution(),
            framerate = settings.framerate,
            hflip = settings.orientation.hflip,
            vflip = settings.orientation.vflip,
            "Test pattern configured"
        );

        self.settings = Some(settings.clone());
        self.ticker = None;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Bytes>, CaptureError> {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| CaptureError::Unavailable("test pattern not configured".into()))?;

        if let Some(limit) = self.frame_limit {
            if self.frames_produced >= limit {
                return Ok(None);
            }
        }

        if self.paced {
            let framerate = settings.framerate;
            let ticker = self.ticker.get_or_insert_with(|| {
                let mut ticker =
                    tokio::time::interval(Duration::from_secs(1) / framerate.max(1));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                ticker
            });
            ticker.tick().await;
        } else {
            // Let the consumer and the rest of the runtime make progress
            tokio::task::yield_now().await;
        }

        let frame = Self::render(settings, self.frames_produced);
        self.frames_produced += 1;

        Ok(Some(frame))
    }
}
