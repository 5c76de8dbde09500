//! Transcoder configuration

use std::time::Duration;

use crate::capture::CaptureSettings;
use crate::protocol::constants::DEFAULT_READ_CHUNK_SIZE;

/// How to launch and drive the transcoder process
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// Program to execute
    pub program: String,

    /// Target video bitrate (encoder syntax, e.g. "800k")
    pub bitrate: String,

    /// Raw input pixel format
    pub pixel_format: String,

    /// Output container/codec format
    pub output_format: String,

    /// Maximum bytes per read from the process output
    pub read_chunk_size: usize,

    /// How long `stop()` waits for a clean exit before killing
    pub stop_timeout: Duration,

    /// Replaces the generated argument list when set
    pub args: Option<Vec<String>>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            bitrate: "800k".to_string(),
            pixel_format: "yuv420p".to_string(),
            output_format: "mpeg1video".to_string(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            stop_timeout: Duration::from_secs(5),
            args: None,
        }
    }
}

impl TranscoderConfig {
    /// Run `program` with exactly `args`
    pub fn custom(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args: Some(args),
            ..Default::default()
        }
    }

    /// Set the program path
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the target bitrate
    pub fn bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = bitrate.into();
        self
    }

    /// Set the read chunk size
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the stop timeout
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Command-line arguments for the given capture settings
    pub fn args(&self, settings: &CaptureSettings) -> Vec<String> {
        if let Some(ref args) = self.args {
            return args.clone();
        }

        let rate = format!("{:.1}", settings.framerate as f64);

        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-s".to_string(),
            settings.resolution(),
            "-r".to_string(),
            rate.clone(),
            "-i".to_string(),
            "-".to_string(),
            "-f".to_string(),
            self.output_format.clone(),
            "-b:v".to_string(),
            self.bitrate.clone(),
            "-r".to_string(),
            rate,
            "-".to_string(),
        ]
    }
}
