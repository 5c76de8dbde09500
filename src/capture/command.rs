//! Capture from an external camera command
//!
//! Spawns a process that writes raw yuv420p frames to stdout (by default
//! `libcamera-vid --codec yuv420 -o -`) and slices its output into
//! frame-sized chunks.

use std::process::Stdio;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use super::{CaptureSettings, CaptureSource};
use crate::error::CaptureError;

/// Default camera command on Raspberry Pi OS
pub const DEFAULT_CAMERA_PROGRAM: &str = "libcamera-vid";

/// Capture source backed by a child process
pub struct CommandCapture {
    program: String,
    args: Option<Vec<String>>,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    frame_size: usize,
}

impl CommandCapture {
    /// Use `libcamera-vid` with arguments derived from the capture settings
    pub fn new() -> Self {
        Self::with_program(DEFAULT_CAMERA_PROGRAM)
    }

    /// Use a different libcamera-compatible program
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: None,
            child: None,
            stdout: None,
            frame_size: 0,
        }
    }

    /// Run `program` with exactly `args`
    ///
    /// The command must emit yuv420p frames matching the configured
    /// resolution on stdout.
    pub fn with_args(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            args: Some(args),
            ..Self::with_program(program)
        }
    }

    /// Arguments passed to a libcamera-vid style program
    pub fn camera_args(settings: &CaptureSettings) -> Vec<String> {
        let mut args = vec![
            "--width".to_string(),
            settings.width.to_string(),
            "--height".to_string(),
            settings.height.to_string(),
            "--framerate".to_string(),
            settings.framerate.to_string(),
            "--codec".to_string(),
            "yuv420".to_string(),
            "--timeout".to_string(),
            "0".to_string(),
            "--nopreview".to_string(),
            "--flush".to_string(),
        ];

        if settings.orientation.hflip {
            args.push("--hflip".to_string());
        }
        if settings.orientation.vflip {
            args.push("--vflip".to_string());
        }

        args.push("-o".to_string());
        args.push("-".to_string());
        args
    }

    /// PID of the camera process, if running
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }
}

impl Default for CommandCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for CommandCapture {
    fn configure(&mut self, settings: &CaptureSettings) -> Result<(), CaptureError> {
        let args = self
            .args
            .clone()
            .unwrap_or_else(|| Self::camera_args(settings));

        tracing::info!(
            program = %self.program,
            resolution = %settings.resolution(),
            framerate = settings.framerate,
            "Starting camera process"
        );
        tracing::debug!(args = ?args, "Camera arguments");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::Unavailable(format!("{}: {}", self.program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Unavailable("camera stdout not piped".into()))?;

        self.frame_size = settings.frame_size();
        self.stdout = Some(stdout);
        self.child = Some(child);
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Bytes>, CaptureError> {
        let frame_size = self.frame_size;
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| CaptureError::Unavailable("camera not started".into()))?;

        let mut buf = BytesMut::zeroed(frame_size);
        let mut filled = 0;

        while filled < frame_size {
            let n = stdout.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        match filled {
            0 => Ok(None),
            n if n == frame_size => Ok(Some(buf.freeze())),
            got => Err(CaptureError::ShortFrame {
                expected: frame_size,
                got,
            }),
        }
    }

    fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            tracing::info!(pid = ?child.id(), "Stopping camera process");
            let _ = child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Orientation;

    fn tiny() -> CaptureSettings {
        CaptureSettings {
            width: 4,
            height: 2,
            framerate: 10,
            orientation: Orientation::default(),
        }
    }

    #[test]
    fn test_camera_args() {
        let settings = CaptureSettings::default();
        let args = CommandCapture::camera_args(&settings);

        assert!(args.windows(2).any(|w| w == ["--width", "640"]));
        assert!(args.windows(2).any(|w| w == ["--height", "480"]));
        assert!(args.windows(2).any(|w| w == ["--framerate", "24"]));
        assert!(args.contains(&"--vflip".to_string()));
        assert!(!args.contains(&"--hflip".to_string()));
        assert_eq!(&args[args.len() - 2..], ["-o", "-"]);
    }

    #[tokio::test]
    async fn test_reads_whole_frames() {
        // 4x2 yuv420p frame = 12 bytes; emit two frames
        let mut capture = CommandCapture::with_args(
            "sh",
            vec!["-c".into(), "printf 'AAAAAAAAAAAABBBBBBBBBBBB'".into()],
        );
        capture.configure(&tiny()).unwrap();

        let first = capture.next_frame().await.unwrap().unwrap();
        assert_eq!(&first[..], b"AAAAAAAAAAAA");

        let second = capture.next_frame().await.unwrap().unwrap();
        assert_eq!(&second[..], b"BBBBBBBBBBBB");

        assert!(capture.next_frame().await.unwrap().is_none());
        capture.close();
    }

    #[tokio::test]
    async fn test_short_frame_is_error() {
        let mut capture =
            CommandCapture::with_args("sh", vec!["-c".into(), "printf 'ABCDE'".into()]);
        capture.configure(&tiny()).unwrap();

        let result = capture.next_frame().await;
        assert!(matches!(
            result,
            Err(CaptureError::ShortFrame {
                expected: 12,
                got: 5
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let mut capture = CommandCapture::with_program("/nonexistent/camera-binary");

        let result = capture.configure(&tiny());
        assert!(matches!(result, Err(CaptureError::Unavailable(_))));
    }
}
