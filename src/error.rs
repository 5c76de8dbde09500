//! Error types
//!
//! Failures are split by where they are absorbed:
//! - `CaptureError` / `TranscoderError` break the shared pipeline and are
//!   escalated to the orchestrator as a [`PipelineFailure`]
//! - `HubError` is local to one viewer session and never leaves the hub
//! - `Error` is what the public API returns

use std::fmt;
use std::io;

/// Result alias for the crate-wide error
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error
#[derive(Debug)]
pub enum Error {
    /// Socket or filesystem error outside the pipeline
    Io(io::Error),
    /// Capture source failed
    Capture(CaptureError),
    /// Transcoder process failed
    Transcoder(TranscoderError),
    /// Invalid static configuration
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Capture(e) => write!(f, "Capture failure: {}", e),
            Error::Transcoder(e) => write!(f, "Transcoder failure: {}", e),
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Capture(e) => Some(e),
            Error::Transcoder(e) => Some(e),
            Error::Config(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<CaptureError> for Error {
    fn from(e: CaptureError) -> Self {
        Error::Capture(e)
    }
}

impl From<TranscoderError> for Error {
    fn from(e: TranscoderError) -> Self {
        Error::Transcoder(e)
    }
}

/// Capture source errors
#[derive(Debug)]
pub enum CaptureError {
    /// Source could not be opened or configured
    Unavailable(String),
    /// Read from the device/process failed
    Io(io::Error),
    /// Source ended in the middle of a frame
    ShortFrame { expected: usize, got: usize },
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Unavailable(msg) => write!(f, "capture source unavailable: {}", msg),
            CaptureError::Io(e) => write!(f, "capture read failed: {}", e),
            CaptureError::ShortFrame { expected, got } => {
                write!(f, "short frame: expected {} bytes, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CaptureError {
    fn from(e: io::Error) -> Self {
        CaptureError::Io(e)
    }
}

/// Transcoder process errors
#[derive(Debug)]
pub enum TranscoderError {
    /// Process could not be spawned
    Spawn(io::Error),
    /// A stdio pipe was not available after spawn
    MissingPipe(&'static str),
    /// Writing raw frames to stdin failed (broken pipe, process gone)
    Write(io::Error),
    /// Reading compressed output from stdout failed
    Read(io::Error),
    /// Output ended while the pipeline was still running
    ExitedUnexpectedly(Option<i32>),
    /// Waiting for process exit failed
    Wait(io::Error),
}

impl fmt::Display for TranscoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscoderError::Spawn(e) => write!(f, "failed to spawn transcoder: {}", e),
            TranscoderError::MissingPipe(name) => write!(f, "transcoder {} not piped", name),
            TranscoderError::Write(e) => write!(f, "transcoder input broken: {}", e),
            TranscoderError::Read(e) => write!(f, "transcoder output broken: {}", e),
            TranscoderError::ExitedUnexpectedly(Some(code)) => {
                write!(f, "transcoder exited unexpectedly with code {}", code)
            }
            TranscoderError::ExitedUnexpectedly(None) => {
                write!(f, "transcoder exited unexpectedly")
            }
            TranscoderError::Wait(e) => write!(f, "failed to wait for transcoder: {}", e),
        }
    }
}

impl std::error::Error for TranscoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TranscoderError::Spawn(e)
            | TranscoderError::Write(e)
            | TranscoderError::Read(e)
            | TranscoderError::Wait(e) => Some(e),
            _ => None,
        }
    }
}

/// Broadcast hub errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Hub has been shut down and accepts no registrations
    Closed,
    /// Handshake could not be delivered to the new session
    HandshakeFailed,
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::Closed => write!(f, "hub is shut down"),
            HubError::HandshakeFailed => write!(f, "handshake send failed"),
        }
    }
}

impl std::error::Error for HubError {}

/// Reason the pipeline shut itself down without a stop request
#[derive(Debug)]
pub enum PipelineFailure {
    Capture(CaptureError),
    Transcoder(TranscoderError),
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineFailure::Capture(e) => write!(f, "capture failure: {}", e),
            PipelineFailure::Transcoder(e) => write!(f, "transcoder failure: {}", e),
        }
    }
}

impl std::error::Error for PipelineFailure {}

impl From<CaptureError> for PipelineFailure {
    fn from(e: CaptureError) -> Self {
        PipelineFailure::Capture(e)
    }
}

impl From<TranscoderError> for PipelineFailure {
    fn from(e: TranscoderError) -> Self {
        PipelineFailure::Transcoder(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(HubError::Closed.to_string(), "hub is shut down");

        let err = TranscoderError::ExitedUnexpectedly(Some(1));
        assert_eq!(err.to_string(), "transcoder exited unexpectedly with code 1");

        let err = CaptureError::ShortFrame {
            expected: 460800,
            got: 12,
        };
        assert_eq!(err.to_string(), "short frame: expected 460800 bytes, got 12");
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let io = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        let err = Error::from(TranscoderError::Write(io));
        let inner = err.source().unwrap();
        assert!(inner.source().is_some());

        assert!(Error::Config("bad".into()).source().is_none());
    }

    #[test]
    fn test_pipeline_failure_from() {
        let failure = PipelineFailure::from(TranscoderError::ExitedUnexpectedly(None));
        assert!(matches!(failure, PipelineFailure::Transcoder(_)));
        assert_eq!(
            failure.to_string(),
            "transcoder failure: transcoder exited unexpectedly"
        );
    }
}
