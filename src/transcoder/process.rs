//! Transcoder process lifecycle

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::config::TranscoderConfig;
use crate::capture::CaptureSettings;
use crate::error::TranscoderError;

/// Running transcoder process
///
/// Owns the child. Its stdin/stdout are handed out once as a
/// [`TranscoderSink`] and a [`TranscoderSource`].
pub struct Transcoder {
    child: Option<Child>,
    pid: Option<u32>,
    sink: Option<TranscoderSink>,
    source: Option<TranscoderSource>,
    stop_timeout: Duration,
}

impl Transcoder {
    /// Launch the process for the given capture settings
    pub fn start(
        config: &TranscoderConfig,
        settings: &CaptureSettings,
    ) -> Result<Self, TranscoderError> {
        let args = config.args(settings);

        tracing::info!(
            program = %config.program,
            resolution = %settings.resolution(),
            framerate = settings.framerate,
            "Spawning transcoder"
        );
        tracing::debug!(args = ?args, "Transcoder arguments");

        let mut child = Command::new(&config.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(TranscoderError::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or(TranscoderError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TranscoderError::MissingPipe("stdout"))?;

        let pid = child.id();
        tracing::debug!(pid = ?pid, "Transcoder running");

        Ok(Self {
            child: Some(child),
            pid,
            sink: Some(TranscoderSink { stdin }),
            source: Some(TranscoderSource {
                stdout,
                chunk_size: config.read_chunk_size.max(1),
            }),
            stop_timeout: config.stop_timeout,
        })
    }

    /// Take the input side (raw frames in)
    pub fn take_sink(&mut self) -> Option<TranscoderSink> {
        self.sink.take()
    }

    /// Take the output side (compressed chunks out)
    pub fn take_source(&mut self) -> Option<TranscoderSource> {
        self.source.take()
    }

    /// OS process ID
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Stop the process
    ///
    /// Closes stdin (if still held here), waits up to `stop_timeout` for the
    /// process to exit, then kills it. The output side is closed last. Calls
    /// after the first return `Ok(None)` without doing anything.
    pub async fn stop(&mut self) -> Result<Option<ExitStatus>, TranscoderError> {
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };

        drop(self.sink.take());

        tracing::info!(pid = ?self.pid, "Waiting for transcoder to exit");

        let status = match tokio::time::timeout(self.stop_timeout, child.wait()).await {
            Ok(result) => result.map_err(TranscoderError::Wait)?,
            Err(_) => {
                tracing::warn!(
                    pid = ?self.pid,
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "Transcoder did not exit in time, killing"
                );
                child.kill().await.map_err(TranscoderError::Wait)?;
                child.wait().await.map_err(TranscoderError::Wait)?
            }
        };

        drop(self.source.take());

        tracing::info!(pid = ?self.pid, status = %status, "Transcoder exited");
        Ok(Some(status))
    }
}

/// Input side of the transcoder
pub struct TranscoderSink {
    stdin: ChildStdin,
}

impl TranscoderSink {
    /// Write one raw frame
    pub async fn write(&mut self, frame: &[u8]) -> Result<(), TranscoderError> {
        self.stdin
            .write_all(frame)
            .await
            .map_err(TranscoderError::Write)
    }

    /// Flush and close stdin
    pub async fn close(mut self) -> Result<(), TranscoderError> {
        self.stdin.shutdown().await.map_err(TranscoderError::Write)
    }
}

/// Output side of the transcoder
pub struct TranscoderSource {
    stdout: ChildStdout,
    chunk_size: usize,
}

impl TranscoderSource {
    /// Read the next chunk of compressed output
    ///
    /// Returns `Ok(None)` once the process has closed its output.
    pub async fn read_chunk(&mut self) -> Result<Option<Bytes>, TranscoderError> {
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        let n = self
            .stdout
            .read_buf(&mut buf)
            .await
            .map_err(TranscoderError::Read)?;

        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(buf.freeze()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough() -> TranscoderConfig {
        TranscoderConfig::custom("cat", vec![]).stop_timeout(Duration::from_secs(2))
    }

    async fn read_all(source: &mut TranscoderSource) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = source.read_chunk().await.unwrap() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    #[tokio::test]
    async fn test_passthrough_roundtrip() {
        let mut transcoder = Transcoder::start(&passthrough(), &CaptureSettings::default()).unwrap();
        assert!(transcoder.pid().is_some());

        let mut sink = transcoder.take_sink().unwrap();
        let mut source = transcoder.take_source().unwrap();

        sink.write(b"frame-1").await.unwrap();
        sink.write(b"frame-2").await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(read_all(&mut source).await, b"frame-1frame-2");

        let status = transcoder.stop().await.unwrap().unwrap();
        assert!(status.success());
        assert!(transcoder.stop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chunks_bounded_by_read_size() {
        let config = passthrough().read_chunk_size(4);
        let mut transcoder = Transcoder::start(&config, &CaptureSettings::default()).unwrap();
        let mut sink = transcoder.take_sink().unwrap();
        let mut source = transcoder.take_source().unwrap();

        sink.write(b"0123456789").await.unwrap();
        drop(sink);

        let mut total = 0;
        while let Some(chunk) = source.read_chunk().await.unwrap() {
            assert!(chunk.len() <= 4);
            total += chunk.len();
        }
        assert_eq!(total, 10);

        transcoder.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_closes_input() {
        // Sink never taken: stop() must close stdin itself or cat never exits
        let mut transcoder = Transcoder::start(&passthrough(), &CaptureSettings::default()).unwrap();

        let status = transcoder.stop().await.unwrap();
        assert!(status.unwrap().success());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut transcoder = Transcoder::start(&passthrough(), &CaptureSettings::default()).unwrap();

        assert!(transcoder.stop().await.unwrap().is_some());
        assert!(transcoder.stop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stop_kills_after_timeout() {
        // Ignores stdin, so closing input never ends it
        let config = TranscoderConfig::custom("sleep", vec!["30".into()])
            .stop_timeout(Duration::from_millis(100));
        let mut transcoder = Transcoder::start(&config, &CaptureSettings::default()).unwrap();

        let started = std::time::Instant::now();
        let status = transcoder.stop().await.unwrap().unwrap();

        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let config = TranscoderConfig::custom("/nonexistent/transcoder", vec![]);

        let result = Transcoder::start(&config, &CaptureSettings::default());
        assert!(matches!(result, Err(TranscoderError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_write_after_exit_fails() {
        let config = TranscoderConfig::custom("true", vec![]);
        let mut transcoder = Transcoder::start(&config, &CaptureSettings::default()).unwrap();
        let mut sink = transcoder.take_sink().unwrap();

        // Let the process exit and its stdin close
        tokio::time::sleep(Duration::from_millis(200)).await;

        let frame = vec![0u8; 256 * 1024];
        let result = sink.write(&frame).await;
        assert!(matches!(result, Err(TranscoderError::Write(_))));

        transcoder.stop().await.unwrap();
    }
}
