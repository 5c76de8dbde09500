//! Orchestrator
//!
//! Wires capture → transcoder → hub, runs both listeners, and owns the
//! ordered teardown.
//!
//! ```text
//!  [capture task] ──frames──► [writer task] ──stdin──► transcoder ──stdout──► [forward task] ──► hub
//!                  (bounded)                                                                    │
//!                                                           [stream listener] ◄── sessions ─────┘
//!                                                           [http listener]
//! ```
//!
//! Teardown order: capture, writer (closes stdin), transcoder exit, forward
//! task drains the remaining output, hub shutdown, listeners. Every wait is
//! bounded by `shutdown_timeout`; tasks still running past it are aborted.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::state::{LifecycleState, ShutdownTrigger, StateCell};
use crate::capture::{CaptureSettings, CaptureSource};
use crate::error::{PipelineFailure, Result, TranscoderError};
use crate::hub::BroadcastHub;
use crate::protocol::StreamHandshake;
use crate::server::{BackpressurePolicy, ServerConfig, StaticAssetServer, StreamServer};
use crate::stats::{HubStats, PipelineCounters, PipelineStats};
use crate::transcoder::{Transcoder, TranscoderSink, TranscoderSource};

/// Builds and starts the server
pub struct Orchestrator {
    config: ServerConfig,
    state: StateCell,
    trigger: ShutdownTrigger,
}

impl Orchestrator {
    /// Create an orchestrator for a validated configuration
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            state: StateCell::new(),
            trigger: ShutdownTrigger::new(),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Stop handle, usable before `start` (e.g. for a signal listener)
    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Start everything
    ///
    /// On error, whatever was already acquired is released and the state
    /// ends `Stopped`.
    pub async fn start<C: CaptureSource>(self, mut capture: C) -> Result<ServerHandle> {
        let Orchestrator {
            config,
            state,
            trigger,
        } = self;

        let prepared = match prepare(&config, &mut capture).await {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::error!(error = %e, "Startup failed");
                capture.close();
                state.transition(LifecycleState::Stopped);
                return Err(e);
            }
        };

        let Prepared {
            stream_listener,
            http_listener,
            stream_addr,
            http_addr,
            transcoder,
            sink,
            source,
        } = prepared;
        let transcoder_pid = transcoder.pid();

        let settings = &config.capture;
        let hub = Arc::new(BroadcastHub::with_config(
            StreamHandshake::new(settings.width, settings.height),
            config.hub.clone(),
        ));
        let counters = Arc::new(PipelineCounters::new());
        let listeners_stop = ShutdownTrigger::new();
        let (failure_tx, failure_rx) = mpsc::channel::<PipelineFailure>(4);

        // Listeners
        let stream_task = {
            let server = StreamServer::new(&config, Arc::clone(&hub));
            let stop = listeners_stop.clone();
            tokio::spawn(async move {
                server
                    .run_until(stream_listener, async move { stop.requested().await })
                    .await;
            })
        };

        let http_task = {
            let server = StaticAssetServer::new(&config, stream_addr);
            let stop = listeners_stop.clone();
            tokio::spawn(async move {
                if let Err(e) = server
                    .serve(http_listener, async move { stop.requested().await })
                    .await
                {
                    tracing::error!(error = %e, "HTTP server failed");
                }
            })
        };

        // Pipeline
        let (frame_tx, frame_rx) = mpsc::channel::<Bytes>(config.frame_queue);

        let forward_task = tokio::spawn(forward_loop(
            source,
            Arc::clone(&hub),
            trigger.clone(),
            failure_tx.clone(),
            Arc::clone(&counters),
        ));

        let writer_task = tokio::spawn(write_loop(
            sink,
            frame_rx,
            failure_tx.clone(),
            Arc::clone(&counters),
        ));

        let capture_task = tokio::spawn(capture_loop(
            capture,
            frame_tx,
            config.backpressure,
            trigger.clone(),
            failure_tx,
            Arc::clone(&counters),
        ));

        let failure = Arc::new(OnceLock::new());

        let supervisor = Supervisor {
            state: state.clone(),
            trigger: trigger.clone(),
            listeners_stop,
            transcoder,
            hub: Arc::clone(&hub),
            capture_task,
            writer_task,
            forward_task,
            stream_task,
            http_task,
            shutdown_timeout: config.shutdown_timeout,
            failure: Arc::clone(&failure),
        };

        state.transition(LifecycleState::Running);
        tracing::info!(
            http = %http_addr,
            stream = %stream_addr,
            resolution = %settings.resolution(),
            framerate = settings.framerate,
            "Video stream available"
        );

        tokio::spawn(supervisor.run(failure_rx));

        Ok(ServerHandle {
            state,
            trigger,
            hub,
            counters,
            http_addr,
            stream_addr,
            transcoder_pid,
            failure,
        })
    }
}

struct Prepared {
    stream_listener: TcpListener,
    http_listener: TcpListener,
    stream_addr: SocketAddr,
    http_addr: SocketAddr,
    transcoder: Transcoder,
    sink: TranscoderSink,
    source: TranscoderSource,
}

async fn prepare<C: CaptureSource>(config: &ServerConfig, capture: &mut C) -> Result<Prepared> {
    let settings: &CaptureSettings = &config.capture;

    tracing::info!(
        resolution = %settings.resolution(),
        framerate = settings.framerate,
        hflip = settings.orientation.hflip,
        vflip = settings.orientation.vflip,
        "Initializing camera"
    );
    capture.configure(settings)?;

    if !config.warmup.is_zero() {
        tokio::time::sleep(config.warmup).await;
    }
    tracing::info!("Camera ready");

    let stream_listener = TcpListener::bind(config.stream_addr).await?;
    let http_listener = TcpListener::bind(config.http_addr).await?;
    let stream_addr = stream_listener.local_addr()?;
    let http_addr = http_listener.local_addr()?;

    let mut transcoder = Transcoder::start(&config.transcoder, settings)?;
    let sink = transcoder
        .take_sink()
        .ok_or(TranscoderError::MissingPipe("stdin"))?;
    let source = transcoder
        .take_source()
        .ok_or(TranscoderError::MissingPipe("stdout"))?;

    Ok(Prepared {
        stream_listener,
        http_listener,
        stream_addr,
        http_addr,
        transcoder,
        sink,
        source,
    })
}

/// Pull frames from the capture source into the bounded frame queue
async fn capture_loop<C: CaptureSource>(
    mut capture: C,
    frames: mpsc::Sender<Bytes>,
    policy: BackpressurePolicy,
    trigger: ShutdownTrigger,
    failures: mpsc::Sender<PipelineFailure>,
    counters: Arc<PipelineCounters>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = trigger.requested() => break,
            next = capture.next_frame() => next,
        };

        match next {
            Ok(Some(frame)) => {
                counters.record_captured();

                match policy {
                    BackpressurePolicy::Block => {
                        let sent = tokio::select! {
                            biased;
                            _ = trigger.requested() => break,
                            sent = frames.send(frame) => sent,
                        };
                        // Writer gone; it reports its own failure
                        if sent.is_err() {
                            break;
                        }
                    }
                    BackpressurePolicy::DropFrames => match frames.try_send(frame) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            let dropped = counters.record_dropped();
                            if dropped == 1 || dropped % 100 == 0 {
                                tracing::warn!(dropped = dropped, "Transcoder input full, dropping frames");
                            }
                        }
                        Err(TrySendError::Closed(_)) => break,
                    },
                }
            }
            Ok(None) => {
                tracing::info!("Capture source ended");
                trigger.request_stop();
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Capture failed");
                let _ = failures.send(PipelineFailure::Capture(e)).await;
                break;
            }
        }
    }

    capture.close();
    tracing::debug!("Capture loop finished");
}

/// Feed queued frames to the transcoder, then close its input
async fn write_loop(
    mut sink: TranscoderSink,
    mut frames: mpsc::Receiver<Bytes>,
    failures: mpsc::Sender<PipelineFailure>,
    counters: Arc<PipelineCounters>,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = sink.write(&frame).await {
            tracing::error!(error = %e, "Transcoder write failed");
            let _ = failures.send(PipelineFailure::Transcoder(e)).await;
            return;
        }
        counters.record_written();
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "Closing transcoder input failed");
    }
    tracing::debug!("Transcoder input closed");
}

/// Broadcast transcoder output until it ends
async fn forward_loop(
    mut source: TranscoderSource,
    hub: Arc<BroadcastHub>,
    trigger: ShutdownTrigger,
    failures: mpsc::Sender<PipelineFailure>,
    counters: Arc<PipelineCounters>,
) {
    loop {
        match source.read_chunk().await {
            Ok(Some(chunk)) => {
                counters.record_forwarded(chunk.len());
                hub.broadcast(chunk).await;
            }
            Ok(None) => {
                if trigger.is_requested() {
                    tracing::debug!("Transcoder output drained");
                } else {
                    tracing::error!("Transcoder output ended while running");
                    let failure = TranscoderError::ExitedUnexpectedly(None);
                    let _ = failures.send(failure.into()).await;
                }
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Transcoder read failed");
                let _ = failures.send(PipelineFailure::Transcoder(e)).await;
                break;
            }
        }
    }
}

async fn join_bounded(task: &'static str, handle: JoinHandle<()>, timeout: Duration) {
    let abort = handle.abort_handle();

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => tracing::debug!(task = task, "Task finished"),
        Ok(Err(e)) => tracing::warn!(task = task, error = %e, "Task panicked or was cancelled"),
        Err(_) => {
            tracing::warn!(
                task = task,
                timeout_ms = timeout.as_millis() as u64,
                "Task did not finish in time, aborting"
            );
            abort.abort();
        }
    }
}

/// Owns everything that must be torn down, and tears it down
struct Supervisor {
    state: StateCell,
    trigger: ShutdownTrigger,
    listeners_stop: ShutdownTrigger,
    transcoder: Transcoder,
    hub: Arc<BroadcastHub>,
    capture_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
    forward_task: JoinHandle<()>,
    stream_task: JoinHandle<()>,
    http_task: JoinHandle<()>,
    shutdown_timeout: Duration,
    failure: Arc<OnceLock<Arc<PipelineFailure>>>,
}

impl Supervisor {
    async fn run(self, mut failures: mpsc::Receiver<PipelineFailure>) {
        let failure = tokio::select! {
            _ = self.trigger.requested() => None,
            Some(failure) = failures.recv() => Some(failure),
        };

        match &failure {
            Some(failure) => {
                tracing::error!(error = %failure, "Pipeline failure, shutting down");
                self.trigger.request_stop();
            }
            None => tracing::info!("Stop requested"),
        }

        self.shutdown(failure).await;
    }

    async fn shutdown(mut self, failure: Option<PipelineFailure>) {
        self.state.transition(LifecycleState::Stopping);
        let timeout = self.shutdown_timeout;

        tracing::info!("Stopping capture");
        join_bounded("capture", self.capture_task, timeout).await;
        join_bounded("transcoder-writer", self.writer_task, timeout).await;

        tracing::info!("Waiting for transcoder to finish");
        let exit_code = match self.transcoder.stop().await {
            Ok(status) => status.and_then(|status| status.code()),
            Err(e) => {
                tracing::warn!(error = %e, "Transcoder stop failed");
                None
            }
        };
        join_bounded("forward", self.forward_task, timeout).await;

        // Recorded before `Stopped` so waiters always see it
        if let Some(failure) = failure {
            let _ = self.failure.set(Arc::new(with_exit_code(failure, exit_code)));
        }

        self.hub.shutdown().await;

        tracing::info!("Shutting down listeners");
        self.listeners_stop.request_stop();
        join_bounded("stream-listener", self.stream_task, timeout).await;
        join_bounded("http-listener", self.http_task, timeout).await;

        self.state.transition(LifecycleState::Stopped);
    }
}

/// Attach the collected exit code to an unexpected transcoder exit
fn with_exit_code(failure: PipelineFailure, exit_code: Option<i32>) -> PipelineFailure {
    match failure {
        PipelineFailure::Transcoder(TranscoderError::ExitedUnexpectedly(None)) => {
            PipelineFailure::Transcoder(TranscoderError::ExitedUnexpectedly(exit_code))
        }
        other => other,
    }
}

/// Handle to a running server
///
/// Dropping the handle does not stop the server; call [`ServerHandle::stop`]
/// or use the [`ShutdownTrigger`].
pub struct ServerHandle {
    state: StateCell,
    trigger: ShutdownTrigger,
    hub: Arc<BroadcastHub>,
    counters: Arc<PipelineCounters>,
    http_addr: SocketAddr,
    stream_addr: SocketAddr,
    transcoder_pid: Option<u32>,
    failure: Arc<OnceLock<Arc<PipelineFailure>>>,
}

impl ServerHandle {
    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Stop handle
    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Request a stop and wait until everything is released
    ///
    /// Safe to call repeatedly; later calls just wait for (or observe) the
    /// same `Stopped` state.
    pub async fn stop(&self) -> Option<Arc<PipelineFailure>> {
        self.trigger.request_stop();
        self.wait().await
    }

    /// Wait until stopped
    ///
    /// Returns the pipeline failure that caused the stop, if any.
    pub async fn wait(&self) -> Option<Arc<PipelineFailure>> {
        self.state.wait_for(LifecycleState::Stopped).await;
        self.failure.get().cloned()
    }

    /// Bound HTTP address
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Bound streaming address
    pub fn stream_addr(&self) -> SocketAddr {
        self.stream_addr
    }

    /// URL of the viewer page
    pub fn http_url(&self) -> String {
        format!("http://{}/", self.http_addr)
    }

    /// The broadcast hub
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// PID of the transcoder process
    pub fn transcoder_pid(&self) -> Option<u32> {
        self.transcoder_pid
    }

    /// Pipeline statistics
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Hub statistics
    pub async fn hub_stats(&self) -> HubStats {
        self.hub.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TestPattern;
    use crate::error::{CaptureError, Error};
    use crate::transcoder::TranscoderConfig;

    fn local_config() -> ServerConfig {
        ServerConfig::default()
            .resolution(32, 16)
            .framerate(50)
            .http_addr("127.0.0.1:0".parse().unwrap())
            .stream_addr("127.0.0.1:0".parse().unwrap())
            .transcoder(TranscoderConfig::custom("cat", vec![]).stop_timeout(Duration::from_secs(2)))
            .shutdown_timeout(Duration::from_secs(2))
    }

    struct FailingCapture {
        fail_configure: bool,
    }

    impl CaptureSource for FailingCapture {
        fn configure(&mut self, _settings: &CaptureSettings) -> std::result::Result<(), CaptureError> {
            if self.fail_configure {
                Err(CaptureError::Unavailable("no camera".into()))
            } else {
                Ok(())
            }
        }

        async fn next_frame(&mut self) -> std::result::Result<Option<Bytes>, CaptureError> {
            Err(CaptureError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "sensor timeout",
            )))
        }
    }

    /// Never produces a frame
    struct IdleCapture;

    impl CaptureSource for IdleCapture {
        fn configure(&mut self, _settings: &CaptureSettings) -> std::result::Result<(), CaptureError> {
            Ok(())
        }

        async fn next_frame(&mut self) -> std::result::Result<Option<Bytes>, CaptureError> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_new_validates_config() {
        let result = Orchestrator::new(ServerConfig::default().framerate(0));

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_new_rejects_zero_frame_queue() {
        let config = ServerConfig {
            frame_queue: 0,
            ..local_config()
        };

        assert!(matches!(Orchestrator::new(config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let orchestrator = Orchestrator::new(local_config()).unwrap();
        assert_eq!(orchestrator.state(), LifecycleState::Initializing);

        let handle = orchestrator.start(TestPattern::new()).await.unwrap();
        assert_eq!(handle.state(), LifecycleState::Running);
        assert_ne!(handle.http_addr().port(), 0);
        assert_ne!(handle.stream_addr().port(), 0);
        assert!(handle.transcoder_pid().is_some());

        let failure = tokio::time::timeout(Duration::from_secs(10), handle.stop())
            .await
            .unwrap();
        assert!(failure.is_none());
        assert_eq!(handle.state(), LifecycleState::Stopped);
        assert!(handle.hub().is_closed().await);
    }

    #[tokio::test]
    async fn test_stop_twice_is_noop() {
        let handle = Orchestrator::new(local_config())
            .unwrap()
            .start(TestPattern::new())
            .await
            .unwrap();

        handle.stop().await;
        let second = tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .unwrap();

        assert!(second.is_none());
        assert_eq!(handle.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_finite_source_stops_cleanly() {
        let config = local_config().backpressure(BackpressurePolicy::Block);
        let handle = Orchestrator::new(config)
            .unwrap()
            .start(TestPattern::new().unpaced().with_frame_limit(10))
            .await
            .unwrap();

        let failure = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap();
        assert!(failure.is_none());

        let stats = handle.stats();
        assert_eq!(stats.frames_captured, 10);
        assert_eq!(stats.frames_written, 10);
        assert_eq!(stats.frames_dropped, 0);
        // cat passes every byte through
        assert_eq!(stats.bytes_forwarded, 10 * 32 * 16 * 3 / 2);
    }

    #[tokio::test]
    async fn test_capture_error_triggers_shutdown() {
        let handle = Orchestrator::new(local_config())
            .unwrap()
            .start(FailingCapture {
                fail_configure: false,
            })
            .await
            .unwrap();

        let failure = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap();

        assert!(matches!(
            failure.as_deref(),
            Some(PipelineFailure::Capture(CaptureError::Io(_)))
        ));
        assert_eq!(handle.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_capture_unavailable_aborts_startup() {
        let result = Orchestrator::new(local_config())
            .unwrap()
            .start(FailingCapture {
                fail_configure: true,
            })
            .await;

        assert!(matches!(result, Err(Error::Capture(CaptureError::Unavailable(_)))));
    }

    #[tokio::test]
    async fn test_transcoder_spawn_failure_aborts_startup() {
        let config = local_config().transcoder(TranscoderConfig::custom("/nonexistent/ffmpeg", vec![]));

        let result = Orchestrator::new(config)
            .unwrap()
            .start(TestPattern::new())
            .await;

        assert!(matches!(result, Err(Error::Transcoder(TranscoderError::Spawn(_)))));
    }

    #[tokio::test]
    async fn test_transcoder_exit_is_failure() {
        // Exits right away without reading input
        let config = local_config().transcoder(TranscoderConfig::custom("true", vec![]));
        let handle = Orchestrator::new(config)
            .unwrap()
            .start(TestPattern::new())
            .await
            .unwrap();

        let failure = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap();

        assert!(matches!(failure.as_deref(), Some(PipelineFailure::Transcoder(_))));
    }

    #[tokio::test]
    async fn test_transcoder_exit_code_is_reported() {
        let config = local_config().transcoder(TranscoderConfig::custom(
            "sh",
            vec!["-c".into(), "exit 3".into()],
        ));
        let handle = Orchestrator::new(config)
            .unwrap()
            .start(IdleCapture)
            .await
            .unwrap();

        let failure = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap();

        assert!(matches!(
            failure.as_deref(),
            Some(PipelineFailure::Transcoder(TranscoderError::ExitedUnexpectedly(Some(3))))
        ));
        assert_eq!(
            failure.unwrap().to_string(),
            "transcoder failure: transcoder exited unexpectedly with code 3"
        );
    }

    #[test]
    fn test_exit_code_only_fills_unexpected_exit() {
        let filled = with_exit_code(TranscoderError::ExitedUnexpectedly(None).into(), Some(1));
        assert!(matches!(
            filled,
            PipelineFailure::Transcoder(TranscoderError::ExitedUnexpectedly(Some(1)))
        ));

        let capture = with_exit_code(CaptureError::Unavailable("gone".into()).into(), Some(1));
        assert!(matches!(capture, PipelineFailure::Capture(_)));
    }

    #[tokio::test]
    async fn test_trigger_before_start_stops_immediately() {
        let orchestrator = Orchestrator::new(local_config()).unwrap();
        orchestrator.trigger().request_stop();

        let handle = orchestrator.start(TestPattern::new()).await.unwrap();
        let failure = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap();

        assert!(failure.is_none());
        assert_eq!(handle.state(), LifecycleState::Stopped);
    }
}
