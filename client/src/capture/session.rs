use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::cadence::DEFAULT_FRAME_INTERVAL;
use super::send_cycle::SendCycle;
use super::{CaptureDevice, CaptureErrors, PreviewSink, VideoConstraints, VideoStream};
use crate::codecs::JpegEncoder;
use crate::transport::Channel;

/// Where the capture pipeline is. Attempt ids tie an acquisition result to
/// the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Acquiring { attempt: u64 },
    Streaming { attempt: u64 },
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct CaptureSettings {
    pub constraints: VideoConstraints,
    pub frame_interval: Duration,
    pub encoder: JpegEncoder,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            constraints: VideoConstraints::default(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            encoder: JpegEncoder::default(),
        }
    }
}

/// A pending device request, detached from the session so the owner can
/// await it without holding the session.
pub struct Acquisition {
    attempt: u64,
    device: Arc<dyn CaptureDevice>,
    constraints: VideoConstraints,
}

impl Acquisition {
    #[cfg(test)]
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub async fn run(self) -> (u64, Result<Box<dyn VideoStream>, CaptureErrors>) {
        let result = self.device.acquire(self.constraints).await;
        (self.attempt, result)
    }
}

#[derive(Debug)]
pub enum AcquireOutcome {
    Streaming,
    Failed(CaptureErrors),
    /// The result belonged to an attempt that is no longer current.
    Discarded,
}

/// Told which attempt lost its camera mid-stream. Runs on the send cycle's task.
pub type FaultHook = Arc<dyn Fn(u64, CaptureErrors) + Send + Sync>;

struct RunningCycle {
    cancel: CancellationToken,
    handle: JoinHandle<Box<dyn VideoStream>>,
}

/// Owns the camera stream and the send cycle feeding the channel.
pub struct CaptureSession {
    device: Arc<dyn CaptureDevice>,
    channel: Arc<dyn Channel>,
    settings: CaptureSettings,
    preview: PreviewSink,
    state: CaptureState,
    next_attempt: u64,
    cycle: Option<RunningCycle>,
    on_fault: Option<FaultHook>,
}

impl CaptureSession {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        channel: Arc<dyn Channel>,
        settings: CaptureSettings,
        preview: PreviewSink,
    ) -> Self {
        Self {
            device,
            channel,
            settings,
            preview,
            state: CaptureState::Idle,
            next_attempt: 0,
            cycle: None,
            on_fault: None,
        }
    }

    pub fn on_fault(&mut self, hook: FaultHook) {
        self.on_fault = Some(hook);
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, CaptureState::Streaming { .. })
    }

    /// Starts a new attempt unless one is already pending or streaming.
    pub fn begin_acquire(&mut self) -> Option<Acquisition> {
        match self.state {
            CaptureState::Acquiring { attempt } | CaptureState::Streaming { attempt } => {
                tracing::debug!("Capture attempt {attempt} already active");
                return None;
            }
            CaptureState::Idle | CaptureState::Stopped => {}
        }

        self.next_attempt += 1;
        let attempt = self.next_attempt;
        self.state = CaptureState::Acquiring { attempt };
        tracing::info!("Requesting camera, attempt {attempt}");

        Some(Acquisition {
            attempt,
            device: Arc::clone(&self.device),
            constraints: self.settings.constraints,
        })
    }

    pub fn finish_acquire(
        &mut self,
        attempt: u64,
        result: Result<Box<dyn VideoStream>, CaptureErrors>,
    ) -> AcquireOutcome {
        if self.state != (CaptureState::Acquiring { attempt }) {
            if let Ok(mut stream) = result {
                let stopped = stream.stop_tracks();
                tracing::info!("Released {stopped} tracks from stale attempt {attempt}");
            }
            return AcquireOutcome::Discarded;
        }

        match result {
            Ok(stream) => {
                let cancel = CancellationToken::new();
                let cycle = SendCycle::new(
                    stream,
                    Arc::clone(&self.channel),
                    &self.settings,
                    Arc::clone(&self.preview),
                    cancel.clone(),
                );
                let on_fault = self.on_fault.clone();
                let handle = tokio::spawn(async move {
                    let (stream, fault) = cycle.run().await;
                    if let Some(err) = fault {
                        match on_fault {
                            Some(hook) => hook(attempt, err),
                            None => tracing::warn!("Attempt {attempt} lost its camera: {err}"),
                        }
                    }
                    stream
                });
                self.cycle = Some(RunningCycle { cancel, handle });
                self.state = CaptureState::Streaming { attempt };
                AcquireOutcome::Streaming
            }
            Err(err) => {
                tracing::error!("Camera attempt {attempt} failed: {err}");
                self.state = CaptureState::Idle;
                AcquireOutcome::Failed(err)
            }
        }
    }

    /// Stops the send cycle and the camera. Returns the number of tracks stopped.
    pub async fn stop(&mut self) -> usize {
        let previous = std::mem::replace(&mut self.state, CaptureState::Stopped);
        let mut stopped = 0;

        if let Some(RunningCycle { cancel, handle }) = self.cycle.take() {
            cancel.cancel();
            match handle.await {
                Ok(mut stream) => stopped = stream.stop_tracks(),
                Err(err) => tracing::error!("Send cycle ended abnormally: {err}"),
            }
        }
        self.preview.send_replace(None);

        tracing::info!("Capture stopped from {previous:?}, {stopped} tracks released");
        stopped
    }

    /// Stops a stream whose camera failed. Returns false when `attempt` is no
    /// longer the one streaming.
    pub async fn abandon(&mut self, attempt: u64) -> bool {
        if self.state != (CaptureState::Streaming { attempt }) {
            tracing::debug!("Camera fault for stale attempt {attempt}");
            return false;
        }
        self.stop().await;
        true
    }
}

#[cfg(test)]
mod tests {
    use relay_model::names::WEBCAM_FRAME;
    use tokio::sync::watch;
    use tokio::time::sleep;

    use super::*;
    use crate::capture::testing::{Counters, FakeCamera};
    use crate::capture::Frame;
    use crate::transport::testing::RecordingChannel;

    struct Harness {
        session: CaptureSession,
        channel: Arc<RecordingChannel>,
        preview: watch::Receiver<Option<Frame>>,
        counters: Arc<Counters>,
    }

    fn harness(fail: bool) -> Harness {
        if fail {
            harness_with(FakeCamera::denied())
        } else {
            harness_with(FakeCamera::working())
        }
    }

    fn harness_with((camera, counters): (FakeCamera, Arc<Counters>)) -> Harness {
        let channel = Arc::new(RecordingChannel::new());
        let (preview_tx, preview) = watch::channel(None);
        let settings = CaptureSettings {
            constraints: VideoConstraints { width: 8, height: 6 },
            ..CaptureSettings::default()
        };
        let session = CaptureSession::new(
            Arc::new(camera),
            channel.clone(),
            settings,
            Arc::new(preview_tx),
        );
        Harness {
            session,
            channel,
            preview,
            counters,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_acquisition_sends_nothing() {
        let mut h = harness(true);
        let (attempt, result) = h.session.begin_acquire().unwrap().run().await;

        let outcome = h.session.finish_acquire(attempt, result);
        assert!(matches!(
            outcome,
            AcquireOutcome::Failed(CaptureErrors::PermissionDenied(_))
        ));
        assert!(!h.session.is_streaming());
        assert_eq!(h.session.state(), CaptureState::Idle);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(h.channel.count(WEBCAM_FRAME), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_tracks_once_and_halts_frames() {
        let mut h = harness(false);
        let (attempt, result) = h.session.begin_acquire().unwrap().run().await;
        assert!(matches!(
            h.session.finish_acquire(attempt, result),
            AcquireOutcome::Streaming
        ));
        assert!(h.session.is_streaming());

        sleep(Duration::from_millis(450)).await;
        let sent = h.channel.count(WEBCAM_FRAME);
        assert!(sent >= 4, "expected a steady frame rate, got {sent}");
        assert!(h.preview.borrow().is_some());

        assert_eq!(h.session.stop().await, 1);
        assert_eq!(h.counters.stopped(), 1);
        assert_eq!(h.session.state(), CaptureState::Stopped);
        assert!(h.preview.borrow().is_none());

        let after_stop = h.channel.count(WEBCAM_FRAME);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(h.channel.count(WEBCAM_FRAME), after_stop);

        assert_eq!(h.session.stop().await, 0);
        assert_eq!(h.counters.stopped(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_grant_after_stop_is_released() {
        let mut h = harness(false);
        let pending = h.session.begin_acquire().unwrap();

        assert_eq!(h.session.stop().await, 0);
        let (attempt, result) = pending.run().await;
        assert!(matches!(
            h.session.finish_acquire(attempt, result),
            AcquireOutcome::Discarded
        ));

        assert_eq!(h.counters.acquired(), 1);
        assert_eq!(h.counters.stopped(), 1);
        assert!(!h.session.is_streaming());
        sleep(Duration::from_secs(1)).await;
        assert_eq!(h.channel.count(WEBCAM_FRAME), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_uses_fresh_attempt() {
        let mut h = harness(false);
        let first = h.session.begin_acquire().unwrap();
        assert!(h.session.begin_acquire().is_none());
        h.session.stop().await;

        let second = h.session.begin_acquire().unwrap();
        assert!(second.attempt() > first.attempt());

        let (stale, stale_result) = first.run().await;
        assert!(matches!(
            h.session.finish_acquire(stale, stale_result),
            AcquireOutcome::Discarded
        ));
        let (current, result) = second.run().await;
        assert!(matches!(
            h.session.finish_acquire(current, result),
            AcquireOutcome::Streaming
        ));
        assert!(h.session.begin_acquire().is_none());

        h.session.stop().await;
        assert_eq!(h.counters.acquired(), 2);
        assert_eq!(h.counters.stopped(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_dropped_while_disconnected() {
        let mut h = harness(false);
        let (attempt, result) = h.session.begin_acquire().unwrap().run().await;
        h.session.finish_acquire(attempt, result);

        h.channel.set_connected(false);
        sleep(Duration::from_millis(350)).await;
        assert_eq!(h.channel.count(WEBCAM_FRAME), 0);
        assert!(h.session.is_streaming());

        h.channel.set_connected(true);
        sleep(Duration::from_millis(350)).await;
        assert!(h.channel.count(WEBCAM_FRAME) > 0);
        h.session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_loss_ends_cycle_and_reports_once() {
        let mut h = harness_with(FakeCamera::lost_after(3));
        let (faults_tx, mut faults_rx) = tokio::sync::mpsc::unbounded_channel();
        h.session.on_fault(Arc::new(move |attempt, err| {
            let _ = faults_tx.send((attempt, err));
        }));

        let (attempt, result) = h.session.begin_acquire().unwrap().run().await;
        h.session.finish_acquire(attempt, result);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(h.channel.count(WEBCAM_FRAME), 3);
        let (failed, err) = faults_rx.recv().await.unwrap();
        assert_eq!(failed, attempt);
        assert!(matches!(err, CaptureErrors::DeviceLost(_)));
        assert!(faults_rx.try_recv().is_err());

        assert!(h.session.abandon(attempt).await);
        assert_eq!(h.session.state(), CaptureState::Stopped);
        assert_eq!(h.counters.stopped(), 1);
        assert!(h.preview.borrow().is_none());

        assert!(!h.session.abandon(attempt).await);
        assert_eq!(h.counters.stopped(), 1);
    }
}
