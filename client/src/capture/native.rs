use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::{Camera, NokhwaError};
use tokio::sync::oneshot;

use super::{CaptureDevice, CaptureErrors, Frame, VideoConstraints, VideoStream};

const REQUESTED_FPS: u32 = 30;
const MAX_READ_FAILURES: u32 = 10;
const READ_RETRY_STEP: Duration = Duration::from_millis(50);
const READ_RETRY_MAX: Duration = Duration::from_millis(500);

/// Webcam backed by the platform camera API.
///
/// The camera handle never leaves its worker thread: it is opened, read and
/// stopped there, and the latest decoded sample is shared with the stream.
#[derive(Debug, Clone)]
pub struct NativeCamera {
    index: u32,
}

impl NativeCamera {
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}

fn classify(err: NokhwaError) -> CaptureErrors {
    let message = err.to_string();
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") {
        CaptureErrors::PermissionDenied(message)
    } else if lowered.contains("not found") || lowered.contains("no device") {
        CaptureErrors::NoDeviceFound
    } else {
        CaptureErrors::AcquisitionFailed(message)
    }
}

/// Format closest to the requested geometry; the send cycle rescales
/// whatever the device settles on.
fn camera_format(constraints: VideoConstraints) -> CameraFormat {
    CameraFormat::new(
        Resolution::new(constraints.width, constraints.height),
        FrameFormat::MJPEG,
        REQUESTED_FPS,
    )
}

/// Latest sample, or the reason the camera thread gave up.
#[derive(Default)]
struct FrameSlot {
    latest: Option<Frame>,
    lost: Option<String>,
}

impl FrameSlot {
    fn read(&self) -> Result<Frame, CaptureErrors> {
        if let Some(reason) = &self.lost {
            return Err(CaptureErrors::DeviceLost(reason.clone()));
        }
        self.latest.clone().ok_or(CaptureErrors::NoFrame)
    }
}

/// Consecutive read failures on the camera thread.
#[derive(Default)]
struct ReadHealth {
    consecutive: u32,
}

impl ReadHealth {
    /// Delay before the next read, or `None` once the camera counts as lost.
    fn failed(&mut self) -> Option<Duration> {
        self.consecutive += 1;
        if self.consecutive >= MAX_READ_FAILURES {
            return None;
        }
        Some(std::cmp::min(READ_RETRY_STEP * self.consecutive, READ_RETRY_MAX))
    }

    fn succeeded(&mut self) {
        self.consecutive = 0;
    }
}

#[async_trait]
impl CaptureDevice for NativeCamera {
    async fn acquire(
        &self,
        constraints: VideoConstraints,
    ) -> Result<Box<dyn VideoStream>, CaptureErrors> {
        let index = self.index;
        let slot = Arc::new(Mutex::new(FrameSlot::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let (opened_tx, opened_rx) = oneshot::channel();

        let worker_slot = Arc::clone(&slot);
        let worker_stop = Arc::clone(&stop);
        thread::spawn(move || {
            let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                camera_format(constraints),
            ));
            let mut camera = match Camera::new(CameraIndex::Index(index), requested)
                .and_then(|mut camera| camera.open_stream().map(|_| camera))
            {
                Ok(camera) => camera,
                Err(err) => {
                    let _ = opened_tx.send(Err(classify(err)));
                    return;
                }
            };
            if opened_tx.send(Ok(())).is_err() {
                tracing::warn!("Camera {index} opened after the requester went away");
                worker_stop.store(true, Ordering::SeqCst);
            }
            let resolution = camera.resolution();
            tracing::info!(
                "Camera {index} streaming at {}x{}, requested {}x{}",
                resolution.width(),
                resolution.height(),
                constraints.width,
                constraints.height
            );

            let mut health = ReadHealth::default();
            while !worker_stop.load(Ordering::SeqCst) {
                let read = camera
                    .frame()
                    .and_then(|buffer| buffer.decode_image::<RgbFormat>());
                let Ok(mut shared) = worker_slot.lock() else {
                    break;
                };
                match read {
                    Ok(decoded) => {
                        health.succeeded();
                        shared.latest = Some(Frame {
                            width: decoded.width(),
                            height: decoded.height(),
                            data: decoded.into_raw(),
                        });
                    }
                    Err(err) => {
                        // Never keep streaming a frozen sample.
                        shared.latest = None;
                        match health.failed() {
                            Some(delay) => {
                                drop(shared);
                                tracing::warn!("Camera {index} frame error: {err}");
                                thread::sleep(delay);
                            }
                            None => {
                                tracing::error!(
                                    "Camera {index} failed {MAX_READ_FAILURES} reads in a row: {err}"
                                );
                                shared.lost = Some(err.to_string());
                                break;
                            }
                        }
                    }
                }
            }

            if let Err(err) = camera.stop_stream() {
                tracing::error!("Camera {index} did not stop cleanly: {err}");
            }
            tracing::info!("Camera {index} released");
        });

        match opened_rx.await {
            Ok(Ok(())) => Ok(Box::new(NativeStream { slot, stop })),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CaptureErrors::AcquisitionFailed(
                "camera worker exited during startup".to_owned(),
            )),
        }
    }
}

struct NativeStream {
    slot: Arc<Mutex<FrameSlot>>,
    stop: Arc<AtomicBool>,
}

impl VideoStream for NativeStream {
    fn grab(&mut self) -> Result<Frame, CaptureErrors> {
        if self.stop.load(Ordering::SeqCst) {
            return Err(CaptureErrors::StreamStopped);
        }
        self.slot
            .lock()
            .map_err(|_| CaptureErrors::FrameFailed("frame slot poisoned".to_owned()))?
            .read()
    }

    fn live_tracks(&self) -> usize {
        usize::from(!self.stop.load(Ordering::SeqCst))
    }

    fn stop_tracks(&mut self) -> usize {
        // The worker stops the camera after its current read.
        usize::from(!self.stop.swap(true, Ordering::SeqCst))
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_configured_geometry() {
        let format = camera_format(VideoConstraints::default());
        assert_eq!(format.resolution(), Resolution::new(640, 480));
        assert_eq!(format.frame_rate(), REQUESTED_FPS);
    }

    #[test]
    fn test_read_failures_back_off_then_give_up() {
        let mut health = ReadHealth::default();
        let delays: Vec<_> = std::iter::from_fn(|| health.failed()).collect();
        assert_eq!(delays.len() as u32, MAX_READ_FAILURES - 1);
        assert_eq!(delays[0], READ_RETRY_STEP);
        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(delays.iter().all(|delay| *delay <= READ_RETRY_MAX));

        health.succeeded();
        assert_eq!(health.failed(), Some(READ_RETRY_STEP));
    }

    #[test]
    fn test_slot_reports_loss_instead_of_last_frame() {
        let mut slot = FrameSlot::default();
        assert!(matches!(slot.read(), Err(CaptureErrors::NoFrame)));

        slot.latest = Some(Frame {
            width: 1,
            height: 1,
            data: vec![1, 2, 3],
        });
        assert!(slot.read().is_ok());

        slot.latest = None;
        slot.lost = Some("device unplugged".to_owned());
        assert!(matches!(slot.read(), Err(CaptureErrors::DeviceLost(reason)) if reason == "device unplugged"));
    }
}
