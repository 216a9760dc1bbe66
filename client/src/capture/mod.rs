mod cadence;
mod errors;
#[cfg(feature = "camera")]
mod native;
mod send_cycle;
mod session;
mod synthetic;
#[cfg(test)]
pub mod testing;

pub use cadence::Cadence;
pub use errors::{CaptureErrors, SendErrors};
#[cfg(feature = "camera")]
pub use native::NativeCamera;
pub use session::{AcquireOutcome, CaptureSession, CaptureSettings, CaptureState};
pub use synthetic::SyntheticCamera;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

/// One RGB8 sample, row-major, `width * height * 3` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// What the client asks of the camera: video only, fixed geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// Latest captured sample, shown as the local live preview.
pub type PreviewSink = Arc<watch::Sender<Option<Frame>>>;

#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Opens a video stream. May wait on an OS permission prompt; there is
    /// no timeout and no way to cancel it.
    async fn acquire(
        &self,
        constraints: VideoConstraints,
    ) -> Result<Box<dyn VideoStream>, CaptureErrors>;
}

/// A live stream owning the underlying hardware tracks.
pub trait VideoStream: Send {
    /// Current sample of the stream.
    fn grab(&mut self) -> Result<Frame, CaptureErrors>;
    fn live_tracks(&self) -> usize;
    /// Stops every live track and returns how many were stopped.
    fn stop_tracks(&mut self) -> usize;
}
