use std::time::Duration;

use crate::app::ClientVariant;
use crate::capture::{CaptureSettings, VideoConstraints};
use crate::codecs::{CodecErrors, JpegEncoder, DEFAULT_QUALITY_FACTOR};
use crate::transport::DEFAULT_BACKEND_URL;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum CameraKind {
    /// Generated test pattern.
    Synthetic,
    /// Platform webcam, needs the `camera` feature.
    Native,
}

#[derive(clap::Parser, Debug)]
#[command(version, about = "Streams a webcam to a painting server and shows its canvas", long_about = None)]
pub(super) struct Args {
    /// Base address of the painting server.
    #[arg(long, env = "BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    pub(super) backend_url: String,
    /// Only display the canvas, never open the camera.
    #[arg(long)]
    pub(super) viewer: bool,
    /// Run without a window; type `save` on stdin to save the canvas.
    #[arg(long)]
    pub(super) headless: bool,
    #[arg(long, value_enum, default_value_t = CameraKind::Synthetic)]
    pub(super) camera: CameraKind,
    #[arg(long, default_value_t = 0)]
    pub(super) camera_index: u32,
    #[arg(long, default_value_t = 640)]
    pub(super) width: u32,
    #[arg(long, default_value_t = 480)]
    pub(super) height: u32,
    #[arg(long, default_value_t = 100)]
    pub(super) frame_interval_ms: u64,
    /// JPEG quality on a 0-1 scale.
    #[arg(long, default_value_t = DEFAULT_QUALITY_FACTOR)]
    pub(super) jpeg_quality: f32,
    #[arg(long, default_value_t = tracing::Level::INFO)]
    pub(super) log_level: tracing::Level,
}

impl Args {
    pub(super) fn variant(&self) -> ClientVariant {
        if self.viewer {
            ClientVariant::Viewer
        } else {
            ClientVariant::Capture
        }
    }

    pub(super) fn capture_settings(&self) -> Result<CaptureSettings, CodecErrors> {
        Ok(CaptureSettings {
            constraints: VideoConstraints {
                width: self.width,
                height: self.height,
            },
            frame_interval: Duration::from_millis(self.frame_interval_ms.max(1)),
            encoder: JpegEncoder::from_quality_factor(self.jpeg_quality)?,
        })
    }
}
