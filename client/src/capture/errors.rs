use thiserror::Error;

use crate::codecs::CodecErrors;
use crate::transport::TransportErrors;

#[derive(Error, Debug)]
pub enum CaptureErrors {
    #[cfg(feature = "camera")]
    #[error("No camera found")]
    NoDeviceFound,
    #[error("Camera access denied: {0}")]
    PermissionDenied(String),
    #[error("Could not open camera: {0}")]
    AcquisitionFailed(String),
    #[error("Camera stream is stopped")]
    StreamStopped,
    #[cfg(feature = "camera")]
    #[error("No frame available yet")]
    NoFrame,
    #[error("Failed to read frame: {0}")]
    FrameFailed(String),
    #[error("Camera stopped delivering frames: {0}")]
    DeviceLost(String),
}

impl CaptureErrors {
    /// The stream will not produce another frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StreamStopped | Self::DeviceLost(_))
    }
}

/// Reasons a single send-cycle iteration produced no outbound frame.
#[derive(Error, Debug)]
pub enum SendErrors {
    #[error(transparent)]
    Capture(#[from] CaptureErrors),
    #[error(transparent)]
    Codec(#[from] CodecErrors),
    #[error(transparent)]
    Transport(#[from] TransportErrors),
    #[error("Encoder task failed: {0}")]
    Encoder(#[from] tokio::task::JoinError),
}
