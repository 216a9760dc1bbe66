use thiserror::Error;

use crate::codecs::CodecErrors;
use crate::transport::TransportErrors;

/// Failures that prevent the client from starting.
#[derive(Error, Debug)]
pub enum StartupErrors {
    #[error(transparent)]
    Transport(#[from] TransportErrors),
    #[error("Invalid capture settings: {0}")]
    Settings(#[from] CodecErrors),
    #[error("Could not start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Native camera support is not compiled in, rebuild with --features camera")]
    CameraUnavailable,
    #[error("Window failed: {0}")]
    Gui(String),
}
