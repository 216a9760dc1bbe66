#[derive(thiserror::Error, Debug)]
pub enum CodecErrors {
    #[error("Quality factor must be within (0, 1], got {0}")]
    InvalidQuality(f32),
    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    InvalidFrameShape { expected: usize, actual: usize },
    #[error("Image codec failure: {0}")]
    Image(#[from] image::ImageError),
    #[error("Data URL has no descriptor")]
    MissingDescriptor,
    #[cfg(any(test, feature = "gui"))]
    #[error("Payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}
