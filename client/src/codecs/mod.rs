mod data_url;
mod errors;
mod jpeg;

#[cfg(any(test, feature = "gui"))]
pub use data_url::decode_payload;
pub use data_url::{strip_descriptor, to_data_url, with_descriptor, JPEG_DESCRIPTOR};
pub use errors::CodecErrors;
#[cfg(any(test, feature = "gui"))]
pub use jpeg::decode_jpeg;
pub use jpeg::{JpegEncoder, DEFAULT_QUALITY_FACTOR};
