use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::errors::CodecErrors;

/// Format descriptor the server expects to be stripped from outbound frames.
pub const JPEG_DESCRIPTOR: &str = "data:image/jpeg;base64,";

pub fn to_data_url(jpeg: &[u8]) -> String {
    with_descriptor(&STANDARD.encode(jpeg))
}

/// Returns the payload after the first `,` of a data URL.
pub fn strip_descriptor(data_url: &str) -> Result<&str, CodecErrors> {
    match data_url.split_once(',') {
        Some((descriptor, payload)) if descriptor.starts_with("data:") => Ok(payload),
        _ => Err(CodecErrors::MissingDescriptor),
    }
}

pub fn with_descriptor(payload: &str) -> String {
    let mut url = String::with_capacity(JPEG_DESCRIPTOR.len() + payload.len());
    url.push_str(JPEG_DESCRIPTOR);
    url.push_str(payload);
    url
}

#[cfg(any(test, feature = "gui"))]
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, CodecErrors> {
    Ok(STANDARD.decode(payload.trim())?)
}
