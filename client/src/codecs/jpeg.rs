use image::codecs::jpeg;
use image::ExtendedColorType;

use super::errors::CodecErrors;
use crate::capture::Frame;

/// Quality factor used for outbound frames, on a 0–1 scale.
pub const DEFAULT_QUALITY_FACTOR: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// Maps a 0–1 quality factor onto the encoder's 1–100 scale.
    pub fn from_quality_factor(factor: f32) -> Result<Self, CodecErrors> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(CodecErrors::InvalidQuality(factor));
        }
        let quality = (factor * 100.0).round().clamp(1.0, 100.0) as u8;
        Ok(Self { quality })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, CodecErrors> {
        let expected = frame.width as usize * frame.height as usize * 3;
        if frame.data.len() != expected {
            return Err(CodecErrors::InvalidFrameShape {
                expected,
                actual: frame.data.len(),
            });
        }

        // Roughly what a 640x480 sample compresses to at 0.8.
        let mut bytes = Vec::with_capacity(expected / 10);
        jpeg::JpegEncoder::new_with_quality(&mut bytes, self.quality).encode(
            &frame.data,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(bytes)
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self { quality: 80 }
    }
}

/// Decodes any supported compressed image to RGBA for display.
#[cfg(any(test, feature = "gui"))]
pub fn decode_jpeg(bytes: &[u8]) -> Result<image::RgbaImage, CodecErrors> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 128]);
            }
        }
        Frame {
            width,
            height,
            data,
        }
    }

    #[test]
    fn test_quality_factor_mapping() {
        assert_eq!(JpegEncoder::from_quality_factor(0.8).unwrap().quality(), 80);
        assert_eq!(JpegEncoder::from_quality_factor(1.0).unwrap().quality(), 100);
        assert_eq!(JpegEncoder::from_quality_factor(0.001).unwrap().quality(), 1);
        assert_eq!(JpegEncoder::default(), JpegEncoder::from_quality_factor(DEFAULT_QUALITY_FACTOR).unwrap());
        assert!(JpegEncoder::from_quality_factor(0.0).is_err());
        assert!(JpegEncoder::from_quality_factor(1.5).is_err());
        assert!(JpegEncoder::from_quality_factor(f32::NAN).is_err());
    }

    #[test]
    fn test_encoded_frame_decodes_with_same_geometry() {
        let bytes = JpegEncoder::default().encode(&gradient(64, 48)).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8], "JPEG SOI marker");

        let decoded = decode_jpeg(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[test]
    fn test_rejects_short_buffer() {
        let frame = Frame {
            width: 4,
            height: 4,
            data: vec![0; 10],
        };
        assert!(matches!(
            JpegEncoder::default().encode(&frame),
            Err(CodecErrors::InvalidFrameShape { expected: 48, actual: 10 })
        ));
    }
}
