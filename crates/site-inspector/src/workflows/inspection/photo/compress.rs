use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, RgbImage};
use tracing::debug;

use super::PhotoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    /// Longest edge after resizing; smaller images keep their size.
    pub max_dimension: u32,
    pub quality: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPhoto {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decodes, bounds the longest edge while keeping the aspect ratio, and
/// re-encodes as JPEG at the configured quality.
pub fn compress(raw: &[u8], settings: CompressionSettings) -> Result<CompressedPhoto, PhotoError> {
    if raw.is_empty() {
        return Err(PhotoError::Empty);
    }

    let decoded = image::load_from_memory(raw).map_err(PhotoError::Decode)?;
    let (original_width, original_height) = decoded.dimensions();

    let bound = settings.max_dimension.max(1);
    let resized = if original_width.max(original_height) > bound {
        decoded.resize(bound, bound, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = resized.into_rgb8();
    let bytes = encode_jpeg(&rgb, settings.quality)?;

    debug!(
        original = format!("{original_width}x{original_height}"),
        output = format!("{}x{}", rgb.width(), rgb.height()),
        input_bytes = raw.len(),
        output_bytes = bytes.len(),
        "photo compressed"
    );

    Ok(CompressedPhoto {
        width: rgb.width(),
        height: rgb.height(),
        bytes,
    })
}

pub(crate) fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PhotoError> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder.encode_image(image).map_err(PhotoError::Encode)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::inspection::photo::test_support::sample_jpeg;

    fn settings() -> CompressionSettings {
        CompressionSettings {
            max_dimension: 1200,
            quality: 85,
        }
    }

    #[test]
    fn large_photos_are_bounded_with_aspect_ratio_preserved() {
        let compressed = compress(&sample_jpeg(2400, 1600), settings()).expect("compresses");
        assert_eq!((compressed.width, compressed.height), (1200, 800));

        let portrait = compress(&sample_jpeg(900, 1800), settings()).expect("compresses");
        assert_eq!((portrait.width, portrait.height), (600, 1200));
    }

    #[test]
    fn small_photos_keep_their_dimensions() {
        let compressed = compress(&sample_jpeg(640, 480), settings()).expect("compresses");
        assert_eq!((compressed.width, compressed.height), (640, 480));
        let decoded = image::load_from_memory(&compressed.bytes).expect("valid jpeg");
        assert_eq!(decoded.dimensions(), (640, 480));
    }

    #[test]
    fn rejects_empty_and_undecodable_input() {
        assert!(matches!(compress(&[], settings()), Err(PhotoError::Empty)));
        assert!(matches!(
            compress(b"definitely not an image", settings()),
            Err(PhotoError::Decode(_))
        ));
    }
}
