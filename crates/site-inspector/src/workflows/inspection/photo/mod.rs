//! Per-photo evidence pipeline: compress, geotag, watermark.
//!
//! Uploading is left to the orchestrator so that a failed upload can be
//! recorded without touching the processed bytes.

mod compress;
mod font;
mod watermark;

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Utc};
use tracing::{debug, warn};

pub use compress::{compress, CompressedPhoto, CompressionSettings};
pub use watermark::{WatermarkCanvas, WatermarkText, TIMESTAMP_FORMAT};

use super::domain::{GeoTag, PhotoCapture, PhotoEvidence, PhotoProcessing};
use super::geolocation::ResolvedLocation;
use crate::config::PipelineConfig;

#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("photo is empty")]
    Empty,
    #[error("unable to decode photo: {0}")]
    Decode(#[source] image::ImageError),
    #[error("unable to encode photo: {0}")]
    Encode(#[source] image::ImageError),
}

/// Owns the batch's single watermark surface, so photos go through it one
/// at a time.
#[derive(Debug)]
pub struct PhotoPipeline {
    compression: CompressionSettings,
    canvas: WatermarkCanvas,
    brand_label: String,
    address_grace: Duration,
    facility_offset: Option<FixedOffset>,
}

impl PhotoPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            compression: CompressionSettings {
                max_dimension: config.max_dimension,
                quality: config.compress_quality,
            },
            canvas: WatermarkCanvas::new(config.watermark_quality),
            brand_label: config.brand_label.clone(),
            address_grace: config.address_grace.min(config.geocode_timeout),
            facility_offset: config.facility_offset,
        }
    }

    /// Never fails: if compression or watermarking breaks, the evidence
    /// carries the captured bytes unchanged and says why.
    pub async fn process_photo(
        &mut self,
        capture: PhotoCapture,
        location_name: &str,
        location: Option<&mut ResolvedLocation>,
    ) -> PhotoEvidence {
        let compressed = compress(&capture.bytes, self.compression);

        let geotag = match location {
            Some(location) => Some(location.geotag_within(self.address_grace).await),
            None => None,
        };

        let finalised = compressed.and_then(|photo| {
            let text = WatermarkText {
                location_name: location_name.to_string(),
                captured_at: facility_time(capture.captured_at, self.facility_offset),
                position_line: geotag.as_ref().map(GeoTag::display_line),
                brand: self.brand_label.clone(),
            };
            self.canvas.compose(&photo.bytes, &text)
        });

        match finalised {
            Ok(bytes) => {
                debug!(
                    slot = %capture.slot,
                    input_bytes = capture.bytes.len(),
                    output_bytes = bytes.len(),
                    geotagged = geotag.is_some(),
                    "photo finalised"
                );
                PhotoEvidence::new(
                    capture.slot,
                    bytes,
                    capture.captured_at,
                    geotag,
                    PhotoProcessing::Watermarked,
                )
            }
            Err(err) => {
                warn!(
                    slot = %capture.slot,
                    error = %err,
                    "photo processing failed; uploading original bytes"
                );
                PhotoEvidence::new(
                    capture.slot,
                    capture.bytes,
                    capture.captured_at,
                    geotag,
                    PhotoProcessing::OriginalFallback(err.to_string()),
                )
            }
        }
    }
}

/// Capture time on the facility clock, or the host clock when no offset is configured.
fn facility_time(captured_at: DateTime<Utc>, offset: Option<FixedOffset>) -> NaiveDateTime {
    match offset {
        Some(offset) => captured_at.with_timezone(&offset).naive_local(),
        None => captured_at.with_timezone(&Local).naive_local(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};

    fn encode(image: &RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, 90)
            .encode_image(image)
            .expect("encode sample");
        bytes
    }

    /// Gradient test photo.
    pub(crate) fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        encode(&image)
    }

    pub(crate) fn solid_jpeg(width: u32, height: u32, level: u8) -> Vec<u8> {
        encode(&RgbImage::from_pixel(width, height, Rgb([level, level, level])))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::sample_jpeg;
    use super::*;
    use crate::workflows::inspection::catalog::ComponentId;
    use crate::workflows::inspection::domain::{GeoPoint, PhotoSlot};
    use crate::workflows::inspection::geolocation::{LocationAdapter, ReportedPosition};
    use chrono::TimeZone;
    use image::GenericImageView;

    fn capture(bytes: Vec<u8>) -> PhotoCapture {
        PhotoCapture {
            slot: PhotoSlot::Component(ComponentId::new("floor_cleanliness")),
            bytes,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn watermark_time_follows_the_facility_offset() {
        let captured_at = Utc.with_ymd_and_hms(2026, 10, 19, 7, 5, 0).unwrap();

        let stamped = facility_time(captured_at, FixedOffset::east_opt(7 * 3600));
        let expected = chrono::NaiveDate::from_ymd_opt(2026, 10, 19)
            .and_then(|day| day.and_hms_opt(14, 5, 0))
            .unwrap();
        assert_eq!(stamped, expected);

        let host = facility_time(captured_at, None);
        assert_eq!(host, captured_at.with_timezone(&Local).naive_local());
    }

    #[tokio::test]
    async fn processed_photo_is_bounded_and_watermarked() {
        let mut pipeline = PhotoPipeline::new(&PipelineConfig::default());
        let evidence = pipeline
            .process_photo(capture(sample_jpeg(2400, 1800)), "Gate 4", None)
            .await;

        assert_eq!(evidence.processing(), &PhotoProcessing::Watermarked);
        assert!(evidence.geotag().is_none());
        let decoded = image::load_from_memory(evidence.bytes()).expect("jpeg");
        assert_eq!(decoded.dimensions(), (1200, 900));
    }

    #[tokio::test]
    async fn geotag_comes_from_the_resolved_location() {
        let mut pipeline = PhotoPipeline::new(&PipelineConfig::default());
        let point = GeoPoint::new(-6.2, 106.8).expect("valid");
        let adapter = LocationAdapter::coordinates_only(Duration::from_secs(1));
        let mut location = adapter
            .locate(&ReportedPosition(Some(point)))
            .await
            .expect("located");

        let evidence = pipeline
            .process_photo(capture(sample_jpeg(320, 240)), "Gate 4", Some(&mut location))
            .await;
        let tag = evidence.geotag().expect("geotagged");
        assert_eq!((tag.lat, tag.lng), (-6.2, 106.8));
        assert_eq!(tag.address, None);
    }

    #[tokio::test]
    async fn undecodable_photo_falls_back_to_original_bytes() {
        let mut pipeline = PhotoPipeline::new(&PipelineConfig::default());
        let raw = b"HEIC bytes the decoder does not understand".to_vec();
        let evidence = pipeline
            .process_photo(capture(raw.clone()), "Gate 4", None)
            .await;

        assert_eq!(evidence.bytes(), raw.as_slice());
        assert!(matches!(
            evidence.processing(),
            PhotoProcessing::OriginalFallback(reason) if reason.contains("decode")
        ));
    }
}
