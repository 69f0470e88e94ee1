use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ComponentRating, GeoTag, PhotoSlot};
use super::scoring::ScoreStatus;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A photo that made it to object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedPhoto {
    pub slot: PhotoSlot,
    pub url: String,
    /// Whether the stored bytes are the captured original rather than the
    /// watermarked rendition.
    #[serde(default)]
    pub original_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geotag: Option<GeoTag>,
}

/// A photo whose upload failed; its URL is simply absent from the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPhoto {
    pub slot: PhotoSlot,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionV1 {
    pub ratings: Vec<ComponentRating>,
    pub score: u8,
    pub status: ScoreStatus,
    pub photo_urls: Vec<String>,
    #[serde(default)]
    pub photos: Vec<UploadedPhoto>,
    #[serde(default)]
    pub failed_photos: Vec<FailedPhoto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub duration_seconds: u64,
    pub submitted_at: DateTime<Utc>,
}

/// Versioned payload handed to persistence. New shapes are added as new
/// variants so stored records stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema_version")]
pub enum InspectionSubmission {
    #[serde(rename = "v1")]
    V1(SubmissionV1),
}

impl InspectionSubmission {
    pub fn score(&self) -> u8 {
        match self {
            Self::V1(body) => body.score,
        }
    }

    pub fn status(&self) -> ScoreStatus {
        match self {
            Self::V1(body) => body.status,
        }
    }

    pub fn photo_urls(&self) -> &[String] {
        match self {
            Self::V1(body) => &body.photo_urls,
        }
    }

    pub fn failed_photos(&self) -> &[FailedPhoto] {
        match self {
            Self::V1(body) => &body.failed_photos,
        }
    }

    pub fn ratings(&self) -> &[ComponentRating] {
        match self {
            Self::V1(body) => &body.ratings,
        }
    }

    pub fn duration_seconds(&self) -> u64 {
        match self {
            Self::V1(body) => body.duration_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRecordRequest {
    pub location_id: String,
    pub template_id: String,
    pub user_id: String,
    pub submission: InspectionSubmission,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("{0}")]
    Rejected(String),
    #[error("persistence service unavailable: {0}")]
    Unavailable(String),
}

/// Record store behind the submission. Errors reach the caller unchanged.
#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn create_inspection_record(
        &self,
        request: InspectionRecordRequest,
    ) -> Result<RecordId, PersistenceError>;
}
