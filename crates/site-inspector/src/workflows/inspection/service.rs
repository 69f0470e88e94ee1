use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{ComponentRating, FacilityContext, PhotoProcessing, RatingSheet};
use super::geolocation::{DeviceLocator, LocationAdapter};
use super::persistence::{
    FailedPhoto, InspectionRecordRequest, InspectionSubmission, PersistenceError,
    PersistenceService, RecordId, SubmissionV1, UploadedPhoto,
};
use super::photo::PhotoPipeline;
use super::progress::{ProgressSink, ProgressTracker};
use super::scoring::{self, ScoreCard, ScoreStatus};
use super::session::{InspectionSession, SessionParts, ValidationError};
use super::storage::{object_key, sniff_content, ObjectStorage, UploadObject};
use super::template::{InspectionTemplate, TemplateError, TemplateProvider};
use crate::config::PipelineConfig;

/// Error raised by the inspection service.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("inspection template unavailable: {0}")]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// What the caller gets back once persistence has accepted the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub record_id: RecordId,
    pub submission: InspectionSubmission,
}

impl SubmissionReceipt {
    pub fn score(&self) -> u8 {
        self.submission.score()
    }

    pub fn status(&self) -> ScoreStatus {
        self.submission.status()
    }

    pub fn photo_urls(&self) -> &[String] {
        self.submission.photo_urls()
    }

    pub fn failed_photos(&self) -> &[FailedPhoto] {
        self.submission.failed_photos()
    }
}

/// Drives a session from validation through photo processing and upload to
/// the persisted record.
pub struct InspectionService<S, P> {
    templates: Arc<dyn TemplateProvider>,
    storage: Arc<S>,
    persistence: Arc<P>,
    locations: LocationAdapter,
    pipeline: PipelineConfig,
}

impl<S, P> InspectionService<S, P>
where
    S: ObjectStorage + 'static,
    P: PersistenceService + 'static,
{
    pub fn new(
        templates: Arc<dyn TemplateProvider>,
        storage: Arc<S>,
        persistence: Arc<P>,
        locations: LocationAdapter,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            templates,
            storage,
            persistence,
            locations,
            pipeline,
        }
    }

    pub async fn active_template(&self) -> Result<InspectionTemplate, SubmissionError> {
        self.templates
            .default_template()
            .await?
            .ok_or(SubmissionError::Validation(ValidationError::MissingTemplate))
    }

    /// Starts a session against the active template.
    pub async fn open_session(
        &self,
        facility: FacilityContext,
        user_id: impl Into<String>,
    ) -> Result<InspectionSession, SubmissionError> {
        let template = self.active_template().await?;
        Ok(InspectionSession::new(template, facility, user_id))
    }

    /// Score card for ad-hoc ratings against the active template.
    pub async fn preview_score(
        &self,
        ratings: Vec<ComponentRating>,
    ) -> Result<ScoreCard, SubmissionError> {
        let template = self.active_template().await?;
        let sheet = RatingSheet::from_ratings(&template.catalog, ratings)
            .map_err(ValidationError::from)?;
        Ok(ScoreCard::from_sheet(&template.catalog, &sheet))
    }

    /// Validates, then processes and uploads every photo in capture order,
    /// one at a time. Individual photo failures are recorded on the
    /// submission; only validation and persistence errors are returned.
    pub async fn submit(
        &self,
        session: InspectionSession,
        locator: &dyn DeviceLocator,
        progress: &dyn ProgressSink,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        session.validate()?;

        let SessionParts {
            template,
            facility,
            user_id,
            started_at,
            mut sheet,
            photos,
            notes,
        } = session.into_parts();

        let total = photos.len();
        info!(
            location_id = %facility.location_id,
            template_id = %template.id,
            photos = total,
            "inspection submission started"
        );

        let mut tracker = ProgressTracker::new(progress, total);
        tracker.start();

        let mut location = self.locations.locate(locator).await;
        let mut pipeline = PhotoPipeline::new(&self.pipeline);
        let mut prepared = Vec::with_capacity(total);
        for (index, capture) in photos.into_iter().enumerate() {
            let evidence = pipeline
                .process_photo(capture, &facility.location_name, location.as_mut())
                .await;
            prepared.push(evidence);
            tracker.prepared(index + 1);
        }
        drop(location);

        let mut uploaded = Vec::with_capacity(total);
        let mut failed = Vec::new();
        for (index, evidence) in prepared.into_iter().enumerate() {
            let slot = evidence.slot().clone();
            let original_fallback =
                matches!(evidence.processing(), PhotoProcessing::OriginalFallback(_));
            let geotag = evidence.geotag().cloned();
            let (content_type, extension) = sniff_content(evidence.bytes());
            let object = UploadObject {
                key: object_key(
                    &facility.location_id,
                    &slot,
                    evidence.captured_at(),
                    extension,
                ),
                content_type: content_type.to_string(),
                bytes: evidence.into_bytes(),
            };

            match self.storage.upload(object).await {
                Ok(url) => {
                    if let Some(component) = slot.component() {
                        if !sheet.attach_photo_ref(component, url.clone()) {
                            debug!(component = %component, "photo uploaded for an unrated component");
                        }
                    }
                    uploaded.push(UploadedPhoto {
                        slot,
                        url,
                        original_fallback,
                        geotag,
                    });
                }
                Err(err) => {
                    warn!(slot = %slot, error = %err, "photo upload failed; continuing without it");
                    failed.push(FailedPhoto {
                        slot,
                        reason: err.to_string(),
                    });
                }
            }
            tracker.uploaded(index + 1);
        }

        let score = scoring::score(&template.catalog, sheet.iter());
        let status = ScoreStatus::classify(score);
        let submitted_at = Utc::now();
        let duration_seconds = (submitted_at - started_at).num_seconds().max(0) as u64;

        let submission = InspectionSubmission::V1(SubmissionV1 {
            ratings: sheet.into_ratings(),
            score,
            status,
            photo_urls: uploaded.iter().map(|photo| photo.url.clone()).collect(),
            photos: uploaded,
            failed_photos: failed,
            notes,
            duration_seconds,
            submitted_at,
        });

        let request = InspectionRecordRequest {
            location_id: facility.location_id.clone(),
            template_id: template.id,
            user_id,
            submission: submission.clone(),
        };
        let record_id = self.persistence.create_inspection_record(request).await?;
        tracker.complete();

        info!(
            location_id = %facility.location_id,
            record_id = %record_id,
            score,
            status = status.label(),
            uploaded = submission.photo_urls().len(),
            failed = submission.failed_photos().len(),
            "inspection submitted"
        );

        Ok(SubmissionReceipt {
            record_id,
            submission,
        })
    }
}
