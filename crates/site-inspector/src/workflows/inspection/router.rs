use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::catalog::ComponentId;
use super::domain::{
    ComponentRating, FacilityContext, GeoPoint, PhotoCapture, PhotoSlot, StarRating,
};
use super::geolocation::ReportedPosition;
use super::persistence::{FailedPhoto, PersistenceService, RecordId};
use super::progress::TracingProgress;
use super::scoring::ScoreStatus;
use super::service::{InspectionService, SubmissionError, SubmissionReceipt};
use super::session::{InspectionSession, ValidationError};
use super::storage::ObjectStorage;

/// Photos travel base64-encoded inside the JSON body.
pub const MAX_SUBMISSION_BYTES: usize = 64 * 1024 * 1024;

/// Router builder exposing the template, live scoring and submission endpoints.
pub fn inspection_router<S, P>(service: Arc<InspectionService<S, P>>) -> Router
where
    S: ObjectStorage + 'static,
    P: PersistenceService + 'static,
{
    Router::new()
        .route("/api/v1/inspections/template", get(template_handler::<S, P>))
        .route("/api/v1/inspections/score", post(score_handler::<S, P>))
        .route("/api/v1/inspections", post(submit_handler::<S, P>))
        .layer(DefaultBodyLimit::max(MAX_SUBMISSION_BYTES))
        .with_state(service)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingInput {
    pub component: ComponentId,
    pub rating: u8,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRequest {
    pub ratings: Vec<RatingInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoUpload {
    pub slot: PhotoSlot,
    /// Base64 (standard alphabet) image bytes.
    pub data: String,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PositionInput {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionRequest {
    pub location_id: String,
    pub location_name: String,
    pub user_id: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    pub ratings: Vec<RatingInput>,
    #[serde(default)]
    pub photos: Vec<PhotoUpload>,
    #[serde(default)]
    pub position: Option<PositionInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptView {
    pub record_id: RecordId,
    pub score: u8,
    pub status: ScoreStatus,
    pub status_label: &'static str,
    pub photo_urls: Vec<String>,
    pub failed_photos: Vec<FailedPhoto>,
    pub duration_seconds: u64,
}

impl From<&SubmissionReceipt> for ReceiptView {
    fn from(receipt: &SubmissionReceipt) -> Self {
        Self {
            record_id: receipt.record_id.clone(),
            score: receipt.score(),
            status: receipt.status(),
            status_label: receipt.status().label(),
            photo_urls: receipt.photo_urls().to_vec(),
            failed_photos: receipt.failed_photos().to_vec(),
            duration_seconds: receipt.submission.duration_seconds(),
        }
    }
}

pub(crate) async fn template_handler<S, P>(
    State(service): State<Arc<InspectionService<S, P>>>,
) -> Response
where
    S: ObjectStorage + 'static,
    P: PersistenceService + 'static,
{
    match service.active_template().await {
        Ok(template) => (StatusCode::OK, axum::Json(template)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn score_handler<S, P>(
    State(service): State<Arc<InspectionService<S, P>>>,
    axum::Json(request): axum::Json<ScoreRequest>,
) -> Response
where
    S: ObjectStorage + 'static,
    P: PersistenceService + 'static,
{
    let mut ratings = Vec::with_capacity(request.ratings.len());
    for input in request.ratings {
        match rating_from_input(input) {
            Ok(rating) => ratings.push(rating),
            Err(error) => return error_response(error),
        }
    }

    match service.preview_score(ratings).await {
        Ok(card) => (StatusCode::OK, axum::Json(card)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S, P>(
    State(service): State<Arc<InspectionService<S, P>>>,
    axum::Json(request): axum::Json<SubmissionRequest>,
) -> Response
where
    S: ObjectStorage + 'static,
    P: PersistenceService + 'static,
{
    let position = request.position.and_then(|input| {
        let point = GeoPoint::new(input.lat, input.lng);
        if point.is_none() {
            debug!(lat = input.lat, lng = input.lng, "ignoring out-of-range device position");
        }
        point
    });

    let session = match build_session(&*service, request).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    match service
        .submit(session, &ReportedPosition(position), &TracingProgress)
        .await
    {
        Ok(receipt) => {
            (StatusCode::CREATED, axum::Json(ReceiptView::from(&receipt))).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn build_session<S, P>(
    service: &InspectionService<S, P>,
    request: SubmissionRequest,
) -> Result<InspectionSession, Response>
where
    S: ObjectStorage + 'static,
    P: PersistenceService + 'static,
{
    let facility = FacilityContext {
        location_id: request.location_id,
        location_name: request.location_name,
    };
    let mut session = service
        .open_session(facility, request.user_id)
        .await
        .map_err(error_response)?;
    if let Some(started_at) = request.started_at {
        session = session.with_started_at(started_at);
    }

    for input in request.ratings {
        session
            .rate(&input.component, input.rating)
            .map_err(|error| error_response(error.into()))?;
        if let Some(notes) = input.notes {
            session
                .annotate(&input.component, notes)
                .map_err(|error| error_response(error.into()))?;
        }
    }

    for (index, photo) in request.photos.into_iter().enumerate() {
        let bytes = STANDARD.decode(photo.data.trim()).map_err(|_| {
            unprocessable(format!("photo {} ({}) is not valid base64", index + 1, photo.slot))
        })?;
        session
            .attach_photo(PhotoCapture {
                slot: photo.slot,
                bytes,
                captured_at: photo.captured_at.unwrap_or_else(Utc::now),
            })
            .map_err(|error| error_response(error.into()))?;
    }

    if let Some(notes) = request.notes {
        session.set_notes(notes);
    }
    Ok(session)
}

fn rating_from_input(input: RatingInput) -> Result<ComponentRating, SubmissionError> {
    let stars = StarRating::new(input.rating).map_err(ValidationError::from)?;
    let mut rating = ComponentRating::new(input.component, stars);
    rating.notes = input.notes;
    Ok(rating)
}

fn unprocessable(message: String) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
}

pub(crate) fn error_response(error: SubmissionError) -> Response {
    let status = match &error {
        SubmissionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmissionError::Template(_) => StatusCode::SERVICE_UNAVAILABLE,
        SubmissionError::Persistence(_) => StatusCode::BAD_GATEWAY,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
