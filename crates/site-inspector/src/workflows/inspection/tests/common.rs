use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::workflows::inspection::catalog::ComponentId;
use crate::workflows::inspection::domain::{FacilityContext, GeoPoint, PhotoCapture, PhotoSlot};
use crate::workflows::inspection::geolocation::{GeocodeError, LocationAdapter, ReverseGeocoder};
use crate::workflows::inspection::persistence::{
    InspectionRecordRequest, PersistenceError, PersistenceService, RecordId,
};
use crate::workflows::inspection::photo::test_support::sample_jpeg;
use crate::workflows::inspection::progress::SubmissionProgress;
use crate::workflows::inspection::session::InspectionSession;
use crate::workflows::inspection::storage::{ObjectStorage, StorageError, UploadObject};
use crate::workflows::inspection::template::{
    InspectionTemplate, StaticTemplateProvider, TemplateError, TemplateProvider,
};
use crate::workflows::inspection::InspectionService;

pub(super) fn facility() -> FacilityContext {
    FacilityContext {
        location_id: "loc-042".to_string(),
        location_name: "Terminal 3 Restroom West".to_string(),
    }
}

pub(super) fn component(id: &str) -> ComponentId {
    ComponentId::new(id)
}

pub(super) fn jakarta() -> GeoPoint {
    GeoPoint::new(-6.125567, 106.655897).expect("valid point")
}

pub(super) fn photo(slot: PhotoSlot) -> PhotoCapture {
    PhotoCapture {
        slot,
        bytes: sample_jpeg(320, 240),
        captured_at: Utc::now(),
    }
}

/// Session with every required component rated 4 stars and no photos.
pub(super) fn rated_session() -> InspectionSession {
    let template = InspectionTemplate::standard();
    let required: Vec<ComponentId> = template
        .catalog
        .required()
        .map(|definition| definition.id.clone())
        .collect();
    let mut session = InspectionSession::new(template, facility(), "inspector-9");
    for id in required {
        session.rate(&id, 4).expect("rated");
    }
    session
}

/// General photo first, then two component photos.
pub(super) fn three_photo_session() -> InspectionSession {
    let mut session = rated_session();
    session.attach_photo(photo(PhotoSlot::General)).expect("attached");
    session
        .attach_photo(photo(PhotoSlot::Component(component("floor_cleanliness"))))
        .expect("attached");
    session
        .attach_photo(photo(PhotoSlot::Component(component("toilet_cleanliness"))))
        .expect("attached");
    session
}

pub(super) fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        max_dimension: 640,
        ..PipelineConfig::default()
    }
}

pub(super) fn build_service<P>(
    storage: Arc<RecordingStorage>,
    persistence: Arc<P>,
) -> InspectionService<RecordingStorage, P>
where
    P: PersistenceService + 'static,
{
    build_service_with(
        Arc::new(StaticTemplateProvider::standard()),
        storage,
        persistence,
        LocationAdapter::coordinates_only(Duration::from_secs(1)),
    )
}

pub(super) fn build_service_with<P>(
    templates: Arc<dyn TemplateProvider>,
    storage: Arc<RecordingStorage>,
    persistence: Arc<P>,
    locations: LocationAdapter,
) -> InspectionService<RecordingStorage, P>
where
    P: PersistenceService + 'static,
{
    InspectionService::new(templates, storage, persistence, locations, pipeline_config())
}

/// Object store that records every call and fails the calls listed in
/// `failing_calls` (1-based).
#[derive(Default)]
pub(super) struct RecordingStorage {
    uploads: Mutex<Vec<UploadObject>>,
    failing_calls: BTreeSet<usize>,
}

impl RecordingStorage {
    pub(super) fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            failing_calls: calls.into_iter().collect(),
        }
    }

    pub(super) fn uploads(&self) -> Vec<UploadObject> {
        self.uploads.lock().expect("storage mutex poisoned").clone()
    }

    pub(super) fn upload_count(&self) -> usize {
        self.uploads.lock().expect("storage mutex poisoned").len()
    }
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn upload(&self, object: UploadObject) -> Result<String, StorageError> {
        let mut uploads = self.uploads.lock().expect("storage mutex poisoned");
        let key = object.key.clone();
        uploads.push(object);
        if self.failing_calls.contains(&uploads.len()) {
            return Err(StorageError::Backend("simulated outage".to_string()));
        }
        Ok(format!("https://cdn.test/{key}"))
    }
}

#[derive(Default)]
pub(super) struct MemoryPersistence {
    requests: Mutex<Vec<InspectionRecordRequest>>,
}

impl MemoryPersistence {
    pub(super) fn requests(&self) -> Vec<InspectionRecordRequest> {
        self.requests
            .lock()
            .expect("persistence mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl PersistenceService for MemoryPersistence {
    async fn create_inspection_record(
        &self,
        request: InspectionRecordRequest,
    ) -> Result<RecordId, PersistenceError> {
        let mut requests = self.requests.lock().expect("persistence mutex poisoned");
        requests.push(request);
        Ok(RecordId(format!("insp-{:04}", requests.len())))
    }
}

pub(super) struct RejectingPersistence(pub(super) &'static str);

#[async_trait]
impl PersistenceService for RejectingPersistence {
    async fn create_inspection_record(
        &self,
        _request: InspectionRecordRequest,
    ) -> Result<RecordId, PersistenceError> {
        Err(PersistenceError::Rejected(self.0.to_string()))
    }
}

pub(super) struct UnavailableTemplates;

#[async_trait]
impl TemplateProvider for UnavailableTemplates {
    async fn default_template(&self) -> Result<Option<InspectionTemplate>, TemplateError> {
        Err(TemplateError::Unavailable("template service offline".to_string()))
    }
}

/// Reverse geocoder that never answers.
pub(super) struct HangingGeocoder;

#[async_trait]
impl ReverseGeocoder for HangingGeocoder {
    async fn reverse_geocode(&self, _point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(Some("far too late".to_string()))
    }
}

pub(super) struct FixedGeocoder(pub(super) &'static str);

#[async_trait]
impl ReverseGeocoder for FixedGeocoder {
    async fn reverse_geocode(&self, _point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        Ok(Some(self.0.to_string()))
    }
}

/// Collects progress events for later inspection.
#[derive(Default)]
pub(super) struct ProgressLog {
    events: Mutex<Vec<SubmissionProgress>>,
}

impl ProgressLog {
    pub(super) fn record(&self, progress: SubmissionProgress) {
        self.events
            .lock()
            .expect("progress mutex poisoned")
            .push(progress);
    }

    pub(super) fn percentages(&self) -> Vec<u8> {
        self.events
            .lock()
            .expect("progress mutex poisoned")
            .iter()
            .map(|event| event.percentage)
            .collect()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
