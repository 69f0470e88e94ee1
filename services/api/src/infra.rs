use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use site_inspector::config::AppConfig;
use site_inspector::error::AppError;
use site_inspector::workflows::inspection::{
    DisabledGeocoder, FileTemplateProvider, InspectionRecordRequest, InspectionService,
    LocalObjectStorage, LocationAdapter, NominatimGeocoder, PersistenceError, PersistenceService,
    RecordId, ReverseGeocoder, StaticTemplateProvider, TemplateProvider,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) uploads_root: PathBuf,
}

pub(crate) type LocalInspectionService =
    InspectionService<LocalObjectStorage, InMemoryInspectionStore>;

/// Keeps submitted inspection records for the lifetime of the process.
#[derive(Default)]
pub(crate) struct InMemoryInspectionStore {
    records: Mutex<Vec<(RecordId, InspectionRecordRequest)>>,
    sequence: AtomicU64,
}

impl InMemoryInspectionStore {
    pub(crate) fn records(&self) -> Vec<(RecordId, InspectionRecordRequest)> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl PersistenceService for InMemoryInspectionStore {
    async fn create_inspection_record(
        &self,
        request: InspectionRecordRequest,
    ) -> Result<RecordId, PersistenceError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| PersistenceError::Unavailable("record store poisoned".to_string()))?;
        let next = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let id = RecordId(format!("insp-{next:06}"));
        guard.push((id.clone(), request));
        Ok(id)
    }
}

pub(crate) fn template_provider(config: &AppConfig) -> Arc<dyn TemplateProvider> {
    match &config.template_path {
        Some(path) => {
            info!(path = %path.display(), "loading inspection template from file");
            Arc::new(FileTemplateProvider::new(path.clone()))
        }
        None => Arc::new(StaticTemplateProvider::standard()),
    }
}

pub(crate) fn reverse_geocoder(config: &AppConfig) -> Result<Arc<dyn ReverseGeocoder>, AppError> {
    if !config.geocoder.enabled {
        return Ok(Arc::new(DisabledGeocoder));
    }
    let geocoder = NominatimGeocoder::new(&config.geocoder, config.pipeline.geocode_timeout)?;
    Ok(Arc::new(geocoder))
}

pub(crate) fn inspection_service(
    config: &AppConfig,
    store: Arc<InMemoryInspectionStore>,
) -> Result<LocalInspectionService, AppError> {
    let locations = LocationAdapter::from_config(reverse_geocoder(config)?, &config.pipeline);
    Ok(InspectionService::new(
        template_provider(config),
        Arc::new(LocalObjectStorage::from_config(&config.storage)),
        store,
        locations,
        config.pipeline.clone(),
    ))
}
