//! Facility inspections: weighted component scoring and the photo evidence
//! pipeline that feeds a submission.
//!
//! A session collects star ratings and photos. Submitting it validates the
//! preconditions, runs each photo through compression, geotagging and
//! watermarking, uploads the results, and hands a versioned submission to
//! the persistence collaborator.

pub mod catalog;
pub mod domain;
pub mod geolocation;
pub mod persistence;
pub mod photo;
pub mod progress;
pub mod router;
pub mod scoring;
pub mod service;
pub mod session;
pub mod storage;
pub mod template;

#[cfg(test)]
mod tests;

pub use catalog::{
    CatalogError, ComponentCatalog, ComponentCategory, ComponentDefinition, ComponentId,
};
pub use domain::{
    ComponentRating, FacilityContext, GeoPoint, GeoTag, PhotoCapture, PhotoEvidence,
    PhotoProcessing, PhotoSlot, RatingError, RatingSheet, StarRating,
};
pub use geolocation::{
    DeviceLocator, DisabledGeocoder, GeocodeError, LocationAdapter, LocationError,
    NoDeviceLocation, NominatimGeocoder, PendingAddress, ReportedPosition, ResolvedLocation,
    ReverseGeocoder,
};
pub use persistence::{
    FailedPhoto, InspectionRecordRequest, InspectionSubmission, PersistenceError,
    PersistenceService, RecordId, SubmissionV1, UploadedPhoto,
};
pub use photo::{PhotoError, PhotoPipeline, WatermarkCanvas, WatermarkText};
pub use progress::{NoProgress, ProgressPhase, ProgressSink, SubmissionProgress, TracingProgress};
pub use router::{inspection_router, ReceiptView, SubmissionRequest};
pub use scoring::{score, CategoryScore, ScoreCard, ScoreStatus};
pub use service::{InspectionService, SubmissionError, SubmissionReceipt};
pub use session::{InspectionSession, ValidationError};
pub use storage::{LocalObjectStorage, ObjectStorage, StorageError, UploadObject};
pub use template::{
    FileTemplateProvider, InspectionTemplate, StaticTemplateProvider, TemplateError,
    TemplateProvider,
};
