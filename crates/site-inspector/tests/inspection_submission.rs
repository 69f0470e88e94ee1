//! End-to-end inspection submissions through the public service facade,
//! backed by the local object store and a file-based template.

mod common {
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};

    use site_inspector::config::PipelineConfig;
    use site_inspector::workflows::inspection::{
        FacilityContext, InspectionRecordRequest, InspectionService, LocalObjectStorage,
        LocationAdapter, PersistenceError, PersistenceService, PhotoCapture, PhotoSlot, RecordId,
        TemplateProvider,
    };

    pub(super) const PUBLIC_URL: &str = "https://evidence.example.test/files";

    pub(super) fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8])
        });
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, 90)
            .encode_image(&image)
            .expect("encode jpeg");
        bytes
    }

    pub(super) fn capture(slot: PhotoSlot, width: u32, height: u32) -> PhotoCapture {
        PhotoCapture {
            slot,
            bytes: jpeg(width, height),
            captured_at: Utc::now(),
        }
    }

    pub(super) fn kiosk() -> FacilityContext {
        FacilityContext {
            location_id: "kiosk-7".to_string(),
            location_name: "Gate B Kiosk Restroom".to_string(),
        }
    }

    #[derive(Default)]
    pub(super) struct RecordBook {
        requests: Mutex<Vec<InspectionRecordRequest>>,
    }

    impl RecordBook {
        pub(super) fn requests(&self) -> Vec<InspectionRecordRequest> {
            self.requests.lock().expect("records mutex poisoned").clone()
        }
    }

    #[async_trait]
    impl PersistenceService for RecordBook {
        async fn create_inspection_record(
            &self,
            request: InspectionRecordRequest,
        ) -> Result<RecordId, PersistenceError> {
            let mut requests = self.requests.lock().expect("records mutex poisoned");
            requests.push(request);
            Ok(RecordId(format!("rec-{}", requests.len())))
        }
    }

    pub(super) fn build_service(
        templates: Arc<dyn TemplateProvider>,
        uploads: &Path,
        records: Arc<RecordBook>,
    ) -> InspectionService<LocalObjectStorage, RecordBook> {
        let pipeline = PipelineConfig {
            max_dimension: 800,
            ..PipelineConfig::default()
        };
        InspectionService::new(
            templates,
            Arc::new(LocalObjectStorage::new(uploads, PUBLIC_URL)),
            records,
            LocationAdapter::coordinates_only(Duration::from_secs(1)),
            pipeline,
        )
    }
}

mod local_store {
    use super::common::*;
    use std::sync::Arc;

    use site_inspector::workflows::inspection::{
        ComponentId, GeoPoint, InspectionSubmission, NoProgress, PhotoSlot, ReportedPosition,
        ScoreStatus, StaticTemplateProvider,
    };

    #[tokio::test]
    async fn submission_writes_watermarked_evidence_to_disk() {
        let uploads = tempfile::tempdir().expect("tempdir");
        let records = Arc::new(RecordBook::default());
        let service = build_service(
            Arc::new(StaticTemplateProvider::standard()),
            uploads.path(),
            records.clone(),
        );

        let mut session = service
            .open_session(kiosk(), "inspector-3")
            .await
            .expect("template");
        let required: Vec<ComponentId> = session
            .template()
            .catalog
            .required()
            .map(|definition| definition.id.clone())
            .collect();
        for id in &required {
            session.rate(id, 3).expect("rated");
        }
        session
            .attach_photo(capture(PhotoSlot::General, 2400, 1600))
            .expect("attached");
        session
            .attach_photo(capture(
                PhotoSlot::Component(ComponentId::new("sink_and_mirror")),
                900,
                1200,
            ))
            .expect("attached");

        let position = GeoPoint::new(-6.2, 106.8).expect("valid point");
        let receipt = service
            .submit(session, &ReportedPosition(Some(position)), &NoProgress)
            .await
            .expect("submitted");

        assert_eq!(receipt.record_id.0, "rec-1");
        assert_eq!(receipt.score(), 60);
        assert_eq!(receipt.status(), ScoreStatus::Fair);
        assert_eq!(receipt.photo_urls().len(), 2);

        for url in receipt.photo_urls() {
            let key = url
                .strip_prefix(&format!("{PUBLIC_URL}/"))
                .expect("url under public prefix");
            assert!(key.starts_with("inspections/kiosk-7/"));
            let stored = std::fs::read(uploads.path().join(key)).expect("object on disk");
            let image = image::load_from_memory(&stored).expect("stored jpeg decodes");
            assert!(image.width().max(image.height()) <= 800);
        }

        let sink = receipt
            .submission
            .ratings()
            .iter()
            .find(|rating| rating.component == ComponentId::new("sink_and_mirror"))
            .and_then(|rating| rating.photo_ref.clone());
        assert_eq!(sink.as_deref(), Some(receipt.photo_urls()[1].as_str()));

        let requests = records.requests();
        let InspectionSubmission::V1(body) = &requests[0].submission;
        let tag = body.photos[0].geotag.as_ref().expect("geotagged");
        assert_eq!((tag.lat, tag.lng), (-6.2, 106.8));
    }

    #[tokio::test]
    async fn submission_payload_is_tagged_with_its_schema_version() {
        let uploads = tempfile::tempdir().expect("tempdir");
        let records = Arc::new(RecordBook::default());
        let service = build_service(
            Arc::new(StaticTemplateProvider::standard()),
            uploads.path(),
            records.clone(),
        );

        let mut session = service
            .open_session(kiosk(), "inspector-3")
            .await
            .expect("template");
        let required: Vec<ComponentId> = session
            .template()
            .catalog
            .required()
            .map(|definition| definition.id.clone())
            .collect();
        for id in &required {
            session.rate(id, 5).expect("rated");
        }
        session
            .attach_photo(capture(PhotoSlot::General, 640, 480))
            .expect("attached");

        service
            .submit(session, &ReportedPosition(None), &NoProgress)
            .await
            .expect("submitted");

        let payload = serde_json::to_value(&records.requests()[0].submission).expect("json");
        assert_eq!(payload["schema_version"], "v1");
        assert_eq!(payload["score"], 100);
        assert_eq!(payload["status"], "excellent");
        assert!(payload["photos"][0].get("geotag").is_none());
    }
}

mod file_template {
    use super::common::*;
    use std::sync::Arc;

    use site_inspector::workflows::inspection::{
        ComponentId, FileTemplateProvider, NoDeviceLocation, NoProgress, PhotoSlot, ScoreStatus,
        SubmissionError, ValidationError,
    };

    const KIOSK_TEMPLATE: &str = r#"{
        "id": "kiosk-v2",
        "name": "Kiosk restroom",
        "components": [
            {"id": "floor", "label": "Floor", "category": "visual", "weight": 3.0,
             "required": true, "allow_photo": true},
            {"id": "paper", "label": "Paper towels", "category": "availability", "weight": 1.0,
             "required": true, "allow_photo": false}
        ]
    }"#;

    #[tokio::test]
    async fn file_template_drives_scoring_and_record_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let template_path = dir.path().join("template.json");
        std::fs::write(&template_path, KIOSK_TEMPLATE).expect("write template");
        let records = Arc::new(RecordBook::default());
        let service = build_service(
            Arc::new(FileTemplateProvider::new(&template_path)),
            &dir.path().join("uploads"),
            records.clone(),
        );

        let mut session = service
            .open_session(kiosk(), "inspector-3")
            .await
            .expect("template");
        session.rate(&ComponentId::new("floor"), 5).expect("rated");
        let card = session.rate(&ComponentId::new("paper"), 1).expect("rated");
        assert_eq!(card.score, 80);
        assert_eq!(card.status, ScoreStatus::Good);

        let refused = session.attach_photo(capture(
            PhotoSlot::Component(ComponentId::new("paper")),
            320,
            240,
        ));
        assert!(matches!(refused, Err(ValidationError::PhotoNotAllowed(_))));
        session
            .attach_photo(capture(PhotoSlot::General, 320, 240))
            .expect("attached");

        let receipt = service
            .submit(session, &NoDeviceLocation, &NoProgress)
            .await
            .expect("submitted");

        assert_eq!(receipt.score(), 80);
        assert_eq!(records.requests()[0].template_id, "kiosk-v2");
    }

    #[tokio::test]
    async fn missing_template_file_blocks_new_sessions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = build_service(
            Arc::new(FileTemplateProvider::new(dir.path().join("absent.json"))),
            dir.path(),
            Arc::new(RecordBook::default()),
        );

        let result = service.open_session(kiosk(), "inspector-3").await;
        assert!(matches!(
            result,
            Err(SubmissionError::Validation(ValidationError::MissingTemplate))
        ));
    }
}

mod http {
    use super::common::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use site_inspector::workflows::inspection::{inspection_router, StaticTemplateProvider};

    #[tokio::test]
    async fn post_inspection_stores_photos_and_returns_receipt() {
        let uploads = tempfile::tempdir().expect("tempdir");
        let records = Arc::new(RecordBook::default());
        let router = inspection_router(Arc::new(build_service(
            Arc::new(StaticTemplateProvider::standard()),
            uploads.path(),
            records.clone(),
        )));

        let ratings: Vec<Value> = [
            "odor",
            "floor_cleanliness",
            "toilet_cleanliness",
            "sink_and_mirror",
            "flush_function",
            "faucet_function",
            "soap_supply",
            "tissue_supply",
        ]
        .iter()
        .map(|id| json!({"component": id, "rating": 2}))
        .collect();
        let body = json!({
            "location_id": "kiosk-7",
            "location_name": "Gate B Kiosk Restroom",
            "user_id": "inspector-3",
            "ratings": ratings,
            "photos": [{"slot": {"kind": "general"}, "data": STANDARD.encode(jpeg(400, 300))}]
        });

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/inspections")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
            .expect("request");
        let response = router.oneshot(request).await.expect("router dispatch");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload["record_id"], "rec-1");
        assert_eq!(payload["score"], 40);
        assert_eq!(payload["status"], "poor");

        let url = payload["photo_urls"][0].as_str().expect("photo url");
        let key = url
            .strip_prefix(&format!("{PUBLIC_URL}/"))
            .expect("url under public prefix");
        assert!(uploads.path().join(key).is_file());
        assert_eq!(records.requests().len(), 1);
    }
}
