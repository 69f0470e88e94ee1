use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde_json::json;
use site_inspector::workflows::inspection::{
    inspection_router, InspectionService, ObjectStorage, PersistenceService,
};
use std::path::{Component, PathBuf};
use std::sync::Arc;

pub(crate) fn with_service_routes<S, P>(service: Arc<InspectionService<S, P>>) -> axum::Router
where
    S: ObjectStorage + 'static,
    P: PersistenceService + 'static,
{
    inspection_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/uploads/*key", axum::routing::get(upload_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Serves evidence written by the local object store.
pub(crate) async fn upload_endpoint(
    Extension(state): Extension<AppState>,
    Path(key): Path<String>,
) -> Response {
    let Some(path) = resolve_upload(&state.uploads_root, &key) else {
        return not_found(&key);
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type.to_string())],
                bytes,
            )
                .into_response()
        }
        Err(_) => not_found(&key),
    }
}

fn resolve_upload(root: &std::path::Path, key: &str) -> Option<PathBuf> {
    let relative = std::path::Path::new(key);
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    (safe && !key.is_empty()).then(|| root.join(relative))
}

fn not_found(key: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("upload '{key}' not found") })),
    )
        .into_response()
}
