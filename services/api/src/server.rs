use crate::cli::ServeArgs;
use crate::infra::{inspection_service, AppState, InMemoryInspectionStore};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use site_inspector::config::AppConfig;
use site_inspector::error::AppError;
use site_inspector::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        uploads_root: config.storage.root.clone(),
    };

    let store = Arc::new(InMemoryInspectionStore::default());
    let service = Arc::new(inspection_service(&config, store)?);

    let app = with_service_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        uploads = %config.storage.root.display(),
        geocoder = config.geocoder.enabled,
        "inspection service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
