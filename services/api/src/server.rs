use crate::cli::ServeArgs;
use crate::infra::{build_live_service, AppState};
use crate::routes::with_delivery_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hub_connect::config::AppConfig;
use hub_connect::error::AppError;
use hub_connect::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

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
    };

    if config.workflow.webhook_url.is_none() {
        warn!("WORKFLOW_WEBHOOK_URL not set, workflow forwarding disabled");
    }
    let service = build_live_service(&config)?;

    let app = with_delivery_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        gateway = %config.gateway.base_url,
        max_retries = config.delivery.max_retries,
        "notification hub ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
