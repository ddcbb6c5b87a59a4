use crate::cli::ServeArgs;
use crate::infra::{
    parametrage_demonstration, AppState, CourrierJournalise, MemoireDossiers,
};
use crate::routes::{with_api_routes, EtatService};
use admissup::config::AppConfig;
use admissup::error::AppError;
use admissup::telemetry;
use admissup::workflows::inscription::ImportService;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(MemoireDossiers::default());
    let parametrage = Arc::new(parametrage_demonstration());
    let courrier = Arc::new(CourrierJournalise::default());
    let service = Arc::new(ImportService::new(store, parametrage, courrier));

    let app = with_api_routes(EtatService {
        service,
        endpoint: config.parcoursup.endpoint.clone(),
    })
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "service d'inscription prêt");

    axum::serve(listener, app).await?;
    Ok(())
}
