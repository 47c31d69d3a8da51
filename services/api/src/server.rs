use crate::cli::ServeArgs;
use crate::infra::{build_engine, AppState};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use staff_appraisal::config::AppConfig;
use staff_appraisal::error::AppError;
use staff_appraisal::records::{EvaluationService, MemoryEvaluationRepository};
use staff_appraisal::telemetry;
use std::sync::atomic::Ordering;
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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        scoring: Arc::new(config.scoring.clone()),
    };

    let engine = build_engine(
        args.rules.as_ref(),
        args.questions.as_ref(),
        config.scoring.clone(),
    )?;
    for advisory in engine.integrity_report(&[]) {
        warn!(
            rule = %advisory.rule,
            kind = advisory.kind.as_str(),
            detail = %advisory.detail,
            "rule set advisory"
        );
    }

    let repository = Arc::new(MemoryEvaluationRepository::default());
    let evaluation_service = Arc::new(EvaluationService::new(repository, Arc::new(engine)));

    let app = with_scoring_routes(evaluation_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, rounds = config.scoring.rounds, "appraisal scoring service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
