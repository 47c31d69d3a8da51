use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use staff_appraisal::records::{records_router, EvaluationRepository, EvaluationService};
use staff_appraisal::scoring::{
    classify, EmployeeProfile, EngineConfig, EngineOutput, EvaluationInput, GradeBucket,
    IntegrityWarning, Question, Rule, ScoreMap, ScoringEngine, StatRecord,
};
use std::sync::Arc;

/// Ad-hoc evaluation: rules and inputs travel together, nothing is stored.
#[derive(Debug, Deserialize)]
pub(crate) struct EvaluateRequest {
    pub(crate) rules: Vec<Rule>,
    #[serde(default)]
    pub(crate) questions: Vec<Question>,
    #[serde(default)]
    pub(crate) employee: EmployeeProfile,
    #[serde(default)]
    pub(crate) stats: Option<StatRecord>,
    #[serde(default)]
    pub(crate) scores: ScoreMap,
    #[serde(default)]
    pub(crate) grade_table: Option<Vec<GradeBucket>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluateResponse {
    #[serde(flatten)]
    pub(crate) output: EngineOutput,
    /// Static advisories for the submitted rules, independent of this employee.
    pub(crate) advisories: Vec<IntegrityWarning>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassifyRequest {
    pub(crate) score: f64,
    #[serde(default)]
    pub(crate) table: Option<Vec<GradeBucket>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidateRequest {
    pub(crate) rules: Vec<Rule>,
    #[serde(default)]
    pub(crate) questions: Vec<Question>,
    #[serde(default)]
    pub(crate) stat_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ValidateResponse {
    pub(crate) rule_count: usize,
    pub(crate) warnings: Vec<IntegrityWarning>,
}

pub(crate) fn with_scoring_routes<R>(service: Arc<EvaluationService<R>>) -> axum::Router
where
    R: EvaluationRepository + 'static,
{
    records_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/evaluate", axum::routing::post(evaluate_endpoint))
        .route(
            "/api/v1/grades/classify",
            axum::routing::post(classify_endpoint),
        )
        .route(
            "/api/v1/rules/validate",
            axum::routing::post(validate_endpoint),
        )
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

pub(crate) async fn evaluate_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<EvaluateRequest>,
) -> Json<EvaluateResponse> {
    let EvaluateRequest {
        rules,
        questions,
        employee,
        stats,
        scores,
        grade_table,
    } = payload;

    let mut config = EngineConfig::clone(&state.scoring);
    if let Some(table) = grade_table.filter(|table| !table.is_empty()) {
        config.grade_table = table;
    }

    let stat_fields: Vec<String> = stats
        .as_ref()
        .map(|stats| stats.extra.keys().cloned().collect())
        .unwrap_or_default();
    let engine = ScoringEngine::new(rules, questions, config);
    let output = engine.evaluate(&EvaluationInput {
        employee,
        stats,
        scores,
    });
    let advisories = engine.integrity_report(&borrowed(&stat_fields));

    Json(EvaluateResponse { output, advisories })
}

pub(crate) async fn classify_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ClassifyRequest>,
) -> Json<GradeBucket> {
    let table = payload
        .table
        .filter(|table| !table.is_empty())
        .unwrap_or_else(|| state.scoring.grade_table.clone());
    Json(classify(payload.score, Some(&table)))
}

pub(crate) async fn validate_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ValidateRequest>,
) -> Json<ValidateResponse> {
    let rule_count = payload.rules.len();
    let engine = ScoringEngine::new(
        payload.rules,
        payload.questions,
        EngineConfig::clone(&state.scoring),
    );
    let warnings = engine.integrity_report(&borrowed(&payload.stat_fields));
    Json(ValidateResponse {
        rule_count,
        warnings,
    })
}

fn borrowed(fields: &[String]) -> Vec<&str> {
    fields.iter().map(String::as_str).collect()
}
