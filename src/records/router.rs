use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::repository::{EvaluationRecord, EvaluationRepository, RepositoryError};
use super::service::{EvaluationService, RecordServiceError};
use crate::scoring::{EmployeeProfile, ScoreMap, StatKey, StatPatch, StatRecord};

/// Wholesale stat upload; attributes are optional and merge into the stored profile.
#[derive(Debug, Deserialize)]
pub struct StatsUpload {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    pub stats: StatRecord,
}

/// Router builder exposing the stored-evaluation endpoints.
pub fn records_router<R>(service: Arc<EvaluationService<R>>) -> Router
where
    R: EvaluationRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/employees/:employee_id/periods/:year/stats",
            put(put_stats_handler::<R>).patch(patch_stats_handler::<R>),
        )
        .route(
            "/api/v1/employees/:employee_id/periods/:year/scores",
            put(rate_handler::<R>),
        )
        .route(
            "/api/v1/employees/:employee_id/periods/:year/evaluation",
            get(evaluation_handler::<R>),
        )
        .route(
            "/api/v1/evaluations/recalculate",
            post(recalculate_handler::<R>),
        )
        .with_state(service)
}

pub(crate) async fn put_stats_handler<R>(
    State(service): State<Arc<EvaluationService<R>>>,
    Path((employee_id, year)): Path<(String, i32)>,
    axum::Json(upload): axum::Json<StatsUpload>,
) -> Response
where
    R: EvaluationRepository + 'static,
{
    let profile = EmployeeProfile {
        employee_id,
        level: upload.level,
        section: upload.section,
        department: upload.department,
    };
    blocking(move || record_response(service.put_stats(profile, year, upload.stats))).await
}

pub(crate) async fn patch_stats_handler<R>(
    State(service): State<Arc<EvaluationService<R>>>,
    Path((employee_id, year)): Path<(String, i32)>,
    axum::Json(patch): axum::Json<StatPatch>,
) -> Response
where
    R: EvaluationRepository + 'static,
{
    let key = StatKey::new(employee_id, year);
    blocking(move || record_response(service.patch_stats(&key, patch))).await
}

pub(crate) async fn rate_handler<R>(
    State(service): State<Arc<EvaluationService<R>>>,
    Path((employee_id, year)): Path<(String, i32)>,
    axum::Json(scores): axum::Json<ScoreMap>,
) -> Response
where
    R: EvaluationRepository + 'static,
{
    let key = StatKey::new(employee_id, year);
    blocking(move || record_response(service.rate(&key, scores))).await
}

pub(crate) async fn evaluation_handler<R>(
    State(service): State<Arc<EvaluationService<R>>>,
    Path((employee_id, year)): Path<(String, i32)>,
) -> Response
where
    R: EvaluationRepository + 'static,
{
    let key = StatKey::new(employee_id, year);
    blocking(move || record_response(service.record(&key))).await
}

pub(crate) async fn recalculate_handler<R>(
    State(service): State<Arc<EvaluationService<R>>>,
) -> Response
where
    R: EvaluationRepository + 'static,
{
    blocking(move || match service.recalculate_all() {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(EvaluationRecord::view).collect();
            let payload = json!({
                "recalculated": views.len(),
                "evaluations": views,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    })
    .await
}

/// Runs a service call on tokio's blocking pool. Repository locks and the
/// rayon fan-out never occupy an async worker.
async fn blocking<F>(task: F) -> Response
where
    F: FnOnce() -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(error = %join_error, "evaluation task did not complete");
            let payload = json!({
                "error": "evaluation task did not complete",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn record_response(result: Result<EvaluationRecord, RecordServiceError>) -> Response {
    match result {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: RecordServiceError) -> Response {
    let status = match &error {
        RecordServiceError::MissingEmployeeId => StatusCode::UNPROCESSABLE_ENTITY,
        RecordServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        RecordServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
