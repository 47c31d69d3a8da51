use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::records::repository::{EvaluationRecord, EvaluationRepository, RepositoryError};
use crate::records::{records_router, EvaluationService, MemoryEvaluationRepository};
use crate::scoring::StatKey;

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn stats_upload_returns_the_calculated_view() {
    let (service, _) = build_service();
    let router = records_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "PUT",
            "/api/v1/employees/E-1/periods/2025/stats",
            json!({
                "level": "Staff",
                "stats": { "absence_days": 2, "imported_score": 50 }
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["employee_id"], "E-1");
    assert_eq!(payload["period_year"], 2025);
    assert_eq!(payload["status"], "calculated");
    assert_eq!(payload["discipline_score"], 6.0);
    assert_eq!(payload["total_score"], 21.0);
    assert_eq!(payload["grade"], "NI");
}

#[tokio::test]
async fn scores_and_patch_routes_update_the_stored_record() {
    let (service, _) = build_service();
    let service = Arc::new(service);
    service
        .put_stats(profile("E-1"), YEAR, stats())
        .expect("stats stored");

    let response = records_router(service.clone())
        .oneshot(json_request(
            "PUT",
            "/api/v1/employees/E-1/periods/2025/scores",
            json!({ "Q1": 5 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["total_score"], 71.0);

    let response = records_router(service.clone())
        .oneshot(json_request(
            "PATCH",
            "/api/v1/employees/E-1/periods/2025/stats",
            json!({ "absence_days": 0 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total_score"], 75.0);
    assert_eq!(payload["grade"], "ME");
}

#[tokio::test]
async fn evaluation_route_reports_missing_records() {
    let (service, _) = build_service();

    let response = records_router(Arc::new(service))
        .oneshot(
            Request::get("/api/v1/employees/E-404/periods/2025/evaluation")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "record not found");
}

#[tokio::test]
async fn recalculate_route_counts_every_record() {
    let (service, _) = build_service();
    let service = Arc::new(service);
    for employee in ["E-1", "E-2", "E-3"] {
        service
            .put_stats(profile(employee), YEAR, stats())
            .expect("stats stored");
    }

    let response = records_router(service)
        .oneshot(
            Request::post("/api/v1/evaluations/recalculate")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["recalculated"], 3);
    assert_eq!(payload["evaluations"][0]["employee_id"], "E-1");
}

#[tokio::test]
async fn repository_outage_maps_to_service_unavailable() {
    let service = EvaluationService::new(Arc::new(UnavailableRepository), engine());

    let response = records_router(Arc::new(service))
        .oneshot(json_request(
            "PUT",
            "/api/v1/employees/E-1/periods/2025/scores",
            json!({ "Q1": 3 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// Holds every write until the test flips `release`, giving up after a few seconds.
#[derive(Default)]
struct GatedRepository {
    inner: MemoryEvaluationRepository,
    entered: AtomicBool,
    release: AtomicBool,
}

impl GatedRepository {
    fn wait_for_release(&self) -> Result<(), RepositoryError> {
        self.entered.store(true, Ordering::SeqCst);
        let started = Instant::now();
        while !self.release.load(Ordering::SeqCst) {
            if started.elapsed() > Duration::from_secs(5) {
                return Err(RepositoryError::Unavailable("write never released".to_string()));
            }
            std::thread::yield_now();
        }
        Ok(())
    }
}

impl EvaluationRepository for GatedRepository {
    fn fetch(&self, key: &StatKey) -> Result<Option<EvaluationRecord>, RepositoryError> {
        self.inner.fetch(key)
    }

    fn all(&self) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        self.inner.all()
    }

    fn update<F>(&self, key: &StatKey, apply: F) -> Result<EvaluationRecord, RepositoryError>
    where
        F: FnOnce(&mut EvaluationRecord),
    {
        self.wait_for_release()?;
        self.inner.update(key, apply)
    }

    fn update_existing<F>(
        &self,
        key: &StatKey,
        apply: F,
    ) -> Result<EvaluationRecord, RepositoryError>
    where
        F: FnOnce(&mut EvaluationRecord),
    {
        self.wait_for_release()?;
        self.inner.update_existing(key, apply)
    }
}

#[tokio::test(flavor = "current_thread")]
async fn blocking_repository_work_leaves_the_runtime_free() {
    let repository = Arc::new(GatedRepository::default());
    let service = EvaluationService::new(repository.clone(), engine());
    let router = records_router(Arc::new(service));

    let request = tokio::spawn(router.oneshot(json_request(
        "PUT",
        "/api/v1/employees/E-1/periods/2025/scores",
        json!({ "Q1": 4 }),
    )));

    // Only reachable while the write waits off the single runtime thread.
    while !repository.entered.load(Ordering::SeqCst) {
        tokio::task::yield_now().await;
    }
    repository.release.store(true, Ordering::SeqCst);

    let response = request
        .await
        .expect("task joins")
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["total_score"], 50.0);
}
