use std::collections::BTreeMap;
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::records::repository::{EvaluationRecord, EvaluationRepository, RepositoryError};
use crate::records::{EvaluationService, MemoryEvaluationRepository};
use crate::scoring::{
    EmployeeProfile, EngineConfig, Question, Rule, ScoringEngine, StatKey, StatRecord,
};

pub(super) const YEAR: i32 = 2025;

pub(super) fn questions() -> Vec<Question> {
    vec![
        Question {
            id: "Q1".to_string(),
            title: "Teamwork".to_string(),
            max_score: 5.0,
            is_read_only: false,
        },
        Question {
            id: "KPI-1".to_string(),
            title: "Imported assessment".to_string(),
            max_score: 100.0,
            is_read_only: true,
        },
    ]
}

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule::variable("v1", "Absence Penalty", "absence_days * 2"),
        Rule::score("s1", "Discipline Score", "max(10 - [Absence Penalty], 0)"),
        Rule::score(
            "s2",
            "Total Score",
            "[Q1] * 10 + [Discipline Score] + [KPI-1] * 0.3",
        ),
    ]
}

pub(super) fn engine() -> Arc<ScoringEngine> {
    Arc::new(ScoringEngine::new(rules(), questions(), EngineConfig::default()))
}

pub(super) fn build_service() -> (
    EvaluationService<MemoryEvaluationRepository>,
    Arc<MemoryEvaluationRepository>,
) {
    let repository = Arc::new(MemoryEvaluationRepository::default());
    let service = EvaluationService::new(repository.clone(), engine());
    (service, repository)
}

pub(super) fn profile(employee_id: &str) -> EmployeeProfile {
    EmployeeProfile {
        employee_id: employee_id.to_string(),
        level: Some("Staff".to_string()),
        section: Some("Assembly".to_string()),
        department: None,
    }
}

/// Two absence days and an imported assessment of 50.
pub(super) fn stats() -> StatRecord {
    StatRecord {
        absence_days: 2.0,
        extra: BTreeMap::from([("imported_score".to_string(), 50.0)]),
        ..StatRecord::default()
    }
}

pub(super) fn key(employee_id: &str) -> StatKey {
    StatKey::new(employee_id, YEAR)
}

pub(super) struct UnavailableRepository;

impl EvaluationRepository for UnavailableRepository {
    fn fetch(&self, _key: &StatKey) -> Result<Option<EvaluationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update<F>(&self, _key: &StatKey, _apply: F) -> Result<EvaluationRecord, RepositoryError>
    where
        F: FnOnce(&mut EvaluationRecord),
    {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_existing<F>(
        &self,
        _key: &StatKey,
        _apply: F,
    ) -> Result<EvaluationRecord, RepositoryError>
    where
        F: FnOnce(&mut EvaluationRecord),
    {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
