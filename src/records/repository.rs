use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::{
    DisciplineScore, EmployeeProfile, EngineOutput, EvaluationInput, IntegrityWarning, ScoreMap,
    StatKey, StatRecord,
};

/// Lifecycle of a stored evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Pending,
    Calculated,
    Degraded,
}

impl EvaluationStatus {
    pub fn label(self) -> &'static str {
        match self {
            EvaluationStatus::Pending => "pending",
            EvaluationStatus::Calculated => "calculated",
            EvaluationStatus::Degraded => "degraded",
        }
    }

    pub(crate) fn for_output(output: &EngineOutput) -> Self {
        if output.is_degraded() {
            EvaluationStatus::Degraded
        } else {
            EvaluationStatus::Calculated
        }
    }
}

/// Persisted inputs and latest engine output for one employee/period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub key: StatKey,
    pub profile: EmployeeProfile,
    pub stats: Option<StatRecord>,
    pub scores: ScoreMap,
    pub status: EvaluationStatus,
    pub output: Option<EngineOutput>,
    pub updated_at: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn new(key: StatKey) -> Self {
        let profile = EmployeeProfile {
            employee_id: key.employee_id.clone(),
            ..EmployeeProfile::default()
        };
        Self {
            key,
            profile,
            stats: None,
            scores: ScoreMap::new(),
            status: EvaluationStatus::Pending,
            output: None,
            updated_at: Utc::now(),
        }
    }

    pub fn input(&self) -> EvaluationInput {
        EvaluationInput {
            employee: self.profile.clone(),
            stats: self.stats.clone(),
            scores: self.scores.clone(),
        }
    }

    /// Whether both records would feed the engine the same input.
    pub(crate) fn same_inputs(&self, other: &EvaluationRecord) -> bool {
        self.profile == other.profile && self.stats == other.stats && self.scores == other.scores
    }

    pub(crate) fn store_output(&mut self, output: EngineOutput) {
        self.status = EvaluationStatus::for_output(&output);
        self.output = Some(output);
        self.updated_at = Utc::now();
    }

    pub fn view(&self) -> EvaluationView {
        let output = self.output.as_ref();
        EvaluationView {
            employee_id: self.key.employee_id.clone(),
            period_year: self.key.period_year,
            status: self.status.label(),
            discipline_score: output
                .map(|output| output.discipline_score)
                .unwrap_or(DisciplineScore::Missing),
            total_score: output.map(|output| output.total_score),
            grade: output.map(|output| output.grade.clone()),
            score_map: output
                .map(|output| output.score_map.clone())
                .unwrap_or_else(|| self.scores.clone()),
            warnings: output
                .map(|output| output.warnings.clone())
                .unwrap_or_default(),
            updated_at: self.updated_at,
        }
    }
}

/// Response shape for the evaluation endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationView {
    pub employee_id: String,
    pub period_year: i32,
    pub status: &'static str,
    pub discipline_score: DisciplineScore,
    pub total_score: Option<f64>,
    pub grade: Option<String>,
    pub score_map: ScoreMap,
    pub warnings: Vec<IntegrityWarning>,
    pub updated_at: DateTime<Utc>,
}

/// Storage abstraction so the service module can be exercised in isolation.
///
/// `update` and `update_existing` are the only write paths. Implementations run
/// `apply` and store its result with no other write to the same key in between.
pub trait EvaluationRepository: Send + Sync {
    fn fetch(&self, key: &StatKey) -> Result<Option<EvaluationRecord>, RepositoryError>;
    fn all(&self) -> Result<Vec<EvaluationRecord>, RepositoryError>;

    /// Applies `apply` to the record under `key`, starting a fresh one when absent.
    fn update<F>(&self, key: &StatKey, apply: F) -> Result<EvaluationRecord, RepositoryError>
    where
        F: FnOnce(&mut EvaluationRecord);

    /// Like `update`, but a missing record is `NotFound`.
    fn update_existing<F>(
        &self,
        key: &StatKey,
        apply: F,
    ) -> Result<EvaluationRecord, RepositoryError>
    where
        F: FnOnce(&mut EvaluationRecord);
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Process-local store used by the API server and tests.
#[derive(Debug, Default)]
pub struct MemoryEvaluationRepository {
    records: Mutex<BTreeMap<StatKey, EvaluationRecord>>,
}

impl MemoryEvaluationRepository {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<StatKey, EvaluationRecord>>, RepositoryError>
    {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("record store lock poisoned".to_string()))
    }
}

impl EvaluationRepository for MemoryEvaluationRepository {
    fn fetch(&self, key: &StatKey) -> Result<Option<EvaluationRecord>, RepositoryError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn all(&self) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn update<F>(&self, key: &StatKey, apply: F) -> Result<EvaluationRecord, RepositoryError>
    where
        F: FnOnce(&mut EvaluationRecord),
    {
        let mut records = self.lock()?;
        let record = records
            .entry(key.clone())
            .or_insert_with(|| EvaluationRecord::new(key.clone()));
        apply(record);
        Ok(record.clone())
    }

    fn update_existing<F>(
        &self,
        key: &StatKey,
        apply: F,
    ) -> Result<EvaluationRecord, RepositoryError>
    where
        F: FnOnce(&mut EvaluationRecord),
    {
        let mut records = self.lock()?;
        let record = records.get_mut(key).ok_or(RepositoryError::NotFound)?;
        apply(record);
        Ok(record.clone())
    }
}
