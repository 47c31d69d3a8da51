use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use super::repository::{EvaluationRecord, EvaluationRepository, RepositoryError};
use crate::import::ImportedStats;
use crate::scoring::{
    EmployeeProfile, EngineOutput, ScoreMap, ScoringEngine, StatKey, StatPatch, StatRecord,
};

/// Keeps stored evaluations in step with their inputs: every write recomputes.
pub struct EvaluationService<R> {
    repository: Arc<R>,
    engine: Arc<ScoringEngine>,
}

impl<R> EvaluationService<R>
where
    R: EvaluationRepository + 'static,
{
    pub fn new(repository: Arc<R>, engine: Arc<ScoringEngine>) -> Self {
        Self { repository, engine }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Stores a wholesale stat import and any attributes the caller supplies.
    pub fn put_stats(
        &self,
        profile: EmployeeProfile,
        period_year: i32,
        stats: StatRecord,
    ) -> Result<EvaluationRecord, RecordServiceError> {
        let key = validated_key(&profile.employee_id, period_year)?;
        let record = self.repository.update(&key, |record| {
            merge_profile(&mut record.profile, profile);
            match record.stats.as_mut() {
                Some(existing) => existing.replace_with(stats),
                None => record.stats = Some(stats),
            }
            refresh(&self.engine, record);
        })?;
        Ok(record)
    }

    /// Applies a partial stat update; missing stats start from zero.
    pub fn patch_stats(
        &self,
        key: &StatKey,
        patch: StatPatch,
    ) -> Result<EvaluationRecord, RecordServiceError> {
        let key = validated_key(&key.employee_id, key.period_year)?;
        let record = self.repository.update(&key, |record| {
            record.stats.get_or_insert_with(StatRecord::default).apply(patch);
            refresh(&self.engine, record);
        })?;
        Ok(record)
    }

    /// Records manual question scores. Entries overwrite by question id.
    pub fn rate(&self, key: &StatKey, scores: ScoreMap) -> Result<EvaluationRecord, RecordServiceError> {
        let key = validated_key(&key.employee_id, key.period_year)?;
        let record = self.repository.update(&key, |record| {
            record.scores.extend(scores);
            refresh(&self.engine, record);
        })?;
        Ok(record)
    }

    pub fn record(&self, key: &StatKey) -> Result<EvaluationRecord, RecordServiceError> {
        self.repository
            .fetch(key)?
            .ok_or(RecordServiceError::Repository(RepositoryError::NotFound))
    }

    pub fn recalculate(&self, key: &StatKey) -> Result<EvaluationRecord, RecordServiceError> {
        let record = self
            .repository
            .update_existing(key, |record| refresh(&self.engine, record))?;
        Ok(record)
    }

    /// Recomputes every stored record. Evaluation runs on the rayon pool over a
    /// snapshot; a record written to since the snapshot is recomputed from its
    /// current inputs instead of taking the stale result.
    pub fn recalculate_all(&self) -> Result<Vec<EvaluationRecord>, RecordServiceError> {
        let computed: Vec<(EvaluationRecord, EngineOutput)> = self
            .repository
            .all()?
            .into_par_iter()
            .map(|snapshot| {
                let output = self.engine.evaluate(&snapshot.input());
                (snapshot, output)
            })
            .collect();

        let mut records = Vec::with_capacity(computed.len());
        let mut stale = 0usize;
        for (snapshot, output) in computed {
            let record = self.repository.update_existing(&snapshot.key, |record| {
                if record.same_inputs(&snapshot) {
                    record.store_output(output);
                } else {
                    stale += 1;
                    refresh(&self.engine, record);
                }
            })?;
            records.push(record);
        }
        info!(records = records.len(), stale, "evaluations recalculated");
        Ok(records)
    }

    /// Loads CSV rows as wholesale stat imports.
    pub fn import(&self, rows: Vec<ImportedStats>) -> Result<usize, RecordServiceError> {
        let mut stored = 0;
        for row in rows {
            let year = row.key.period_year;
            self.put_stats(row.profile, year, row.stats)?;
            stored += 1;
        }
        Ok(stored)
    }
}

/// Re-evaluates `record` from its current inputs.
fn refresh(engine: &ScoringEngine, record: &mut EvaluationRecord) {
    let output = engine.evaluate(&record.input());
    if output.is_degraded() {
        warn!(
            employee = %record.key.employee_id,
            year = record.key.period_year,
            "evaluation stored in degraded state"
        );
    }
    record.store_output(output);
}

fn validated_key(employee_id: &str, period_year: i32) -> Result<StatKey, RecordServiceError> {
    let employee_id = employee_id.trim();
    if employee_id.is_empty() {
        return Err(RecordServiceError::MissingEmployeeId);
    }
    Ok(StatKey::new(employee_id, period_year))
}

/// Supplied attributes win; absent ones keep what is stored.
fn merge_profile(stored: &mut EmployeeProfile, incoming: EmployeeProfile) {
    if incoming.level.is_some() {
        stored.level = incoming.level;
    }
    if incoming.section.is_some() {
        stored.section = incoming.section;
    }
    if incoming.department.is_some() {
        stored.department = incoming.department;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordServiceError {
    #[error("employee id must not be empty")]
    MissingEmployeeId,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
