use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use staff_appraisal::error::AppError;
use staff_appraisal::scoring::{
    EngineConfig, Question, Rule, ScoringEngine, SimpleCondition, DISCIPLINE_TAG,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Rounds, grade table and context settings applied to ad-hoc evaluations.
    pub(crate) scoring: Arc<EngineConfig>,
}

pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Engine from rule/question documents on disk, or the built-in set when absent.
pub(crate) fn build_engine(
    rules: Option<&PathBuf>,
    questions: Option<&PathBuf>,
    config: EngineConfig,
) -> Result<ScoringEngine, AppError> {
    let rules = match rules {
        Some(path) => load_json(path)?,
        None => default_rules(),
    };
    let questions = match questions {
        Some(path) => load_json(path)?,
        None => default_questions(),
    };
    Ok(ScoringEngine::new(rules, questions, config))
}

pub(crate) fn default_questions() -> Vec<Question> {
    let question = |id: &str, title: &str, max_score: f64, is_read_only: bool| Question {
        id: id.to_string(),
        title: title.to_string(),
        max_score,
        is_read_only,
    };
    vec![
        question("Q1", "Teamwork", 5.0, false),
        question("Q2", "Initiative", 5.0, false),
        question("Q3", "Quality of work", 5.0, false),
        question("KPI-1", "Imported assessment", 100.0, true),
    ]
}

/// Attendance penalties feeding a discipline score, plus a weighted total.
pub(crate) fn default_rules() -> Vec<Rule> {
    let mut lateness = Rule::variable("v-late", "Lateness Points", "");
    lateness.simple_mode = true;
    lateness.simple_mode_conditions = [(0.0, 5.0), (30.0, 4.0), (90.0, 2.0)]
        .into_iter()
        .map(|(minutes, score)| SimpleCondition {
            condition: format!("late_minutes <= {minutes}"),
            score,
        })
        .collect();

    vec![
        lateness,
        Rule::variable("v-absence", "Absence Penalty", "min(absence_days * 2, 10)"),
        Rule::variable("v-sick", "Sick Penalty", "sick_days > 5 ? (sick_days - 5) : 0"),
        Rule::variable("v-warning", "Warning Penalty", "warning_count * 5"),
        Rule::score(
            "s-discipline",
            "Discipline Points",
            "max(15 - [Absence Penalty] - [Sick Penalty] - [Warning Penalty], 0) + [Lateness Points]",
        )
        .with_target_field(DISCIPLINE_TAG),
        Rule::score(
            "s-total",
            "Total Score",
            "([Q1] + [Q2] + [Q3]) * 3 + [KPI-1] * 0.35 + [Discipline Points]",
        ),
    ]
}
