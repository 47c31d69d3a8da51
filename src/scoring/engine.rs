use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::composer::{compose, DisciplineScore};
use super::context::{build_context, ContextInput, ContextSettings, SetupError};
use super::domain::{EmployeeProfile, Question, Rule, ScoreMap, StatRecord};
use super::formula::Value;
use super::grade::{classify, default_grade_table, GradeBucket};
use super::merge::merge_scores;
use super::resolver::{resolve, DEFAULT_ROUNDS};
use super::rules::RuleSet;
use super::warnings::{IntegrityWarning, WarningLog};

/// Tunables shared by every evaluation an engine performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Variable resolver rounds.
    pub rounds: usize,
    pub grade_table: Vec<GradeBucket>,
    pub context: ContextSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            grade_table: default_grade_table(),
            context: ContextSettings::default(),
        }
    }
}

/// Everything known about one employee/period at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub employee: EmployeeProfile,
    #[serde(default)]
    pub stats: Option<StatRecord>,
    #[serde(default)]
    pub scores: ScoreMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub discipline_score: DisciplineScore,
    pub total_score: f64,
    /// Manual scores plus read-only slots filled from stats.
    pub score_map: ScoreMap,
    pub grade: String,
    #[serde(default)]
    pub rule_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub warnings: Vec<IntegrityWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,
}

impl EngineOutput {
    fn degraded(score_map: ScoreMap, error: &SetupError, grade_table: &[GradeBucket]) -> Self {
        Self {
            discipline_score: DisciplineScore::Error,
            total_score: 0.0,
            score_map,
            grade: classify(0.0, Some(grade_table)).grade,
            rule_scores: BTreeMap::new(),
            variables: BTreeMap::new(),
            warnings: Vec::new(),
            setup_error: Some(error.to_string()),
        }
    }

    /// True when setup failed and the sentinel result was produced.
    pub fn is_degraded(&self) -> bool {
        self.discipline_score == DisciplineScore::Error
    }
}

/// Rule set and question list compiled once, evaluated per employee.
///
/// Each evaluation builds its own context and resolver state, so one engine
/// can serve any number of threads.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    rules: RuleSet,
    questions: Vec<Question>,
    config: EngineConfig,
}

impl ScoringEngine {
    pub fn new(rules: Vec<Rule>, questions: Vec<Question>, config: EngineConfig) -> Self {
        Self {
            rules: RuleSet::compile(rules),
            questions,
            config,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluate(&self, input: &EvaluationInput) -> EngineOutput {
        let score_map = merge_scores(input.stats.as_ref(), &input.scores, &self.questions);

        let built = build_context(
            ContextInput {
                stats: input.stats.as_ref(),
                scores: &score_map,
                employee: &input.employee,
                questions: &self.questions,
            },
            &self.config.context,
            self.rules.names(),
        );
        let mut context = match built {
            Ok(context) => context,
            Err(err) => {
                error!(employee = %input.employee.employee_id, error = %err, "evaluation setup failed");
                return EngineOutput::degraded(score_map, &err, &self.config.grade_table);
            }
        };

        let mut warnings = WarningLog::default();
        let variables = resolve(
            self.rules.variables(),
            &mut context,
            self.config.rounds,
            &mut warnings,
        );
        let composition = compose(self.rules.scores(), &variables, &context, &mut warnings);

        EngineOutput {
            grade: classify(composition.total_score, Some(&self.config.grade_table)).grade,
            discipline_score: composition.discipline_score,
            total_score: composition.total_score,
            score_map,
            rule_scores: composition.rule_scores,
            variables: variables.into_map(),
            warnings: warnings.into_vec(),
            setup_error: None,
        }
    }

    /// Evaluates independent inputs in parallel; output order matches input order.
    pub fn evaluate_batch(&self, inputs: &[EvaluationInput]) -> Vec<EngineOutput> {
        inputs.par_iter().map(|input| self.evaluate(input)).collect()
    }

    /// Static advisories for the configured rules and questions.
    pub fn integrity_report(&self, stat_fields: &[&str]) -> Vec<IntegrityWarning> {
        self.rules
            .integrity_report(&self.questions, stat_fields, &self.config.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_collision_yields_error_sentinel() {
        let engine = ScoringEngine::new(
            vec![Rule::score("1", "Total Score", "10")],
            Vec::new(),
            EngineConfig::default(),
        );
        let output = engine.evaluate(&EvaluationInput {
            employee: EmployeeProfile::default(),
            stats: None,
            scores: ScoreMap::from([("Q-1".to_string(), 1.0), ("Q.1".to_string(), 2.0)]),
        });

        assert!(output.is_degraded());
        assert_eq!(output.discipline_score, DisciplineScore::Error);
        assert_eq!(output.total_score, 0.0);
        assert_eq!(output.grade, "NI");
        assert_eq!(output.score_map.len(), 2);
        assert!(output.setup_error.is_some());
    }

    #[test]
    fn empty_rule_set_still_produces_a_record() {
        let engine = ScoringEngine::new(Vec::new(), Vec::new(), EngineConfig::default());
        let output = engine.evaluate(&EvaluationInput::default());
        assert_eq!(output.discipline_score, DisciplineScore::Missing);
        assert_eq!(output.total_score, 0.0);
        assert_eq!(output.grade, "NI");
        assert!(!output.is_degraded());
    }

    #[test]
    fn output_serializes_with_sentinels() {
        let engine = ScoringEngine::new(Vec::new(), Vec::new(), EngineConfig::default());
        let json = serde_json::to_value(engine.evaluate(&EvaluationInput::default()))
            .expect("serializes");
        assert_eq!(json["discipline_score"], "-");
        assert_eq!(json["grade"], "NI");
        assert!(json.get("setup_error").is_none());
    }
}
