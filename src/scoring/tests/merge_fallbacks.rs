use std::collections::BTreeMap;

use crate::scoring::domain::{EmployeeProfile, Question, Rule, ScoreMap, StatRecord};
use crate::scoring::engine::{EngineConfig, EngineOutput, EvaluationInput, ScoringEngine};
use crate::scoring::DisciplineScore;

fn kpi_engine() -> ScoringEngine {
    let question = Question {
        id: "KPI-1".to_string(),
        title: "Imported assessment".to_string(),
        max_score: 100.0,
        is_read_only: true,
    };
    ScoringEngine::new(
        vec![
            Rule::score("d", "Discipline Score", "10"),
            Rule::score("t", "Total Score", "[KPI-1]"),
        ],
        vec![question],
        EngineConfig::default(),
    )
}

fn evaluate_with_field(field: &str, value: f64) -> EngineOutput {
    kpi_engine().evaluate(&EvaluationInput {
        employee: EmployeeProfile {
            employee_id: "E-kpi".to_string(),
            ..EmployeeProfile::default()
        },
        stats: Some(StatRecord {
            extra: BTreeMap::from([(field.to_string(), value)]),
            ..StatRecord::default()
        }),
        scores: ScoreMap::new(),
    })
}

fn assert_filled(output: &EngineOutput, expected: f64) {
    assert!(!output.is_degraded(), "setup error: {:?}", output.setup_error);
    assert_eq!(output.setup_error, None);
    assert_eq!(output.discipline_score, DisciplineScore::Value(10.0));
    assert_eq!(output.score_map.get("KPI-1"), Some(&expected));
    assert_eq!(output.total_score, expected);
}

#[test]
fn exact_stat_field_fills_the_question() {
    assert_filled(&evaluate_with_field("KPI-1", 61.0), 61.0);
}

#[test]
fn underscore_field_fills_the_question_without_a_collision() {
    assert_filled(&evaluate_with_field("KPI_1", 60.0), 60.0);
}

#[test]
fn bracketed_field_fills_the_question() {
    assert_filled(&evaluate_with_field("[KPI-1]", 62.0), 62.0);
}

#[test]
fn look_alike_fields_fill_the_question() {
    assert_filled(&evaluate_with_field("[KP1-1]", 63.0), 63.0);
    assert_filled(&evaluate_with_field("[KPI-I]", 64.0), 64.0);
}

#[test]
fn generic_imported_score_fills_the_question() {
    assert_filled(&evaluate_with_field("imported_score", 65.0), 65.0);
}

#[test]
fn manual_score_wins_over_an_underscore_stat_field() {
    let output = kpi_engine().evaluate(&EvaluationInput {
        employee: EmployeeProfile::default(),
        stats: Some(StatRecord {
            extra: BTreeMap::from([("KPI_1".to_string(), 60.0)]),
            ..StatRecord::default()
        }),
        scores: ScoreMap::from([("KPI-1".to_string(), 75.0)]),
    });

    assert_filled(&output, 75.0);
}
