use super::common::*;
use crate::scoring::engine::{EngineConfig, ScoringEngine};
use crate::scoring::grade::GradeBucket;
use crate::scoring::warnings::WarningKind;
use crate::scoring::DisciplineScore;

#[test]
fn full_pipeline_produces_discipline_total_and_grade() {
    let engine = engine();
    let output = engine.evaluate(&input("E-1", Some(stats(5.0, 1.0, 0.0, 80.0)), 4.0, 5.0));

    assert_eq!(output.score_map.get("KPI-1"), Some(&80.0));
    assert_eq!(output.discipline_score, DisciplineScore::Value(20.0));
    assert_eq!(output.total_score, 88.0);
    assert_eq!(output.grade, "E");
    assert_eq!(output.rule_scores.get("Conduct"), Some(&1.0));
    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
}

#[test]
fn penalties_pull_the_grade_down() {
    let engine = engine();
    let output = engine.evaluate(&input("E-2", Some(stats(25.0, 3.0, 2.0, 50.0)), 3.0, 3.0));

    assert_eq!(output.discipline_score, DisciplineScore::Value(4.0));
    assert_eq!(output.total_score, 48.0);
    assert_eq!(output.grade, "NI");
}

#[test]
fn missing_stats_read_as_zero_and_are_reported() {
    let engine = engine();
    let output = engine.evaluate(&input("E-3", None, 5.0, 5.0));

    assert_eq!(output.discipline_score, DisciplineScore::Value(23.0));
    assert_eq!(output.total_score, 63.0);
    assert_eq!(output.grade, "BE");
    assert!(!output.is_degraded());
    assert!(output.warnings.iter().any(|warning| {
        warning.kind == WarningKind::UnresolvedSymbol && warning.detail == "late_minutes"
    }));
}

#[test]
fn manual_rating_of_a_read_only_question_is_kept() {
    let engine = engine();
    let mut manual = input("E-4", Some(stats(0.0, 0.0, 0.0, 50.0)), 5.0, 5.0);
    manual.scores.insert("KPI-1".to_string(), 90.0);

    let output = engine.evaluate(&manual);

    assert_eq!(output.score_map.get("KPI-1"), Some(&90.0));
    assert_eq!(output.total_score, 40.0 + 36.0 + 23.0);
}

#[test]
fn one_round_matches_default_rounds_without_variable_cross_references() {
    let single = ScoringEngine::new(
        rules(),
        questions(),
        EngineConfig {
            rounds: 1,
            ..EngineConfig::default()
        },
    );
    let default = engine();

    for (late, absent, warned) in [(0.0, 0.0, 0.0), (12.0, 4.0, 1.0), (40.0, 9.0, 3.0)] {
        let case = input("E-5", Some(stats(late, absent, warned, 70.0)), 3.0, 4.0);
        assert_eq!(single.evaluate(&case), default.evaluate(&case));
    }
}

#[test]
fn site_grade_table_replaces_the_default() {
    let engine = ScoringEngine::new(
        rules(),
        questions(),
        EngineConfig {
            grade_table: vec![
                GradeBucket::new("A", 80.0, 100.0),
                GradeBucket::new("B", 0.0, 79.99),
            ],
            ..EngineConfig::default()
        },
    );
    let output = engine.evaluate(&input("E-6", Some(stats(5.0, 1.0, 0.0, 80.0)), 4.0, 5.0));
    assert_eq!(output.grade, "A");
}

#[test]
fn repeated_evaluations_share_no_state() {
    let engine = engine();
    let case = input("E-7", Some(stats(5.0, 1.0, 0.0, 80.0)), 4.0, 5.0);
    let first = engine.evaluate(&case);
    engine.evaluate(&input("E-8", None, 0.0, 0.0));
    assert_eq!(engine.evaluate(&case), first);
}

#[test]
fn integrity_report_for_clean_rules_is_empty() {
    let engine = engine();
    assert!(engine.integrity_report(&["imported_score"]).is_empty());
}
