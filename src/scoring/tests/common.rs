use std::collections::BTreeMap;

use crate::scoring::domain::{
    EmployeeProfile, Question, Rule, ScoreMap, SimpleCondition, StatRecord,
};
use crate::scoring::engine::{EngineConfig, EvaluationInput, ScoringEngine};
use crate::scoring::DISCIPLINE_TAG;

pub(super) fn questions() -> Vec<Question> {
    vec![
        Question {
            id: "Q1".to_string(),
            title: "Teamwork".to_string(),
            max_score: 5.0,
            is_read_only: false,
        },
        Question {
            id: "Q2".to_string(),
            title: "Initiative".to_string(),
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

/// Lateness table in simple mode, two penalties, discipline and total scores.
pub(super) fn rules() -> Vec<Rule> {
    let mut lateness = Rule::variable("v1", "Lateness Points", "");
    lateness.simple_mode = true;
    lateness.default_score = 0.0;
    lateness.simple_mode_conditions = vec![
        SimpleCondition {
            condition: "late_minutes <= 0".to_string(),
            score: 3.0,
        },
        SimpleCondition {
            condition: "late_minutes <= 10".to_string(),
            score: 2.0,
        },
        SimpleCondition {
            condition: "late_minutes <= 20".to_string(),
            score: 1.0,
        },
    ];

    vec![
        lateness,
        Rule::variable("v2", "Absence Penalty", "min(absence_days * 2, 10)"),
        Rule::variable(
            "v3",
            "Warning Penalty",
            "warning_count > 0 ? warning_count * 5 : 0",
        ),
        Rule::score(
            "s1",
            "Discipline Score",
            "max(20 - [Absence Penalty] - [Warning Penalty], 0) + [Lateness Points]",
        ),
        Rule::score("s2", "Conduct", "1").with_target_field(DISCIPLINE_TAG),
        Rule::score(
            "s3",
            "Total Score",
            "([Q1] + [Q2]) * 4 + [KPI-1] * 0.4 + [Discipline Score]",
        ),
    ]
}

pub(super) fn engine() -> ScoringEngine {
    ScoringEngine::new(rules(), questions(), EngineConfig::default())
}

pub(super) fn stats(late_minutes: f64, absence_days: f64, warnings: f64, kpi: f64) -> StatRecord {
    StatRecord {
        late_minutes,
        sick_days: 0.0,
        absence_days,
        warning_count: warnings,
        extra: BTreeMap::from([("imported_score".to_string(), kpi)]),
    }
}

pub(super) fn input(employee_id: &str, stats: Option<StatRecord>, q1: f64, q2: f64) -> EvaluationInput {
    EvaluationInput {
        employee: EmployeeProfile {
            employee_id: employee_id.to_string(),
            level: Some("Staff".to_string()),
            section: Some("Assembly".to_string()),
            department: Some("Production".to_string()),
        },
        stats,
        scores: ScoreMap::from([("Q1".to_string(), q1), ("Q2".to_string(), q2)]),
    }
}
