//! Rule-based appraisal scoring.
//!
//! Flow for one employee/period: imported stats fill read-only score slots
//! ([`merge`]), the evaluation context is assembled ([`context`]), Variable
//! rules are resolved over a fixed number of rounds ([`resolver`]), Score
//! rules are composed into the discipline and total outputs ([`composer`]),
//! and the total is mapped to a grade bucket ([`grade`]). [`ScoringEngine`]
//! drives the whole pipeline and never fails; faults surface as integrity
//! warnings or as the degraded `Error` sentinel.

pub mod composer;
pub mod context;
pub mod domain;
pub mod engine;
pub mod formula;
pub mod grade;
pub mod merge;
pub mod resolver;
pub mod rules;
pub mod symbol;
pub mod warnings;

#[cfg(test)]
mod tests;

pub use composer::{DisciplineScore, DISCIPLINE_ALIASES, DISCIPLINE_TAG, TOTAL_ALIASES};
pub use context::{ContextSettings, SetupError};
pub use domain::{
    EmployeeProfile, Question, Rule, RuleKind, ScoreMap, SimpleCondition, StatKey, StatPatch,
    StatRecord,
};
pub use engine::{EngineConfig, EngineOutput, EvaluationInput, ScoringEngine};
pub use formula::{Formula, FormulaError, Value};
pub use grade::{classify, default_grade_table, GradeBucket};
pub use merge::merge_scores;
pub use resolver::DEFAULT_ROUNDS;
pub use rules::{compile_simple_mode, RuleSet};
pub use symbol::{sanitize, strip_brackets, Symbol, SymbolRegistry};
pub use warnings::{IntegrityWarning, WarningKind};
