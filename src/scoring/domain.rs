use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::rules::compile_simple_mode;

/// Manual and imported scores for one employee/period, keyed by question id.
pub type ScoreMap = BTreeMap<String, f64>;

/// Stat records are scoped by employee and appraisal year.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatKey {
    pub employee_id: String,
    pub period_year: i32,
}

impl StatKey {
    pub fn new(employee_id: impl Into<String>, period_year: i32) -> Self {
        Self {
            employee_id: employee_id.into(),
            period_year,
        }
    }
}

/// Imported attendance and discipline facts for one employee/period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    #[serde(default)]
    pub late_minutes: f64,
    #[serde(default)]
    pub sick_days: f64,
    #[serde(default)]
    pub absence_days: f64,
    #[serde(default)]
    pub warning_count: f64,
    /// Any other imported column, e.g. a third-party assessment score.
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

impl StatRecord {
    pub const LATE_MINUTES: &'static str = "late_minutes";
    pub const SICK_DAYS: &'static str = "sick_days";
    pub const ABSENCE_DAYS: &'static str = "absence_days";
    pub const WARNING_COUNT: &'static str = "warning_count";
    pub const FIXED_FIELDS: [&'static str; 4] = [
        Self::LATE_MINUTES,
        Self::SICK_DAYS,
        Self::ABSENCE_DAYS,
        Self::WARNING_COUNT,
    ];

    /// Every field as `(name, value)`, fixed fields first.
    pub fn fields(&self) -> Vec<(&str, f64)> {
        let mut fields = vec![
            (Self::LATE_MINUTES, self.late_minutes),
            (Self::SICK_DAYS, self.sick_days),
            (Self::ABSENCE_DAYS, self.absence_days),
            (Self::WARNING_COUNT, self.warning_count),
        ];
        fields.extend(self.extra.iter().map(|(name, value)| (name.as_str(), *value)));
        fields
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        match field {
            Self::LATE_MINUTES => Some(self.late_minutes),
            Self::SICK_DAYS => Some(self.sick_days),
            Self::ABSENCE_DAYS => Some(self.absence_days),
            Self::WARNING_COUNT => Some(self.warning_count),
            other => self.extra.get(other).copied(),
        }
    }

    /// Merges a partial update field by field; absent patch fields keep their value.
    pub fn apply(&mut self, patch: StatPatch) {
        if let Some(value) = patch.late_minutes {
            self.late_minutes = value;
        }
        if let Some(value) = patch.sick_days {
            self.sick_days = value;
        }
        if let Some(value) = patch.absence_days {
            self.absence_days = value;
        }
        if let Some(value) = patch.warning_count {
            self.warning_count = value;
        }
        self.extra.extend(patch.extra);
    }

    /// Wholesale overwrite by a fresh import.
    pub fn replace_with(&mut self, import: StatRecord) {
        *self = import;
    }
}

/// Partial stat update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatPatch {
    #[serde(default)]
    pub late_minutes: Option<f64>,
    #[serde(default)]
    pub sick_days: Option<f64>,
    #[serde(default)]
    pub absence_days: Option<f64>,
    #[serde(default)]
    pub warning_count: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

/// Evaluation item. Read-only questions are filled from imported stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub max_score: f64,
    #[serde(default)]
    pub is_read_only: bool,
}

/// Employee attributes the context exposes to formulas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub employee_id: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    #[serde(alias = "Variable", alias = "VARIABLE")]
    Variable,
    #[serde(alias = "Score", alias = "SCORE")]
    Score,
}

/// One row of a simple-mode condition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleCondition {
    pub condition: String,
    pub score: f64,
}

/// Administrator-authored formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub formula: String,
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub simple_mode: bool,
    #[serde(default)]
    pub simple_mode_conditions: Vec<SimpleCondition>,
    #[serde(default)]
    pub default_score: f64,
}

impl Rule {
    pub fn variable(id: &str, name: &str, formula: &str) -> Self {
        Self::new(id, name, RuleKind::Variable, formula)
    }

    pub fn score(id: &str, name: &str, formula: &str) -> Self {
        Self::new(id, name, RuleKind::Score, formula)
    }

    fn new(id: &str, name: &str, kind: RuleKind, formula: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            formula: formula.to_string(),
            target_field: None,
            simple_mode: false,
            simple_mode_conditions: Vec::new(),
            default_score: 0.0,
        }
    }

    pub fn with_target_field(mut self, tag: &str) -> Self {
        self.target_field = Some(tag.to_string());
        self
    }

    /// Formula text the engine evaluates; simple-mode tables compile to nested conditionals.
    pub fn effective_formula(&self) -> Cow<'_, str> {
        if !self.simple_mode {
            return Cow::Borrowed(&self.formula);
        }
        Cow::Owned(compile_simple_mode(
            &self.simple_mode_conditions,
            self.default_score,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_patch_merges_field_by_field() {
        let mut record = StatRecord {
            late_minutes: 40.0,
            sick_days: 2.0,
            absence_days: 1.0,
            warning_count: 0.0,
            extra: BTreeMap::from([("imported_score".to_string(), 71.5)]),
        };

        record.apply(StatPatch {
            sick_days: Some(3.0),
            extra: BTreeMap::from([("kpi_bonus".to_string(), 4.0)]),
            ..StatPatch::default()
        });

        assert_eq!(record.late_minutes, 40.0);
        assert_eq!(record.sick_days, 3.0);
        assert_eq!(record.get("imported_score"), Some(71.5));
        assert_eq!(record.get("kpi_bonus"), Some(4.0));
        assert_eq!(record.get("unknown"), None);
    }

    #[test]
    fn replace_overwrites_every_field() {
        let mut record = StatRecord {
            late_minutes: 40.0,
            extra: BTreeMap::from([("imported_score".to_string(), 71.5)]),
            ..StatRecord::default()
        };
        record.replace_with(StatRecord {
            warning_count: 1.0,
            ..StatRecord::default()
        });
        assert_eq!(record.late_minutes, 0.0);
        assert_eq!(record.warning_count, 1.0);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn stat_record_deserializes_extra_columns() {
        let record: StatRecord = serde_json::from_value(serde_json::json!({
            "late_minutes": 12,
            "imported_score": 80.5
        }))
        .expect("valid stat record");
        assert_eq!(record.late_minutes, 12.0);
        assert_eq!(record.extra.get("imported_score"), Some(&80.5));
    }

    #[test]
    fn simple_mode_rule_compiles_its_condition_table() {
        let mut rule = Rule::variable("r1", "Lateness Points", "ignored");
        rule.simple_mode = true;
        rule.default_score = 0.0;
        rule.simple_mode_conditions = vec![
            SimpleCondition {
                condition: "late_minutes <= 0".to_string(),
                score: 3.0,
            },
            SimpleCondition {
                condition: "late_minutes <= 10".to_string(),
                score: 2.0,
            },
        ];

        assert_eq!(
            rule.effective_formula(),
            "(late_minutes <= 0) ? (3) : ((late_minutes <= 10) ? (2) : (0))"
        );
    }
}
