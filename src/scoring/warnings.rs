use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Advisory category. None of these block evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UnresolvedSymbol,
    MalformedFormula,
    DuplicateRuleName,
    EmptyConditionTable,
}

impl WarningKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnresolvedSymbol => "unresolved_symbol",
            Self::MalformedFormula => "malformed_formula",
            Self::DuplicateRuleName => "duplicate_rule_name",
            Self::EmptyConditionTable => "empty_condition_table",
        }
    }
}

/// Non-fatal integrity finding about one rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntegrityWarning {
    pub rule: String,
    pub kind: WarningKind,
    pub detail: String,
}

impl IntegrityWarning {
    pub fn new(rule: &str, kind: WarningKind, detail: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            kind,
            detail: detail.into(),
        }
    }
}

/// Deduplicating collector for one evaluation call.
///
/// Rules run once per resolver round, so the same finding would otherwise be
/// reported up to `rounds` times.
#[derive(Debug, Default)]
pub struct WarningLog {
    seen: BTreeSet<IntegrityWarning>,
}

impl WarningLog {
    pub fn push(&mut self, warning: IntegrityWarning) {
        if self.seen.contains(&warning) {
            return;
        }
        warn!(
            rule = %warning.rule,
            kind = warning.kind.as_str(),
            detail = %warning.detail,
            "rule integrity warning"
        );
        self.seen.insert(warning);
    }

    pub fn unresolved(&mut self, rule: &str, names: Vec<String>) {
        for name in names {
            self.push(IntegrityWarning::new(rule, WarningKind::UnresolvedSymbol, name));
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn into_vec(self) -> Vec<IntegrityWarning> {
        self.seen.into_iter().collect()
    }
}
