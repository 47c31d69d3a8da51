//! Final score composition: evaluates Score rules and picks the canonical
//! discipline and total outputs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::context::Context;
use super::formula::{Scope, Value};
use super::resolver::ResolutionState;
use super::rules::CompiledRule;
use super::warnings::{IntegrityWarning, WarningKind, WarningLog};

/// Rule names that always designate the discipline score.
pub const DISCIPLINE_ALIASES: [&str; 4] = [
    "Discipline Score",
    "DisciplineScore",
    "discipline_score",
    "Discipline",
];

/// Rule names that feed the total score.
pub const TOTAL_ALIASES: [&str; 4] = ["Total Score", "TotalScore", "total_score", "Total"];

/// `target_field` tag selecting the discipline score when no alias rule succeeds.
pub const DISCIPLINE_TAG: &str = "discipline_score";

/// Discipline output: a number, `-` when no rule produced one, or `Error` after
/// a setup failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisciplineScore {
    Value(f64),
    Missing,
    Error,
}

impl DisciplineScore {
    const MISSING: &'static str = "-";
    const ERROR: &'static str = "Error";

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Value(value) => Some(*value),
            Self::Missing | Self::Error => None,
        }
    }
}

impl fmt::Display for DisciplineScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value:.2}"),
            Self::Missing => f.write_str(Self::MISSING),
            Self::Error => f.write_str(Self::ERROR),
        }
    }
}

impl Serialize for DisciplineScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => serializer.serialize_f64(*value),
            Self::Missing => serializer.serialize_str(Self::MISSING),
            Self::Error => serializer.serialize_str(Self::ERROR),
        }
    }
}

impl<'de> Deserialize<'de> for DisciplineScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(Self::Value(value)),
            Raw::Text(text) if text == Self::MISSING => Ok(Self::Missing),
            Raw::Text(text) if text == Self::ERROR => Ok(Self::Error),
            Raw::Text(text) => Err(serde::de::Error::custom(format!(
                "invalid discipline score '{text}'"
            ))),
        }
    }
}

/// Result of one composition pass. Numbers are rounded to 2 decimal places.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub discipline_score: DisciplineScore,
    pub total_score: f64,
    /// Every Score rule that evaluated successfully, by name.
    pub rule_scores: BTreeMap<String, f64>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn is_discipline_alias(name: &str) -> bool {
    DISCIPLINE_ALIASES.contains(&name.trim())
}

pub fn is_total_alias(name: &str) -> bool {
    TOTAL_ALIASES.contains(&name.trim())
}

fn has_discipline_tag(rule: &CompiledRule) -> bool {
    rule.rule
        .target_field
        .as_deref()
        .is_some_and(|tag| tag.trim().eq_ignore_ascii_case(DISCIPLINE_TAG))
}

struct ScoreScope<'a> {
    context: &'a Context,
    variables: &'a ResolutionState,
    computed: &'a BTreeMap<String, f64>,
    computed_symbols: &'a BTreeMap<String, f64>,
}

impl Scope for ScoreScope<'_> {
    fn lookup(&self, symbol: &str) -> Option<Value> {
        self.context
            .get(symbol)
            .cloned()
            .or_else(|| self.computed_symbols.get(symbol).copied().map(Value::Number))
    }

    fn reference(&self, name: &str) -> Option<Value> {
        let name = name.trim();
        self.variables
            .get(name)
            .cloned()
            .or_else(|| self.computed.get(name).copied().map(Value::Number))
            .or_else(|| self.context.find(name).cloned())
    }
}

/// Evaluates every Score rule once, in order.
///
/// A failing rule is left out entirely, so a later candidate can still fill
/// the canonical slot. When several rules qualify for the same slot the last
/// successful one wins.
pub fn compose(
    rules: &[CompiledRule],
    variables: &ResolutionState,
    context: &Context,
    warnings: &mut WarningLog,
) -> Composition {
    let mut computed = BTreeMap::new();
    let mut computed_symbols = BTreeMap::new();
    let mut from_alias = None;
    let mut from_tag = None;
    let mut total = None;

    for rule in rules {
        let outcome = match &rule.formula {
            Ok(formula) => formula.evaluate(&ScoreScope {
                context,
                variables,
                computed: &computed,
                computed_symbols: &computed_symbols,
            }),
            Err(error) => Err(error.clone()),
        };

        let evaluation = match outcome {
            Ok(evaluation) => evaluation,
            Err(error) => {
                warnings.push(IntegrityWarning::new(
                    &rule.name,
                    WarningKind::MalformedFormula,
                    error.to_string(),
                ));
                continue;
            }
        };
        warnings.unresolved(&rule.name, evaluation.unresolved);

        let Some(value) = evaluation.value.as_number() else {
            warnings.push(IntegrityWarning::new(
                &rule.name,
                WarningKind::MalformedFormula,
                "score rule produced text instead of a number",
            ));
            continue;
        };

        if is_discipline_alias(&rule.name) {
            from_alias = Some(value);
        } else if has_discipline_tag(rule) {
            from_tag = Some(value);
        }
        if is_total_alias(&rule.name) {
            total = Some(value);
        }
        computed.insert(rule.name.clone(), value);
        computed_symbols.insert(rule.symbol.to_string(), value);
    }

    Composition {
        discipline_score: from_alias
            .or(from_tag)
            .map(|value| DisciplineScore::Value(round2(value)))
            .unwrap_or(DisciplineScore::Missing),
        total_score: round2(total.unwrap_or(0.0)),
        rule_scores: computed
            .into_iter()
            .map(|(name, value)| (name, round2(value)))
            .collect(),
    }
}
