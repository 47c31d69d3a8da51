//! Evaluation context: every symbol a formula may read, built fresh per call.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{EmployeeProfile, Question, ScoreMap, StatRecord};
use super::formula::Value;
use super::symbol::{sanitize, strip_brackets, Symbol, SymbolCollision, SymbolRegistry};

pub const STAFF_FLAG: &str = "is_staff";
pub const LEVEL_FLAG_PREFIX: &str = "level_";
pub const SECTION_GROUP_PREFIX: &str = "in_";
const ATTRIBUTES: [&str; 3] = ["level", "section", "department"];

/// Site settings for the derived boolean facts injected into every context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Levels flagged by `is_staff`, compared case-insensitively.
    pub staff_levels: Vec<String>,
    /// Group name to member sections; each group becomes an `in_<group>` flag.
    pub section_groups: BTreeMap<String, Vec<String>>,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            staff_levels: vec!["Staff".to_string(), "Operator".to_string()],
            section_groups: BTreeMap::new(),
        }
    }
}

impl ContextSettings {
    fn is_staff(&self, level: &str) -> bool {
        self.staff_levels
            .iter()
            .any(|candidate| candidate.trim().eq_ignore_ascii_case(level.trim()))
    }

    /// Whether `symbol` is an attribute or derived fact the builder can inject.
    pub(crate) fn provides(&self, symbol: &str) -> bool {
        ATTRIBUTES.contains(&symbol)
            || symbol == STAFF_FLAG
            || symbol.starts_with(LEVEL_FLAG_PREFIX)
            || self
                .section_groups
                .keys()
                .any(|group| format!("{SECTION_GROUP_PREFIX}{}", sanitize(group)) == symbol)
    }
}

/// Construction failure. Turns the whole evaluation into the degraded sentinel result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Collision(#[from] SymbolCollision),
    #[error("stat field '{field}' is not a finite number")]
    NonFiniteStat { field: String },
    #[error("score for question '{question}' is not a finite number")]
    NonFiniteScore { question: String },
}

/// Inputs for one employee/period.
#[derive(Debug, Clone, Copy)]
pub struct ContextInput<'a> {
    pub stats: Option<&'a StatRecord>,
    pub scores: &'a ScoreMap,
    pub employee: &'a EmployeeProfile,
    pub questions: &'a [Question],
}

/// Symbol table owned by a single evaluation call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: BTreeMap<Symbol, Value>,
    registry: SymbolRegistry,
    /// Symbols still owned by a stat field; a score or question id may take them over.
    stat_owned: BTreeSet<Symbol>,
}

impl Context {
    pub fn get(&self, symbol: &str) -> Option<&Value> {
        self.values.get(symbol)
    }

    pub fn set(&mut self, symbol: Symbol, value: Value) {
        self.values.insert(symbol, value);
    }

    /// Looks `name` up as typed, then with brackets stripped.
    pub fn find(&self, name: &str) -> Option<&Value> {
        self.get(&sanitize(name))
            .or_else(|| self.get(&sanitize(&strip_brackets(name))))
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn bind(&mut self, id: &str, value: Value) -> Result<(), SymbolCollision> {
        let symbol = self.registry.register(id)?;
        self.values.insert(symbol, value);
        Ok(())
    }

    fn bind_stat(&mut self, field: &str, value: f64) -> Result<(), SymbolCollision> {
        let symbol = self.registry.register(field)?;
        self.values.insert(symbol.clone(), Value::Number(value));
        self.stat_owned.insert(symbol);
        Ok(())
    }

    /// Binds a score, overriding a stat field that maps to the same symbol.
    fn bind_score(&mut self, id: &str, value: f64) -> Result<(), SymbolCollision> {
        let (symbol, _) = self.claim(id)?;
        self.stat_owned.remove(&symbol);
        self.values.insert(symbol, Value::Number(value));
        Ok(())
    }

    /// Zero for an unrated question. A stat value under a taken-over symbol is dropped.
    fn seed(&mut self, id: &str) -> Result<(), SymbolCollision> {
        let (symbol, took_over) = self.claim(id)?;
        if took_over {
            self.values.insert(symbol, Value::Number(0.0));
        } else {
            self.values.entry(symbol).or_insert(Value::Number(0.0));
        }
        Ok(())
    }

    /// Registers `id`; the flag is set when it displaced a stat field.
    fn claim(&mut self, id: &str) -> Result<(Symbol, bool), SymbolCollision> {
        match self.registry.register(id) {
            Ok(symbol) => Ok((symbol, false)),
            Err(collision) if self.stat_owned.remove(&collision.symbol) => {
                debug!(
                    symbol = %collision.symbol,
                    stat_field = %collision.first,
                    id = %collision.second,
                    "score id overrides stat field"
                );
                Ok((self.registry.reassign(id), true))
            }
            Err(collision) => Err(collision),
        }
    }
}

/// Assembles the context for one evaluation.
///
/// Scores and question ids take a symbol over from a stat field that maps to
/// the same symbol (`KPI-1` over `KPI_1`). Any other pair of distinct ids
/// sharing a symbol is a collision. `rule_names` are registered so that a rule
/// whose symbol clashes with a question or stat field is caught here instead
/// of silently shadowing it.
pub fn build_context<'n>(
    input: ContextInput<'_>,
    settings: &ContextSettings,
    rule_names: impl IntoIterator<Item = &'n str>,
) -> Result<Context, SetupError> {
    let mut context = Context::default();

    if let Some(stats) = input.stats {
        for (field, value) in stats.fields() {
            if !value.is_finite() {
                return Err(SetupError::NonFiniteStat {
                    field: field.to_string(),
                });
            }
            context.bind_stat(field, value)?;
        }
    }

    for (question, value) in input.scores {
        if !value.is_finite() {
            return Err(SetupError::NonFiniteScore {
                question: question.clone(),
            });
        }
        context.bind_score(question, *value)?;
        let stripped = strip_brackets(question);
        if !stripped.is_empty() && stripped != question.trim() {
            context.bind_score(&stripped, *value)?;
        }
    }

    bind_employee_facts(&mut context, input.employee, settings)?;

    for question in input.questions {
        context.seed(&question.id)?;
        let stripped = strip_brackets(&question.id);
        if !stripped.is_empty() && stripped != question.id.trim() {
            context.seed(&stripped)?;
        }
    }

    for name in rule_names {
        context.registry.register(name)?;
    }

    Ok(context)
}

fn bind_employee_facts(
    context: &mut Context,
    employee: &EmployeeProfile,
    settings: &ContextSettings,
) -> Result<(), SymbolCollision> {
    let level = employee.level.as_deref().map(str::trim).unwrap_or("");
    let section = employee.section.as_deref().map(str::trim).unwrap_or("");
    let department = employee.department.as_deref().map(str::trim).unwrap_or("");

    context.bind("level", Value::Text(level.to_string()))?;
    context.bind("section", Value::Text(section.to_string()))?;
    context.bind("department", Value::Text(department.to_string()))?;

    context.bind(STAFF_FLAG, Value::Bool(!level.is_empty() && settings.is_staff(level)))?;
    for known in &settings.staff_levels {
        let flag = format!("{LEVEL_FLAG_PREFIX}{}", sanitize(known));
        context.bind(&flag, Value::Bool(known.trim().eq_ignore_ascii_case(level)))?;
    }
    if !level.is_empty() && !settings.is_staff(level) {
        let flag = format!("{LEVEL_FLAG_PREFIX}{}", sanitize(level));
        context.bind(&flag, Value::Bool(true))?;
    }

    for (group, sections) in &settings.section_groups {
        let member = !section.is_empty()
            && sections
                .iter()
                .any(|candidate| candidate.trim().eq_ignore_ascii_case(section));
        let flag = format!("{SECTION_GROUP_PREFIX}{}", sanitize(group));
        context.bind(&flag, Value::Bool(member))?;
    }

    Ok(())
}
