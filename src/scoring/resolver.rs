//! Fixed-round resolution of Variable rules.
//!
//! Variable rules may reference each other in any order and there is no
//! dependency graph. Every rule is evaluated once per round, in the order the
//! [`RuleSet`](super::rules::RuleSet) provides, for a fixed number of rounds.
//! Acyclic chains settle once the round count exceeds the chain depth. Cyclic
//! rules never error; they hold whatever value the last round produced.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use super::context::Context;
use super::formula::{Scope, Value};
use super::rules::CompiledRule;
use super::warnings::{IntegrityWarning, WarningKind, WarningLog};

pub const DEFAULT_ROUNDS: usize = 5;

/// Variable values resolved by one evaluation call, keyed by rule name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionState {
    values: BTreeMap<String, Value>,
}

impl ResolutionState {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.values
    }
}

struct VariableScope<'a> {
    context: &'a Context,
    state: &'a ResolutionState,
    rule_names: &'a BTreeSet<&'a str>,
}

impl Scope for VariableScope<'_> {
    fn lookup(&self, symbol: &str) -> Option<Value> {
        self.context.get(symbol).cloned()
    }

    fn reference(&self, name: &str) -> Option<Value> {
        let name = name.trim();
        if self.rule_names.contains(name) {
            // A known rule not reached yet reads as 0 without a warning.
            return Some(
                self.state
                    .get(name)
                    .cloned()
                    .unwrap_or(Value::Number(0.0)),
            );
        }
        self.context.find(name).cloned()
    }
}

/// Runs `rounds` passes over `rules`, writing each result into `context`
/// under the rule's symbol as soon as it is computed. Rule symbols read as 0
/// until their rule first runs.
pub fn resolve(
    rules: &[CompiledRule],
    context: &mut Context,
    rounds: usize,
    warnings: &mut WarningLog,
) -> ResolutionState {
    let rule_names: BTreeSet<&str> = rules.iter().map(|rule| rule.name.as_str()).collect();
    let mut state = ResolutionState::default();

    for rule in rules {
        if context.get(rule.symbol.as_str()).is_none() {
            context.set(rule.symbol.clone(), Value::Number(0.0));
        }
    }

    for round in 0..rounds {
        for rule in rules {
            let value = {
                let scope = VariableScope {
                    context: &*context,
                    state: &state,
                    rule_names: &rule_names,
                };
                evaluate_rule(rule, &scope, warnings)
            };
            context.set(rule.symbol.clone(), value.clone());
            state.values.insert(rule.name.clone(), value);
        }
        trace!(round, rules = rules.len(), "variable round complete");
    }

    state
}

/// A failing rule reads as 0 for this round; other rules are unaffected.
fn evaluate_rule(rule: &CompiledRule, scope: &dyn Scope, warnings: &mut WarningLog) -> Value {
    let outcome = match &rule.formula {
        Ok(formula) => formula.evaluate(scope),
        Err(error) => Err(error.clone()),
    };
    match outcome {
        Ok(evaluation) => {
            warnings.unresolved(&rule.name, evaluation.unresolved);
            evaluation.value
        }
        Err(error) => {
            warnings.push(IntegrityWarning::new(
                &rule.name,
                WarningKind::MalformedFormula,
                error.to_string(),
            ));
            Value::Number(0.0)
        }
    }
}
