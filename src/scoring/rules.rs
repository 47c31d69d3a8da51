//! Rule classification, ordering and static validation.

use std::collections::{BTreeMap, BTreeSet};

use super::context::ContextSettings;
use super::domain::{Question, Rule, RuleKind, SimpleCondition, StatRecord};
use super::formula::{compile_conditions, Formula, FormulaError};
use super::symbol::{sanitize, strip_brackets, Symbol};
use super::warnings::{IntegrityWarning, WarningKind};

/// Compiles a simple-mode condition table into an equivalent nested conditional.
pub fn compile_simple_mode(conditions: &[SimpleCondition], default: f64) -> String {
    compile_conditions(
        conditions
            .iter()
            .map(|row| (row.condition.as_str(), row.score)),
        default,
    )
}

/// A rule with its formula parsed once.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    /// Trimmed rule name, the key `[Name]` references match against.
    pub name: String,
    pub symbol: Symbol,
    pub formula: Result<Formula, FormulaError>,
}

impl CompiledRule {
    pub fn compile(rule: Rule) -> Self {
        let name = rule.name.trim().to_string();
        let formula = Formula::parse(&rule.effective_formula());
        Self {
            symbol: Symbol::from_id(&name),
            name,
            formula,
            rule,
        }
    }

    /// Length used for ordering; counts characters, not bytes.
    fn name_len(&self) -> usize {
        self.name.chars().count()
    }
}

/// Rules split by kind, each list ordered by decreasing name length.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    variables: Vec<CompiledRule>,
    scores: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn compile(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut set = Self::default();
        for rule in rules {
            let compiled = CompiledRule::compile(rule);
            match compiled.rule.kind {
                RuleKind::Variable => set.variables.push(compiled),
                RuleKind::Score => set.scores.push(compiled),
            }
        }
        // Stable sort keeps authoring order among equal lengths.
        set.variables.sort_by_key(|rule| std::cmp::Reverse(rule.name_len()));
        set.scores.sort_by_key(|rule| std::cmp::Reverse(rule.name_len()));
        set
    }

    pub fn variables(&self) -> &[CompiledRule] {
        &self.variables
    }

    pub fn scores(&self) -> &[CompiledRule] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.variables.len() + self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every rule name, variables first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables
            .iter()
            .chain(&self.scores)
            .map(|rule| rule.name.as_str())
    }

    /// Names declared by more than one rule, sorted.
    pub fn duplicate_names(&self) -> Vec<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for name in self.names() {
            *counts.entry(name).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name)
            .collect()
    }

    /// Static advisories for the rule-authoring surface. Nothing is evaluated.
    ///
    /// `stat_fields` lists extra stat columns known to exist; the fixed stat
    /// fields are always considered known.
    pub fn integrity_report(
        &self,
        questions: &[Question],
        stat_fields: &[&str],
        settings: &ContextSettings,
    ) -> Vec<IntegrityWarning> {
        let known = KnownNames::collect(self, questions, stat_fields);
        let mut report = BTreeSet::new();

        for name in self.duplicate_names() {
            report.insert(IntegrityWarning::new(
                name,
                WarningKind::DuplicateRuleName,
                format!("rule name '{name}' is declared more than once"),
            ));
        }

        for compiled in self.variables.iter().chain(&self.scores) {
            let rule = &compiled.rule;
            if rule.simple_mode && rule.simple_mode_conditions.is_empty() {
                report.insert(IntegrityWarning::new(
                    &compiled.name,
                    WarningKind::EmptyConditionTable,
                    format!("simple-mode rule always yields {}", rule.default_score),
                ));
            }

            let formula = match &compiled.formula {
                Ok(formula) => formula,
                Err(error) => {
                    report.insert(IntegrityWarning::new(
                        &compiled.name,
                        WarningKind::MalformedFormula,
                        error.to_string(),
                    ));
                    continue;
                }
            };

            for reference in formula.references() {
                if !known.reference(reference, settings) {
                    report.insert(IntegrityWarning::new(
                        &compiled.name,
                        WarningKind::UnresolvedSymbol,
                        format!("[{reference}]"),
                    ));
                }
            }
            for symbol in formula.symbols() {
                if !known.symbol(symbol, settings) {
                    report.insert(IntegrityWarning::new(
                        &compiled.name,
                        WarningKind::UnresolvedSymbol,
                        symbol,
                    ));
                }
            }
        }

        report.into_iter().collect()
    }
}

struct KnownNames<'a> {
    rules: BTreeSet<&'a str>,
    symbols: BTreeSet<String>,
}

impl<'a> KnownNames<'a> {
    fn collect(set: &'a RuleSet, questions: &[Question], stat_fields: &[&str]) -> Self {
        let mut symbols = BTreeSet::new();
        for question in questions {
            symbols.insert(sanitize(&question.id));
            symbols.insert(sanitize(&strip_brackets(&question.id)));
        }
        for field in StatRecord::FIXED_FIELDS.iter().chain(stat_fields) {
            symbols.insert(sanitize(field));
        }
        for rule in set.variables.iter().chain(&set.scores) {
            symbols.insert(rule.symbol.to_string());
        }
        Self {
            rules: set.names().collect(),
            symbols,
        }
    }

    fn symbol(&self, symbol: &str, settings: &ContextSettings) -> bool {
        self.symbols.contains(symbol) || settings.provides(symbol)
    }

    fn reference(&self, name: &str, settings: &ContextSettings) -> bool {
        self.rules.contains(name.trim())
            || self.symbol(&sanitize(name), settings)
            || self.symbol(&sanitize(&strip_brackets(name)), settings)
    }
}
