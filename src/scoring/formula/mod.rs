//! Arithmetic/comparison/ternary formula language.
//!
//! Formulas are parsed once into an expression tree and evaluated any number of
//! times against a [`Scope`]. Bracketed `[Name]` references are resolved through
//! the scope at evaluation time, so the tree never changes between resolver
//! rounds.

mod eval;
mod lexer;
mod parser;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use parser::Expr;

/// Runtime value produced by formulas and bound in evaluation contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    /// Numeric view; booleans count as 1 or 0.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            Value::Text(_) => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Number(value) => *value != 0.0 && !value.is_nan(),
            Value::Bool(flag) => *flag,
            Value::Text(text) => !text.is_empty(),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Text(_) => "text",
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Name resolution for formula evaluation.
pub trait Scope {
    /// Value bound to a bare identifier.
    fn lookup(&self, symbol: &str) -> Option<Value>;

    /// Value bound to a bracketed `[name]` reference.
    fn reference(&self, name: &str) -> Option<Value>;
}

/// Parse or evaluation failure for a single formula.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("unexpected character '{found}' at offset {position}")]
    UnexpectedCharacter { position: usize, found: char },
    #[error("invalid number literal '{literal}' at offset {position}")]
    InvalidNumber { position: usize, literal: String },
    #[error("unterminated string starting at offset {position}")]
    UnterminatedString { position: usize },
    #[error("expected {expected} at offset {position}, found {found}")]
    UnexpectedToken {
        position: usize,
        found: String,
        expected: &'static str,
    },
    #[error("formula ended early, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("formula nests deeper than {limit} levels")]
    TooDeep { limit: usize },
    #[error("unknown function '{name}' at offset {position}")]
    UnknownFunction { name: String, position: usize },
    #[error("function '{function}' does not accept {found} argument(s)")]
    Arity { function: &'static str, found: usize },
    #[error("cannot apply {operation} to a {found} value")]
    TypeMismatch {
        operation: &'static str,
        found: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NonFinite,
}

/// Result of a successful evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    /// Names that resolved to nothing and were read as 0. References keep their brackets.
    pub unresolved: Vec<String>,
}

/// A parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct bracketed reference names, sorted.
    pub fn references(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        collect_names(&self.expr, &mut names, true);
        names
    }

    /// Distinct bare identifiers, sorted.
    pub fn symbols(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        collect_names(&self.expr, &mut names, false);
        names
    }

    pub fn evaluate(&self, scope: &dyn Scope) -> Result<Evaluation, FormulaError> {
        let mut unresolved = Vec::new();
        let value = eval::evaluate(&self.expr, scope, &mut unresolved)?;
        if let Value::Number(number) = value {
            if !number.is_finite() {
                return Err(FormulaError::NonFinite);
            }
        }
        Ok(Evaluation { value, unresolved })
    }
}

fn collect_names<'a>(expr: &'a Expr, names: &mut BTreeSet<&'a str>, references: bool) {
    match expr {
        Expr::Number(_) | Expr::Bool(_) | Expr::Text(_) => {}
        Expr::Symbol(name) => {
            if !references {
                names.insert(name);
            }
        }
        Expr::Reference(name) => {
            if references {
                names.insert(name);
            }
        }
        Expr::Unary(_, operand) => collect_names(operand, names, references),
        Expr::Binary(_, left, right) => {
            collect_names(left, names, references);
            collect_names(right, names, references);
        }
        Expr::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            collect_names(cond, names, references);
            collect_names(then_expr, names, references);
            collect_names(else_expr, names, references);
        }
        Expr::Call(_, args) => {
            for arg in args {
                collect_names(arg, names, references);
            }
        }
    }
}

/// Compiles an ordered condition table into a nested conditional formula.
///
/// `[(c1, s1), (c2, s2)]` with default `d` becomes `(c1) ? (s1) : ((c2) ? (s2) : (d))`.
pub fn compile_conditions<'a, I>(conditions: I, default: f64) -> String
where
    I: IntoIterator<Item = (&'a str, f64)>,
    I::IntoIter: DoubleEndedIterator,
{
    conditions
        .into_iter()
        .rev()
        .fold(format_number(default), |otherwise, (condition, score)| {
            format!("({}) ? ({}) : ({})", condition.trim(), format_number(score), otherwise)
        })
}

fn format_number(value: f64) -> String {
    if value.is_finite() {
        format!("{value}")
    } else {
        "0".to_string()
    }
}
