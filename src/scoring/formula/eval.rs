//! Tree-walking evaluation of parsed formulas.

use super::parser::{BinaryOp, Expr, Function, UnaryOp};
use super::{FormulaError, Scope, Value};

pub(crate) fn evaluate(
    expr: &Expr,
    scope: &dyn Scope,
    unresolved: &mut Vec<String>,
) -> Result<Value, FormulaError> {
    match expr {
        Expr::Number(value) => Ok(Value::Number(*value)),
        Expr::Bool(flag) => Ok(Value::Bool(*flag)),
        Expr::Text(text) => Ok(Value::Text(text.clone())),

        Expr::Symbol(name) => Ok(scope.lookup(name).unwrap_or_else(|| {
            unresolved.push(name.clone());
            Value::Number(0.0)
        })),

        Expr::Reference(name) => Ok(scope.reference(name).unwrap_or_else(|| {
            unresolved.push(format!("[{name}]"));
            Value::Number(0.0)
        })),

        Expr::Unary(op, operand) => {
            let value = evaluate(operand, scope, unresolved)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                UnaryOp::Plus => number(&value, "unary '+'").map(Value::Number),
                UnaryOp::Neg => number(&value, "unary '-'").map(|n| Value::Number(-n)),
            }
        }

        Expr::Binary(BinaryOp::And, left, right) => {
            if !evaluate(left, scope, unresolved)?.truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(evaluate(right, scope, unresolved)?.truthy()))
        }

        Expr::Binary(BinaryOp::Or, left, right) => {
            if evaluate(left, scope, unresolved)?.truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(evaluate(right, scope, unresolved)?.truthy()))
        }

        Expr::Binary(op, left, right) => {
            let l = evaluate(left, scope, unresolved)?;
            let r = evaluate(right, scope, unresolved)?;
            binary(*op, &l, &r)
        }

        Expr::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            if evaluate(cond, scope, unresolved)?.truthy() {
                evaluate(then_expr, scope, unresolved)
            } else {
                evaluate(else_expr, scope, unresolved)
            }
        }

        Expr::Call(function, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                let value = evaluate(arg, scope, unresolved)?;
                values.push(number(&value, function.name())?);
            }
            Ok(Value::Number(call(*function, &values)))
        }
    }
}

fn number(value: &Value, operation: &'static str) -> Result<f64, FormulaError> {
    value.as_number().ok_or(FormulaError::TypeMismatch {
        operation,
        found: value.kind(),
    })
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, FormulaError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(l, r))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(l, r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let a = number(l, "comparison")?;
            let b = number(r, "comparison")?;
            let result = match op {
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                _ => a >= b,
            };
            Ok(Value::Bool(result))
        }
        _ => {
            let a = number(l, "arithmetic")?;
            let b = number(r, "arithmetic")?;
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err(FormulaError::DivisionByZero);
                    }
                    a / b
                }
                BinaryOp::Mod => {
                    if b == 0.0 {
                        return Err(FormulaError::DivisionByZero);
                    }
                    a - b * (a / b).floor()
                }
                _ => a.powf(b),
            };
            Ok(Value::Number(result))
        }
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Text(_), _) | (_, Value::Text(_)) => false,
        _ => match (l.as_number(), r.as_number()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
    }
}

fn call(function: Function, args: &[f64]) -> f64 {
    let first = args.first().copied().unwrap_or(0.0);
    match function {
        Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
        Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Function::Abs => first.abs(),
        Function::Floor => first.floor(),
        Function::Ceil => first.ceil(),
        Function::Round => {
            let digits = args.get(1).copied().unwrap_or(0.0).clamp(0.0, 15.0) as i32;
            let factor = 10f64.powi(digits);
            (first * factor).round() / factor
        }
    }
}
