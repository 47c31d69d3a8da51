//! Recursive-descent parser for formula text.

use super::lexer::{tokenize, Spanned, Token};
use super::FormulaError;

/// Parsed formula node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Bool(bool),
    Text(String),
    /// Bare identifier resolved against the evaluation context.
    Symbol(String),
    /// `[Name]` cross-reference to another rule or a context symbol.
    Reference(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Min,
    Max,
    Abs,
    Round,
    Floor,
    Ceil,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "abs" => Some(Self::Abs),
            "round" => Some(Self::Round),
            "floor" => Some(Self::Floor),
            "ceil" => Some(Self::Ceil),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Round => "round",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
        }
    }

    fn accepts(self, count: usize) -> bool {
        match self {
            Self::Min | Self::Max => count >= 1,
            Self::Round => count == 1 || count == 2,
            Self::Abs | Self::Floor | Self::Ceil => count == 1,
        }
    }
}

/// Deepest expression tree a formula may build. Each parenthesis, unary
/// operator, conditional and chained binary operator counts as one level.
pub(crate) const MAX_DEPTH: usize = 128;

pub(crate) fn parse(source: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(FormulaError::Empty);
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
    };
    let expr = parser.ternary()?;
    match parser.peek() {
        None => Ok(expr),
        Some(extra) => Err(FormulaError::UnexpectedToken {
            position: extra.position,
            found: extra.token.describe(),
            expected: "end of formula",
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.cursor)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|spanned| &spanned.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let next = self.tokens.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        next
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_token() == Some(token) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), FormulaError> {
        match self.advance() {
            Some(spanned) if spanned.token == token => Ok(()),
            Some(spanned) => Err(FormulaError::UnexpectedToken {
                position: spanned.position,
                found: spanned.token.describe(),
                expected,
            }),
            None => Err(FormulaError::UnexpectedEnd { expected }),
        }
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn ternary(&mut self) -> Result<Expr, FormulaError> {
        self.descend()?;
        let expr = self.conditional();
        self.depth -= 1;
        expr
    }

    fn conditional(&mut self) -> Result<Expr, FormulaError> {
        let cond = self.or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then_expr = self.ternary()?;
        self.expect(Token::Colon, "':' in conditional")?;
        let else_expr = self.ternary()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    fn or(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.and()?;
        let mut chained = 0;
        while self.eat(&Token::Or) {
            self.descend()?;
            chained += 1;
            let right = self.and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth -= chained;
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.equality()?;
        let mut chained = 0;
        while self.eat(&Token::And) {
            self.descend()?;
            chained += 1;
            let right = self.equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth -= chained;
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.comparison()?;
        let mut chained = 0;
        loop {
            let op = match self.peek_token() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.cursor += 1;
            self.descend()?;
            chained += 1;
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
        self.depth -= chained;
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.additive()?;
        let mut chained = 0;
        loop {
            let op = match self.peek_token() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.cursor += 1;
            self.descend()?;
            chained += 1;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
        self.depth -= chained;
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.multiplicative()?;
        let mut chained = 0;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.cursor += 1;
            self.descend()?;
            chained += 1;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
        self.depth -= chained;
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;
        let mut chained = 0;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.cursor += 1;
            self.descend()?;
            chained += 1;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        self.depth -= chained;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        let op = match self.peek_token() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Bang) => UnaryOp::Not,
            _ => return self.power(),
        };
        self.cursor += 1;
        self.descend()?;
        let operand = self.unary();
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(operand?)))
    }

    // `-2 ^ 2` is `-(2 ^ 2)`; the exponent may itself carry a sign.
    fn power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.primary()?;
        if self.eat(&Token::Caret) {
            self.descend()?;
            let exponent = self.unary();
            self.depth -= 1;
            return Ok(binary(BinaryOp::Pow, base, exponent?));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let Some(spanned) = self.advance() else {
            return Err(FormulaError::UnexpectedEnd {
                expected: "operand",
            });
        };

        match spanned.token {
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::Text(text) => Ok(Expr::Text(text)),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Reference(name) => Ok(Expr::Reference(name)),
            Token::Ident(name) => {
                if self.peek_token() == Some(&Token::LParen) {
                    return self.call(name, spanned.position);
                }
                Ok(Expr::Symbol(name))
            }
            Token::LParen => {
                let inner = self.ternary()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(FormulaError::UnexpectedToken {
                position: spanned.position,
                found: other.describe(),
                expected: "operand",
            }),
        }
    }

    fn call(&mut self, name: String, position: usize) -> Result<Expr, FormulaError> {
        let function =
            Function::from_name(&name).ok_or(FormulaError::UnknownFunction { name, position })?;
        self.expect(Token::LParen, "'('")?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.ternary()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(Token::RParen, "')' after arguments")?;
                break;
            }
        }

        if !function.accepts(args.len()) {
            return Err(FormulaError::Arity {
                function: function.name(),
                found: args.len(),
            });
        }
        Ok(Expr::Call(function, args))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary(op, Box::new(left), Box::new(right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(value: f64) -> Expr {
        Expr::Number(value)
    }

    fn sym(name: &str) -> Expr {
        Expr::Symbol(name.to_string())
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("1 + 2 * 3").expect("parses");
        assert_eq!(
            expr,
            binary(BinaryOp::Add, num(1.0), binary(BinaryOp::Mul, num(2.0), num(3.0)))
        );
    }

    #[test]
    fn ternary_is_right_associative() {
        let expr = parse("a ? 1 : b ? 2 : 3").expect("parses");
        assert_eq!(
            expr,
            Expr::Conditional {
                cond: Box::new(sym("a")),
                then_expr: Box::new(num(1.0)),
                else_expr: Box::new(Expr::Conditional {
                    cond: Box::new(sym("b")),
                    then_expr: Box::new(num(2.0)),
                    else_expr: Box::new(num(3.0)),
                }),
            }
        );
    }

    #[test]
    fn unary_minus_applies_after_power() {
        let expr = parse("-2 ^ 2").expect("parses");
        assert_eq!(
            expr,
            Expr::Unary(
                UnaryOp::Neg,
                Box::new(binary(BinaryOp::Pow, num(2.0), num(2.0)))
            )
        );
    }

    #[test]
    fn bracket_contents_are_taken_verbatim_as_a_name() {
        assert_eq!(
            parse("[Late Penalty] + [Q-1]").expect("parses"),
            binary(
                BinaryOp::Add,
                Expr::Reference("Late Penalty".to_string()),
                Expr::Reference("Q-1".to_string())
            )
        );
    }

    #[test]
    fn deep_nesting_is_rejected_before_the_stack_runs_out() {
        let parens = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        let negations = format!("{}1", "-".repeat(500));
        let nots = format!("{}true", "!".repeat(500));
        let powers = format!("{}2", "2 ^ ".repeat(500));
        let unclosed = "(".repeat(100_000);
        for source in [parens, negations, nots, powers, unclosed] {
            assert_eq!(
                parse(&source),
                Err(FormulaError::TooDeep { limit: MAX_DEPTH }),
                "{}",
                &source[..20]
            );
        }
    }

    #[test]
    fn long_operator_chains_are_bounded_too() {
        let sum = format!("{}1", "1 + ".repeat(100_000));
        assert_eq!(parse(&sum), Err(FormulaError::TooDeep { limit: MAX_DEPTH }));
    }

    #[test]
    fn realistic_nesting_stays_within_the_limit() {
        let terms: Vec<String> = (1..=40).map(|n| format!("[Q{n}]")).collect();
        let source = format!("{}{}{}", "(".repeat(30), terms.join(" + "), ")".repeat(30));
        assert!(parse(&source).is_ok());
    }

    #[test]
    fn rejects_unknown_functions_and_bad_arity() {
        assert!(matches!(
            parse("sqrt(4)"),
            Err(FormulaError::UnknownFunction { .. })
        ));
        assert!(matches!(
            parse("abs(1, 2)"),
            Err(FormulaError::Arity { function: "abs", found: 2 })
        ));
    }

    #[test]
    fn reports_trailing_tokens_and_empty_input() {
        assert!(matches!(parse("1 2"), Err(FormulaError::UnexpectedToken { .. })));
        assert_eq!(parse("   "), Err(FormulaError::Empty));
        assert!(matches!(parse("(1 + 2"), Err(FormulaError::UnexpectedEnd { .. })));
    }
}
