use super::FormulaError;
use crate::scoring::symbol::is_symbol_char;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    Reference(String),
    True,
    False,
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Bang,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(value) => format!("number {value}"),
            Token::Text(value) => format!("string \"{value}\""),
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Reference(name) => format!("reference [{name}]"),
            Token::True => "true".to_string(),
            Token::False => "false".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Question => "'?'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::Bang => "'!'".to_string(),
            Token::And => "'&&'".to_string(),
            Token::Or => "'||'".to_string(),
            Token::Eq => "'=='".to_string(),
            Token::NotEq => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Ge => "'>='".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, FormulaError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let (position, ch) = chars[index];

        if ch.is_whitespace() {
            index += 1;
            continue;
        }

        if ch == '[' {
            match reference_end(&chars, index) {
                Some(end) => {
                    let name: String = chars[index + 1..end].iter().map(|(_, c)| c).collect();
                    let name = name.trim();
                    if !name.is_empty() {
                        tokens.push(Spanned {
                            token: Token::Reference(name.to_string()),
                            position,
                        });
                    }
                    index = end + 1;
                }
                // unmatched bracket: drop it and lex the rest as plain text
                None => index += 1,
            }
            continue;
        }

        if ch == ']' {
            index += 1;
            continue;
        }

        if ch.is_ascii_digit() || (ch == '.' && next_is_digit(&chars, index)) {
            let (value, next) = lex_number(source, &chars, index)?;
            tokens.push(Spanned {
                token: Token::Number(value),
                position,
            });
            index = next;
            continue;
        }

        if ch == '"' || ch == '\'' {
            let (text, next) = lex_text(&chars, index)?;
            tokens.push(Spanned {
                token: Token::Text(text),
                position,
            });
            index = next;
            continue;
        }

        if is_symbol_char(ch) {
            let start = index;
            while index < chars.len() && is_symbol_char(chars[index].1) {
                index += 1;
            }
            let word: String = chars[start..index].iter().map(|(_, c)| c).collect();
            let token = match word.as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Bang,
                "true" => Token::True,
                "false" => Token::False,
                _ => Token::Ident(word),
            };
            tokens.push(Spanned { token, position });
            continue;
        }

        let next = chars.get(index + 1).map(|(_, c)| *c);
        let (token, width) = match (ch, next) {
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('<', Some('>')) => (Token::NotEq, 2),
            ('=', _) => (Token::Eq, 1),
            ('!', _) => (Token::Bang, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('≤', _) => (Token::Le, 1),
            ('≥', _) => (Token::Ge, 1),
            ('≠', _) => (Token::NotEq, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) | ('−', _) => (Token::Minus, 1),
            ('*', _) | ('×', _) => (Token::Star, 1),
            ('/', _) | ('÷', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('^', _) => (Token::Caret, 1),
            (other, _) => {
                return Err(FormulaError::UnexpectedCharacter {
                    position,
                    found: other,
                })
            }
        };
        tokens.push(Spanned { token, position });
        index += width;
    }

    Ok(tokens)
}

/// Index of the `]` closing the `[` at `open`, unless another `[` opens first.
fn reference_end(chars: &[(usize, char)], open: usize) -> Option<usize> {
    for (offset, (_, ch)) in chars[open + 1..].iter().enumerate() {
        match ch {
            ']' => return Some(open + 1 + offset),
            '[' => return None,
            _ => {}
        }
    }
    None
}

fn next_is_digit(chars: &[(usize, char)], index: usize) -> bool {
    chars
        .get(index + 1)
        .map(|(_, c)| c.is_ascii_digit())
        .unwrap_or(false)
}

fn lex_number(
    source: &str,
    chars: &[(usize, char)],
    start: usize,
) -> Result<(f64, usize), FormulaError> {
    let mut index = start;
    let mut seen_dot = false;
    while index < chars.len() {
        let ch = chars[index].1;
        if ch.is_ascii_digit() {
            index += 1;
        } else if ch == '.' && !seen_dot {
            seen_dot = true;
            index += 1;
        } else {
            break;
        }
    }

    if index < chars.len() && matches!(chars[index].1, 'e' | 'E') {
        let mut probe = index + 1;
        if probe < chars.len() && matches!(chars[probe].1, '+' | '-') {
            probe += 1;
        }
        if probe < chars.len() && chars[probe].1.is_ascii_digit() {
            index = probe;
            while index < chars.len() && chars[index].1.is_ascii_digit() {
                index += 1;
            }
        }
    }

    let begin = chars[start].0;
    let end = chars.get(index).map(|(pos, _)| *pos).unwrap_or(source.len());
    let literal = &source[begin..end];
    literal
        .parse::<f64>()
        .map(|value| (value, index))
        .map_err(|_| FormulaError::InvalidNumber {
            position: begin,
            literal: literal.to_string(),
        })
}

fn lex_text(chars: &[(usize, char)], start: usize) -> Result<(String, usize), FormulaError> {
    let quote = chars[start].1;
    let mut text = String::new();
    let mut index = start + 1;
    while index < chars.len() {
        let ch = chars[index].1;
        if ch == quote {
            return Ok((text, index + 1));
        }
        text.push(ch);
        index += 1;
    }
    Err(FormulaError::UnterminatedString {
        position: chars[start].0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("tokenizes")
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn lexes_references_and_operators() {
        assert_eq!(
            kinds("[Late Penalty] * 2 >= 10"),
            vec![
                Token::Reference("Late Penalty".to_string()),
                Token::Star,
                Token::Number(2.0),
                Token::Ge,
                Token::Number(10.0),
            ]
        );
    }

    #[test]
    fn stray_brackets_are_dropped() {
        assert_eq!(
            kinds("[abc + 1]]"),
            vec![
                Token::Reference("abc + 1".to_string()),
            ]
        );
        assert_eq!(
            kinds("[x + 1"),
            vec![Token::Ident("x".to_string()), Token::Plus, Token::Number(1.0)]
        );
        assert_eq!(
            kinds("[[A]]"),
            vec![Token::Reference("A".to_string())]
        );
    }

    #[test]
    fn keywords_and_unicode_operators() {
        assert_eq!(
            kinds("a ≤ 3 and not b"),
            vec![
                Token::Ident("a".to_string()),
                Token::Le,
                Token::Number(3.0),
                Token::And,
                Token::Bang,
                Token::Ident("b".to_string()),
            ]
        );
    }

    #[test]
    fn numbers_with_fraction_and_exponent() {
        assert_eq!(kinds(".5"), vec![Token::Number(0.5)]);
        assert_eq!(kinds("1.25e2"), vec![Token::Number(125.0)]);
    }

    #[test]
    fn rejects_unknown_characters() {
        let error = tokenize("a # b").expect_err("hash is not an operator");
        assert_eq!(
            error,
            FormulaError::UnexpectedCharacter {
                position: 2,
                found: '#'
            }
        );
    }
}
