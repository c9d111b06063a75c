//! The predicate language used by conditional edges and router rules.
//!
//! Conditions are parsed once, at graph compile time, into a small AST and
//! evaluated against a [`StateSnapshot`] on every routing decision. The
//! language covers comparisons (`status == "ready"`, `score >= 0.8`),
//! predicate functions (`contains(tags, "urgent")`, `exists(user.email)`),
//! and the usual boolean combinators with C-like precedence:
//! `!` binds tightest, then `&&`, then `||`.
//!
//! Evaluation is total. A missing key compares as null, ordering against a
//! non-number is false, and no expression panics at run time; the only way a
//! condition can fail is to not parse, which surfaces as a compile error.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::state::StateSnapshot;

/// A parsed, immutable predicate over run state.
///
/// # Examples
///
/// ```
/// use loomflow::condition::Condition;
/// use loomflow::state::StateSnapshot;
/// use serde_json::json;
///
/// let cond = Condition::parse(r#"score >= 0.8 && contains(tags, "vip")"#)?;
///
/// let snapshot = StateSnapshot::from_json(json!({
///     "score": 0.92,
///     "tags": ["vip", "beta"],
/// }));
/// assert!(cond.evaluate(&snapshot));
/// # Ok::<(), loomflow::condition::ConditionParseError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `key op literal`, also produced by `equals(key, lit)`.
    Compare {
        key: String,
        op: CompareOp,
        literal: Literal,
    },
    /// Substring match on strings, membership on arrays.
    Contains { key: String, needle: String },
    StartsWith { key: String, needle: String },
    EndsWith { key: String, needle: String },
    /// String/array/object length strictly greater than `min`.
    LengthGt { key: String, min: usize },
    /// String/array/object length strictly less than `max`.
    LengthLt { key: String, max: usize },
    /// Key present with a non-null value.
    Exists { key: String },
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        };
        f.write_str(s)
    }
}

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Num(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Null => f.write_str("null"),
        }
    }
}

impl Condition {
    /// Parse a condition expression.
    pub fn parse(input: &str) -> Result<Self, ConditionParseError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ConditionParseError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let condition = parser.parse_or()?;
        if let Some(spanned) = parser.peek() {
            return Err(ConditionParseError::UnexpectedToken {
                found: spanned.token.describe(),
                offset: spanned.offset,
            });
        }
        Ok(condition)
    }

    /// Evaluate against a snapshot. Never fails: missing keys read as null.
    pub fn evaluate(&self, snapshot: &StateSnapshot) -> bool {
        match self {
            Condition::Compare { key, op, literal } => {
                compare(lookup(snapshot, key), *op, literal)
            }
            Condition::Contains { key, needle } => match lookup(snapshot, key) {
                Some(Value::String(s)) => s.contains(needle.as_str()),
                Some(Value::Array(items)) => {
                    items.iter().any(|item| item.as_str() == Some(needle))
                }
                _ => false,
            },
            Condition::StartsWith { key, needle } => lookup(snapshot, key)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(needle.as_str())),
            Condition::EndsWith { key, needle } => lookup(snapshot, key)
                .and_then(Value::as_str)
                .is_some_and(|s| s.ends_with(needle.as_str())),
            Condition::LengthGt { key, min } => value_len(lookup(snapshot, key)) > *min,
            Condition::LengthLt { key, max } => value_len(lookup(snapshot, key)) < *max,
            Condition::Exists { key } => {
                lookup(snapshot, key).is_some_and(|v| !v.is_null())
            }
            Condition::Not(inner) => !inner.evaluate(snapshot),
            Condition::And(left, right) => left.evaluate(snapshot) && right.evaluate(snapshot),
            Condition::Or(left, right) => left.evaluate(snapshot) || right.evaluate(snapshot),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { key, op, literal } => write!(f, "{key} {op} {literal}"),
            Condition::Contains { key, needle } => write!(f, "contains({key}, {needle:?})"),
            Condition::StartsWith { key, needle } => {
                write!(f, "starts_with({key}, {needle:?})")
            }
            Condition::EndsWith { key, needle } => write!(f, "ends_with({key}, {needle:?})"),
            Condition::LengthGt { key, min } => write!(f, "length_gt({key}, {min})"),
            Condition::LengthLt { key, max } => write!(f, "length_lt({key}, {max})"),
            Condition::Exists { key } => write!(f, "exists({key})"),
            Condition::Not(inner) => write!(f, "!{inner}"),
            Condition::And(left, right) => write!(f, "({left} && {right})"),
            Condition::Or(left, right) => write!(f, "({left} || {right})"),
        }
    }
}

/// Resolve a possibly dotted key path against the snapshot.
///
/// `user.email` first tries a literal `"user.email"` top-level key, then
/// walks `user` → `email` through nested objects.
fn lookup<'a>(snapshot: &'a StateSnapshot, key: &str) -> Option<&'a Value> {
    if let Some(value) = snapshot.get(key) {
        return Some(value);
    }
    let mut segments = key.split('.');
    let mut current = snapshot.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn value_len(value: Option<&Value>) -> usize {
    match value {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(map)) => map.len(),
        _ => 0,
    }
}

fn compare(value: Option<&Value>, op: CompareOp, literal: &Literal) -> bool {
    match op {
        CompareOp::Eq => literal_eq(value, literal),
        CompareOp::Ne => !literal_eq(value, literal),
        CompareOp::Gt | CompareOp::Lt | CompareOp::Ge | CompareOp::Le => {
            let (Some(lhs), Literal::Num(rhs)) = (value.and_then(Value::as_f64), literal)
            else {
                return false;
            };
            match op {
                CompareOp::Gt => lhs > *rhs,
                CompareOp::Lt => lhs < *rhs,
                CompareOp::Ge => lhs >= *rhs,
                CompareOp::Le => lhs <= *rhs,
                CompareOp::Eq | CompareOp::Ne => unreachable!(),
            }
        }
    }
}

fn literal_eq(value: Option<&Value>, literal: &Literal) -> bool {
    match (value, literal) {
        (None | Some(Value::Null), Literal::Null) => true,
        (Some(Value::String(s)), Literal::Str(lit)) => s == lit,
        (Some(Value::Bool(b)), Literal::Bool(lit)) => b == lit,
        (Some(v), Literal::Num(lit)) => v.as_f64() == Some(*lit),
        _ => false,
    }
}

/// Why an expression failed to parse. Offsets are byte positions into the
/// original expression.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ConditionParseError {
    #[error("empty condition expression")]
    #[diagnostic(code(loomflow::condition::empty))]
    Empty,

    #[error("unexpected character '{found}' at offset {offset}")]
    #[diagnostic(code(loomflow::condition::lex))]
    UnexpectedChar { found: char, offset: usize },

    #[error("unterminated string literal starting at offset {offset}")]
    #[diagnostic(code(loomflow::condition::unterminated_string))]
    UnterminatedString { offset: usize },

    #[error("unexpected {found} at offset {offset}")]
    #[diagnostic(code(loomflow::condition::unexpected_token))]
    UnexpectedToken { found: String, offset: usize },

    #[error("expression ended unexpectedly")]
    #[diagnostic(code(loomflow::condition::unexpected_end))]
    UnexpectedEnd,

    #[error("unknown function '{name}' at offset {offset}")]
    #[diagnostic(
        code(loomflow::condition::unknown_function),
        help(
            "Supported functions: contains, starts_with, ends_with, length_gt, length_lt, equals, exists."
        )
    )]
    UnknownFunction { name: String, offset: usize },

    #[error("{function}: {detail}")]
    #[diagnostic(code(loomflow::condition::bad_argument))]
    InvalidArgument { function: String, detail: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    LParen,
    RParen,
    Comma,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("'{name}'"),
            Token::Str(s) => format!("string {s:?}"),
            Token::Num(n) => format!("number {n}"),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Comma => "','".into(),
            Token::Bang => "'!'".into(),
            Token::AndAnd => "'&&'".into(),
            Token::OrOr => "'||'".into(),
            Token::EqEq => "'=='".into(),
            Token::NotEq => "'!='".into(),
            Token::Gt => "'>'".into(),
            Token::Lt => "'<'".into(),
            Token::Ge => "'>='".into(),
            Token::Le => "'<='".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '-'
}

fn tokenize(input: &str) -> Result<Vec<Spanned>, ConditionParseError> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<CharIndices> = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Spanned { token: Token::LParen, offset });
            }
            ')' => {
                chars.next();
                tokens.push(Spanned { token: Token::RParen, offset });
            }
            ',' => {
                chars.next();
                tokens.push(Spanned { token: Token::Comma, offset });
            }
            '&' => {
                chars.next();
                match chars.next_if(|&(_, c)| c == '&') {
                    Some(_) => tokens.push(Spanned { token: Token::AndAnd, offset }),
                    None => {
                        return Err(ConditionParseError::UnexpectedChar { found: '&', offset });
                    }
                }
            }
            '|' => {
                chars.next();
                match chars.next_if(|&(_, c)| c == '|') {
                    Some(_) => tokens.push(Spanned { token: Token::OrOr, offset }),
                    None => {
                        return Err(ConditionParseError::UnexpectedChar { found: '|', offset });
                    }
                }
            }
            '=' => {
                chars.next();
                match chars.next_if(|&(_, c)| c == '=') {
                    Some(_) => tokens.push(Spanned { token: Token::EqEq, offset }),
                    None => {
                        return Err(ConditionParseError::UnexpectedChar { found: '=', offset });
                    }
                }
            }
            '!' => {
                chars.next();
                match chars.next_if(|&(_, c)| c == '=') {
                    Some(_) => tokens.push(Spanned { token: Token::NotEq, offset }),
                    None => tokens.push(Spanned { token: Token::Bang, offset }),
                }
            }
            '>' => {
                chars.next();
                match chars.next_if(|&(_, c)| c == '=') {
                    Some(_) => tokens.push(Spanned { token: Token::Ge, offset }),
                    None => tokens.push(Spanned { token: Token::Gt, offset }),
                }
            }
            '<' => {
                chars.next();
                match chars.next_if(|&(_, c)| c == '=') {
                    Some(_) => tokens.push(Spanned { token: Token::Le, offset }),
                    None => tokens.push(Spanned { token: Token::Lt, offset }),
                }
            }
            '"' | '\'' => {
                tokens.push(read_string(&mut chars, offset)?);
            }
            c if c.is_ascii_digit() => {
                tokens.push(read_number(input, &mut chars, offset));
            }
            '-' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, c)) if c.is_ascii_digit() => {
                        let spanned = read_number(input, &mut chars, offset);
                        tokens.push(spanned);
                    }
                    _ => return Err(ConditionParseError::UnexpectedChar { found: '-', offset }),
                }
            }
            c if is_ident_char(c) => {
                let mut end = offset;
                while let Some(&(i, c)) = chars.peek() {
                    if is_ident_char(c) {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    token: Token::Ident(input[offset..end].to_string()),
                    offset,
                });
            }
            other => {
                return Err(ConditionParseError::UnexpectedChar { found: other, offset });
            }
        }
    }

    Ok(tokens)
}

fn read_string(
    chars: &mut Peekable<CharIndices>,
    offset: usize,
) -> Result<Spanned, ConditionParseError> {
    let (_, quote) = chars
        .next()
        .ok_or(ConditionParseError::UnterminatedString { offset })?;
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(ConditionParseError::UnterminatedString { offset }),
            Some((_, c)) if c == quote => break,
            Some((_, '\\')) => match chars.next() {
                None => return Err(ConditionParseError::UnterminatedString { offset }),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, escaped)) => out.push(escaped),
            },
            Some((_, c)) => out.push(c),
        }
    }
    Ok(Spanned {
        token: Token::Str(out),
        offset,
    })
}

fn read_number(input: &str, chars: &mut Peekable<CharIndices>, start: usize) -> Spanned {
    let mut end = start;
    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            end = i + c.len_utf8();
            chars.next();
        } else {
            break;
        }
    }
    // The scanned slice only needs digits, '.', and a leading '-', all of
    // which parse; a pathological slice like "1.2.3" falls back to 0.
    let parsed = input[start..end].parse::<f64>().unwrap_or(0.0);
    Spanned {
        token: Token::Num(parsed),
        offset: start,
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ConditionParseError> {
        match self.next() {
            Some(spanned) if spanned.token == *expected => Ok(()),
            Some(spanned) => Err(ConditionParseError::UnexpectedToken {
                found: spanned.token.describe(),
                offset: spanned.offset,
            }),
            None => Err(ConditionParseError::UnexpectedEnd),
        }
    }

    fn parse_or(&mut self) -> Result<Condition, ConditionParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(s) if s.token == Token::OrOr) {
            self.next();
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition, ConditionParseError> {
        let mut left = self.parse_unary()?;
        while matches!(self.peek(), Some(s) if s.token == Token::AndAnd) {
            self.next();
            let right = self.parse_unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Condition, ConditionParseError> {
        if matches!(self.peek(), Some(s) if s.token == Token::Bang) {
            self.next();
            let inner = self.parse_unary()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Condition, ConditionParseError> {
        match self.next() {
            None => Err(ConditionParseError::UnexpectedEnd),
            Some(spanned) => match spanned.token {
                Token::LParen => {
                    let inner = self.parse_or()?;
                    self.expect(&Token::RParen)?;
                    Ok(inner)
                }
                Token::Ident(name) => {
                    if matches!(self.peek(), Some(s) if s.token == Token::LParen) {
                        self.parse_call(&name, spanned.offset)
                    } else {
                        self.parse_comparison(name)
                    }
                }
                other => Err(ConditionParseError::UnexpectedToken {
                    found: other.describe(),
                    offset: spanned.offset,
                }),
            },
        }
    }

    /// `key op literal`, where the key ident has already been consumed.
    fn parse_comparison(&mut self, key: String) -> Result<Condition, ConditionParseError> {
        let op = match self.next() {
            None => return Err(ConditionParseError::UnexpectedEnd),
            Some(spanned) => match spanned.token {
                Token::EqEq => CompareOp::Eq,
                Token::NotEq => CompareOp::Ne,
                Token::Gt => CompareOp::Gt,
                Token::Lt => CompareOp::Lt,
                Token::Ge => CompareOp::Ge,
                Token::Le => CompareOp::Le,
                other => {
                    return Err(ConditionParseError::UnexpectedToken {
                        found: other.describe(),
                        offset: spanned.offset,
                    });
                }
            },
        };
        let literal = self.parse_literal()?;
        Ok(Condition::Compare { key, op, literal })
    }

    fn parse_literal(&mut self) -> Result<Literal, ConditionParseError> {
        match self.next() {
            None => Err(ConditionParseError::UnexpectedEnd),
            Some(spanned) => match spanned.token {
                Token::Str(s) => Ok(Literal::Str(s)),
                Token::Num(n) => Ok(Literal::Num(n)),
                Token::Ident(word) => match word.as_str() {
                    "true" => Ok(Literal::Bool(true)),
                    "false" => Ok(Literal::Bool(false)),
                    "null" => Ok(Literal::Null),
                    other => Err(ConditionParseError::UnexpectedToken {
                        found: format!("'{other}'"),
                        offset: spanned.offset,
                    }),
                },
                other => Err(ConditionParseError::UnexpectedToken {
                    found: other.describe(),
                    offset: spanned.offset,
                }),
            },
        }
    }

    fn parse_call(&mut self, name: &str, offset: usize) -> Result<Condition, ConditionParseError> {
        self.expect(&Token::LParen)?;
        let key = match self.next() {
            Some(Spanned {
                token: Token::Ident(key),
                ..
            }) => key,
            Some(spanned) => {
                return Err(ConditionParseError::UnexpectedToken {
                    found: spanned.token.describe(),
                    offset: spanned.offset,
                });
            }
            None => return Err(ConditionParseError::UnexpectedEnd),
        };

        let condition = match name {
            "exists" => Condition::Exists { key },
            "contains" | "starts_with" | "ends_with" => {
                self.expect(&Token::Comma)?;
                let needle = match self.parse_literal()? {
                    Literal::Str(s) => s,
                    other => {
                        return Err(ConditionParseError::InvalidArgument {
                            function: name.to_string(),
                            detail: format!("expected a string needle, got {other}"),
                        });
                    }
                };
                match name {
                    "contains" => Condition::Contains { key, needle },
                    "starts_with" => Condition::StartsWith { key, needle },
                    _ => Condition::EndsWith { key, needle },
                }
            }
            "length_gt" | "length_lt" => {
                self.expect(&Token::Comma)?;
                let bound = match self.parse_literal()? {
                    Literal::Num(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
                    other => {
                        return Err(ConditionParseError::InvalidArgument {
                            function: name.to_string(),
                            detail: format!("expected a non-negative integer, got {other}"),
                        });
                    }
                };
                if name == "length_gt" {
                    Condition::LengthGt { key, min: bound }
                } else {
                    Condition::LengthLt { key, max: bound }
                }
            }
            "equals" => {
                self.expect(&Token::Comma)?;
                let literal = self.parse_literal()?;
                Condition::Compare {
                    key,
                    op: CompareOp::Eq,
                    literal,
                }
            }
            unknown => {
                return Err(ConditionParseError::UnknownFunction {
                    name: unknown.to_string(),
                    offset,
                });
            }
        };

        self.expect(&Token::RParen)?;
        Ok(condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: serde_json::Value) -> StateSnapshot {
        StateSnapshot::from_json(value)
    }

    #[test]
    fn equality_on_strings_and_numbers() {
        let snap = snapshot(json!({"status": "ready", "count": 3}));
        assert!(Condition::parse(r#"status == "ready""#)
            .unwrap()
            .evaluate(&snap));
        assert!(Condition::parse("count == 3").unwrap().evaluate(&snap));
        assert!(Condition::parse("count != 4").unwrap().evaluate(&snap));
    }

    #[test]
    fn single_quoted_strings_parse() {
        let snap = snapshot(json!({"route": "billing"}));
        assert!(Condition::parse("route == 'billing'")
            .unwrap()
            .evaluate(&snap));
    }

    #[test]
    fn ordering_requires_numbers() {
        let snap = snapshot(json!({"score": 0.75, "label": "high"}));
        assert!(Condition::parse("score >= 0.5").unwrap().evaluate(&snap));
        assert!(!Condition::parse("score > 0.75").unwrap().evaluate(&snap));
        assert!(!Condition::parse("label > 1").unwrap().evaluate(&snap));
        assert!(!Condition::parse("missing < 10").unwrap().evaluate(&snap));
    }

    #[test]
    fn integer_state_compares_against_float_literal() {
        let snap = snapshot(json!({"count": 3}));
        assert!(Condition::parse("count == 3.0").unwrap().evaluate(&snap));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let snap = snapshot(json!({"a": 1, "b": 0, "c": 0}));
        // a == 1 || (b == 1 && c == 1)
        let cond = Condition::parse("a == 1 || b == 1 && c == 1").unwrap();
        assert!(cond.evaluate(&snap));
        let parenthesized = Condition::parse("(a == 1 || b == 1) && c == 1").unwrap();
        assert!(!parenthesized.evaluate(&snap));
    }

    #[test]
    fn negation() {
        let snap = snapshot(json!({"done": true}));
        assert!(!Condition::parse("!done == true").unwrap().evaluate(&snap));
        assert!(Condition::parse("!(done == false)").unwrap().evaluate(&snap));
    }

    #[test]
    fn contains_on_strings_and_arrays() {
        let snap = snapshot(json!({
            "message": "please escalate this",
            "tags": ["urgent", "billing"],
        }));
        assert!(Condition::parse(r#"contains(message, "escalate")"#)
            .unwrap()
            .evaluate(&snap));
        assert!(Condition::parse(r#"contains(tags, "urgent")"#)
            .unwrap()
            .evaluate(&snap));
        assert!(!Condition::parse(r#"contains(tags, "urg")"#)
            .unwrap()
            .evaluate(&snap));
    }

    #[test]
    fn length_functions_count_chars_and_elements() {
        let snap = snapshot(json!({"name": "héllo", "items": [1, 2, 3]}));
        assert!(Condition::parse("length_gt(name, 4)").unwrap().evaluate(&snap));
        assert!(!Condition::parse("length_gt(name, 5)").unwrap().evaluate(&snap));
        assert!(Condition::parse("length_lt(items, 4)").unwrap().evaluate(&snap));
        // Missing keys have length zero.
        assert!(Condition::parse("length_lt(absent, 1)").unwrap().evaluate(&snap));
    }

    #[test]
    fn exists_treats_null_as_absent() {
        let snap = snapshot(json!({"present": 1, "cleared": null}));
        assert!(Condition::parse("exists(present)").unwrap().evaluate(&snap));
        assert!(!Condition::parse("exists(cleared)").unwrap().evaluate(&snap));
        assert!(!Condition::parse("exists(missing)").unwrap().evaluate(&snap));
    }

    #[test]
    fn missing_key_equals_null() {
        let snap = snapshot(json!({}));
        assert!(Condition::parse("missing == null").unwrap().evaluate(&snap));
        assert!(!Condition::parse(r#"missing == "x""#).unwrap().evaluate(&snap));
    }

    #[test]
    fn dotted_paths_traverse_objects() {
        let snap = snapshot(json!({"user": {"email": "a@b.c", "age": 32}}));
        assert!(Condition::parse(r#"ends_with(user.email, ".c")"#)
            .unwrap()
            .evaluate(&snap));
        assert!(Condition::parse("user.age >= 18").unwrap().evaluate(&snap));
    }

    #[test]
    fn equals_function_matches_operator_form() {
        let snap = snapshot(json!({"kind": "faq"}));
        assert!(Condition::parse(r#"equals(kind, "faq")"#)
            .unwrap()
            .evaluate(&snap));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            Condition::parse(""),
            Err(ConditionParseError::Empty)
        ));
        assert!(matches!(
            Condition::parse("a == "),
            Err(ConditionParseError::UnexpectedEnd)
        ));
        assert!(matches!(
            Condition::parse(r#"frob(x, "y")"#),
            Err(ConditionParseError::UnknownFunction { .. })
        ));
        assert!(matches!(
            Condition::parse(r#"contains(x, 3)"#),
            Err(ConditionParseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            Condition::parse(r#"a == "unclosed"#),
            Err(ConditionParseError::UnterminatedString { .. })
        ));
        assert!(matches!(
            Condition::parse("a == 1 extra"),
            Err(ConditionParseError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            Condition::parse("a & b"),
            Err(ConditionParseError::UnexpectedChar { found: '&', .. })
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let original =
            Condition::parse(r#"(score >= 0.5 && contains(tags, "vip")) || exists(flag)"#)
                .unwrap();
        let reparsed = Condition::parse(&original.to_string()).unwrap();
        assert_eq!(original, reparsed);
    }
}
