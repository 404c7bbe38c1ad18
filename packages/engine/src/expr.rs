//! Expression parsing and evaluation for rule conditions and actions
//!
//! Rule conditions are compiled once into a small tagged-variant AST and
//! evaluated by exhaustive matching; no dynamic code execution is
//! involved. The grammar (case-sensitive identifiers bound to context
//! fields):
//!
//! - Atom: identifier, numeric literal, or double-quoted string literal
//! - Comparison: `atom (== | != | >= | <= | > | <) atom`
//! - Logical: `expr && expr`, `expr || expr`, left-associative, with
//!   `&&` binding tighter than `||`; parentheses accepted
//!
//! Action text is never executed: it is a template whose `{identifier}`
//! placeholders are substituted from the context at evaluation time.
//!
//! # Semantics
//!
//! - Strings and booleans compare by exact equality only (`==`/`!=`)
//! - Numbers support the full ordering set; `Int` and `Float` are
//!   coerced so `42 == 42.0` holds
//! - Mixed-type comparisons are an [`EvalError::TypeMismatch`]
//! - `&&`/`||` short-circuit left to right
//! - Unresolvable placeholders in action text render verbatim (action
//!   text is advisory, not control flow)

use crate::config;
use crate::error::{EvalError, ParseError};
use crate::types::Value;
use std::fmt;

/// Trait for resolving identifier references during expression
/// evaluation and action rendering.
///
/// Implementations decide the resolution order; the evaluation context
/// resolves fixed fields before its open map. Returning `None` makes the
/// evaluator fail closed with [`EvalError::UnknownIdentifier`].
pub trait ValueResolver {
    /// Resolve an identifier to its value, or `None` if unknown.
    fn resolve(&self, name: &str) -> Option<Value>;
}

// =============================================================================
// Tokens
// =============================================================================

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CmpOp {
    /// Source form of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
        }
    }

    /// Whether this operator requires numeric operands
    pub fn is_ordering(&self) -> bool {
        matches!(self, CmpOp::Gt | CmpOp::Lt | CmpOp::Ge | CmpOp::Le)
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Cmp(CmpOp),
    And,
    Or,
    LParen,
    RParen,
}

impl Token {
    /// Source-ish rendering for error messages
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => s.clone(),
            Token::Int(i) => i.to_string(),
            Token::Float(f) => f.to_string(),
            Token::Str(s) => format!("\"{s}\""),
            Token::Cmp(op) => op.as_str().to_string(),
            Token::And => "&&".to_string(),
            Token::Or => "||".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    position: usize,
}

// =============================================================================
// Lexer
// =============================================================================

fn tokenize(text: &str) -> Result<Vec<Spanned>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let c = bytes[i] as char;

        match c {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
            }
            '(' => {
                tokens.push(Spanned {
                    token: Token::LParen,
                    position: start,
                });
                i += 1;
            }
            ')' => {
                tokens.push(Spanned {
                    token: Token::RParen,
                    position: start,
                });
                i += 1;
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Spanned {
                        token: Token::Cmp(CmpOp::Eq),
                        position: start,
                    });
                    i += 2;
                } else {
                    return Err(ParseError::new("=", start, "expected '=='"));
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Spanned {
                        token: Token::Cmp(CmpOp::Ne),
                        position: start,
                    });
                    i += 2;
                } else {
                    return Err(ParseError::new("!", start, "expected '!='"));
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Spanned {
                        token: Token::Cmp(CmpOp::Ge),
                        position: start,
                    });
                    i += 2;
                } else {
                    tokens.push(Spanned {
                        token: Token::Cmp(CmpOp::Gt),
                        position: start,
                    });
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Spanned {
                        token: Token::Cmp(CmpOp::Le),
                        position: start,
                    });
                    i += 2;
                } else {
                    tokens.push(Spanned {
                        token: Token::Cmp(CmpOp::Lt),
                        position: start,
                    });
                    i += 1;
                }
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Spanned {
                        token: Token::And,
                        position: start,
                    });
                    i += 2;
                } else {
                    return Err(ParseError::new("&", start, "expected '&&'"));
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Spanned {
                        token: Token::Or,
                        position: start,
                    });
                    i += 2;
                } else {
                    return Err(ParseError::new("|", start, "expected '||'"));
                }
            }
            '"' => {
                let (s, next) = lex_string(text, i)?;
                tokens.push(Spanned {
                    token: Token::Str(s),
                    position: start,
                });
                i = next;
            }
            _ if c.is_ascii_digit() || (c == '-' && next_is_digit(bytes, i + 1)) => {
                let (token, next) = lex_number(text, i)?;
                tokens.push(Spanned {
                    token,
                    position: start,
                });
                i = next;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = i + 1;
                while end < bytes.len()
                    && ((bytes[end] as char).is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                tokens.push(Spanned {
                    token: Token::Ident(text[i..end].to_string()),
                    position: start,
                });
                i = end;
            }
            _ => {
                return Err(ParseError::new(
                    c.to_string(),
                    start,
                    "unexpected character",
                ));
            }
        }
    }

    Ok(tokens)
}

fn next_is_digit(bytes: &[u8], i: usize) -> bool {
    bytes.get(i).is_some_and(|b| (*b as char).is_ascii_digit())
}

/// Lex a double-quoted string starting at `start`. Supports `\"` and
/// `\\` escapes. Returns the unescaped content and the index past the
/// closing quote.
fn lex_string(text: &str, start: usize) -> Result<(String, usize), ParseError> {
    let bytes = text.as_bytes();
    let mut out = String::new();
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Ok((out, i + 1)),
            b'\\' => match bytes.get(i + 1) {
                Some(b'"') => {
                    out.push('"');
                    i += 2;
                }
                Some(b'\\') => {
                    out.push('\\');
                    i += 2;
                }
                _ => {
                    return Err(ParseError::new("\\", i, "invalid escape sequence"));
                }
            },
            _ => {
                // Multi-byte UTF-8 sequences pass through unchanged
                let ch_len = utf8_len(bytes[i]);
                out.push_str(&text[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    Err(ParseError::new("\"", start, "unterminated string literal"))
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}

fn lex_number(text: &str, start: usize) -> Result<(Token, usize), ParseError> {
    let bytes = text.as_bytes();
    let mut i = start;
    if bytes[i] == b'-' {
        i += 1;
    }

    let mut is_float = false;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => i += 1,
            b'.' if !is_float && next_is_digit(bytes, i + 1) => {
                is_float = true;
                i += 1;
            }
            _ => break,
        }
    }

    let literal = &text[start..i];
    if is_float {
        literal
            .parse::<f64>()
            .map(|f| (Token::Float(f), i))
            .map_err(|_| ParseError::new(literal, start, "invalid numeric literal"))
    } else {
        literal
            .parse::<i64>()
            .map(|n| (Token::Int(n), i))
            .map_err(|_| ParseError::new(literal, start, "invalid numeric literal"))
    }
}

// =============================================================================
// AST
// =============================================================================

/// Leaf of a comparison: an identifier or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// Identifier resolved against the evaluation context at eval time
    Ident(String),
    /// Numeric or string literal
    Literal(Value),
}

/// A parsed rule condition.
///
/// Every leaf is a comparison, so logical operands are boolean by
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `left op right`
    Comparison {
        left: Atom,
        op: CmpOp,
        right: Atom,
    },
    /// Short-circuit conjunction
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit disjunction
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate this expression against a resolver.
    ///
    /// Unknown identifiers and mixed-type comparisons return an
    /// [`EvalError`]; callers treat that as "rule not triggered".
    pub fn evaluate<R: ValueResolver>(&self, resolver: &R) -> Result<bool, EvalError> {
        match self {
            Expr::Comparison { left, op, right } => {
                let lhs = resolve_atom(left, resolver)?;
                let rhs = resolve_atom(right, resolver)?;
                compare(&lhs, *op, &rhs)
            }
            // Logical operators short-circuit left to right
            Expr::And(left, right) => {
                if !left.evaluate(resolver)? {
                    return Ok(false);
                }
                right.evaluate(resolver)
            }
            Expr::Or(left, right) => {
                if left.evaluate(resolver)? {
                    return Ok(true);
                }
                right.evaluate(resolver)
            }
        }
    }
}

fn resolve_atom<R: ValueResolver>(atom: &Atom, resolver: &R) -> Result<Value, EvalError> {
    match atom {
        Atom::Ident(name) => resolver
            .resolve(name)
            .ok_or_else(|| EvalError::UnknownIdentifier(name.clone())),
        Atom::Literal(value) => Ok(value.clone()),
    }
}

/// Compare two resolved values.
///
/// - Numbers (Int/Float coerced) support the full operator set
/// - Strings and booleans support `==`/`!=` only
/// - Anything else is a type mismatch
fn compare(left: &Value, op: CmpOp, right: &Value) -> Result<bool, EvalError> {
    let mismatch = || EvalError::TypeMismatch {
        operator: op.as_str(),
        left: left.kind(),
        right: right.kind(),
    };

    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return Ok(match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Gt => a > b,
            CmpOp::Lt => a < b,
            CmpOp::Ge => a >= b,
            CmpOp::Le => a <= b,
        });
    }

    if op.is_ordering() {
        return Err(mismatch());
    }

    let equal = match (left, right) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => return Err(mismatch()),
    };

    Ok(match op {
        CmpOp::Eq => equal,
        CmpOp::Ne => !equal,
        // Ordering operators already rejected above
        _ => return Err(mismatch()),
    })
}

// =============================================================================
// Parser
// =============================================================================

/// Parse a rule condition into an [`Expr`].
///
/// Precedence, loosest to tightest: `||`, `&&`, comparison. Both logical
/// operators are left-associative. Identifiers are accepted without
/// checking that the context defines them; unknown identifiers become an
/// evaluation-time error so that rules may reference open-map fields.
pub fn parse_condition(text: &str) -> Result<Expr, ParseError> {
    if text.len() > config::MAX_EXPRESSION_LENGTH {
        return Err(ParseError::new(
            "",
            config::MAX_EXPRESSION_LENGTH,
            "condition exceeds maximum length",
        ));
    }

    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: text.len(),
        depth: 0,
    };
    let expr = parser.parse_or()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Byte length of the source, reported as the position of "end of input"
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn error_at_current(&self, message: &str) -> ParseError {
        match self.peek() {
            Some(spanned) => ParseError::new(spanned.token.describe(), spanned.position, message),
            None => ParseError::new("end of input", self.end, message),
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(self.error_at_current("unexpected trailing input"))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_and()?;
        while matches!(self.peek(), Some(s) if s.token == Token::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_term()?;
        while matches!(self.peek(), Some(s) if s.token == Token::And) {
            self.advance();
            let rhs = self.parse_term()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Some(s) if s.token == Token::LParen) {
            self.depth += 1;
            if self.depth > config::MAX_EXPRESSION_DEPTH {
                return Err(self.error_at_current("expression nesting too deep"));
            }
            self.advance();
            let expr = self.parse_or()?;
            match self.advance() {
                Some(s) if s.token == Token::RParen => {
                    self.depth -= 1;
                    Ok(expr)
                }
                Some(s) => Err(ParseError::new(
                    s.token.describe(),
                    s.position,
                    "expected ')'",
                )),
                None => Err(ParseError::new("end of input", self.end, "expected ')'")),
            }
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_atom()?;
        let op = match self.advance() {
            Some(Spanned {
                token: Token::Cmp(op),
                ..
            }) => op,
            Some(s) => {
                return Err(ParseError::new(
                    s.token.describe(),
                    s.position,
                    "expected comparison operator",
                ));
            }
            None => {
                return Err(ParseError::new(
                    "end of input",
                    self.end,
                    "expected comparison operator",
                ));
            }
        };
        let right = self.parse_atom()?;
        Ok(Expr::Comparison { left, op, right })
    }

    fn parse_atom(&mut self) -> Result<Atom, ParseError> {
        match self.advance() {
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) => Ok(Atom::Ident(name)),
            Some(Spanned {
                token: Token::Int(i),
                ..
            }) => Ok(Atom::Literal(Value::Int(i))),
            Some(Spanned {
                token: Token::Float(f),
                ..
            }) => Ok(Atom::Literal(Value::Float(f))),
            Some(Spanned {
                token: Token::Str(s),
                ..
            }) => Ok(Atom::Literal(Value::String(s))),
            Some(s) => Err(ParseError::new(
                s.token.describe(),
                s.position,
                "expected identifier or literal",
            )),
            None => Err(ParseError::new(
                "end of input",
                self.end,
                "expected identifier or literal",
            )),
        }
    }
}

// =============================================================================
// Action templates
// =============================================================================

/// Segment of an action template.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// Literal text, emitted as-is
    Text(String),
    /// `{identifier}` placeholder substituted from the context
    Placeholder(String),
}

/// A parsed action template.
///
/// Action text is advisory: rendering never fails. Placeholders whose
/// identifier the context cannot resolve are left verbatim in the
/// output, e.g. `{missing}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTemplate {
    segments: Vec<Segment>,
}

impl ActionTemplate {
    /// Render this template against a resolver.
    pub fn render<R: ValueResolver>(&self, resolver: &R) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(name) => match resolver.resolve(name) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                },
            }
        }
        out
    }

    /// Identifiers referenced by this template.
    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Text(_) => None,
            })
            .collect()
    }
}

/// Parse an action template.
///
/// A `{` must open a well-formed `{identifier}` placeholder; a stray
/// `{` or `}` is a parse error so malformed templates are caught at
/// authoring time rather than rendered half-substituted.
pub fn parse_action(text: &str) -> Result<ActionTemplate, ParseError> {
    if text.len() > config::MAX_EXPRESSION_LENGTH {
        return Err(ParseError::new(
            "",
            config::MAX_EXPRESSION_LENGTH,
            "action exceeds maximum length",
        ));
    }

    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                if literal_start < i {
                    segments.push(Segment::Text(text[literal_start..i].to_string()));
                }
                let name_start = i + 1;
                let mut end = name_start;
                while end < bytes.len()
                    && ((bytes[end] as char).is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                if end == name_start {
                    return Err(ParseError::new("{", i, "empty placeholder"));
                }
                if bytes.get(end) != Some(&b'}') {
                    return Err(ParseError::new("{", i, "unterminated placeholder"));
                }
                let first = bytes[name_start] as char;
                if !(first.is_ascii_alphabetic() || first == '_') {
                    return Err(ParseError::new(
                        &text[name_start..end],
                        name_start,
                        "placeholder must be an identifier",
                    ));
                }
                segments.push(Segment::Placeholder(text[name_start..end].to_string()));
                i = end + 1;
                literal_start = i;
            }
            b'}' => {
                return Err(ParseError::new("}", i, "unmatched '}'"));
            }
            _ => i += 1,
        }
    }

    if literal_start < text.len() {
        segments.push(Segment::Text(text[literal_start..].to_string()));
    }

    Ok(ActionTemplate { segments })
}
