//! Rule expression tree, lexer and recursive-descent parser.
//!
//! ### Grammar
//! ```text
//! expr     := and_expr ( "OR" and_expr )*
//! and_expr := unary ( "AND" unary )*
//! unary    := "NOT" unary | primary
//! primary  := "INCLUDES" "(" literal ")"
//!           | "MATCHES" "(" literal ")"
//!           | "(" expr ")"
//! literal  := "'" [^']+ "'"
//! ```
//!
//! OR binds loosest, then AND, then NOT. Keywords are upper-case. Literal
//! text is taken verbatim, without escape processing, so regex
//! backslashes survive and a literal may safely contain ` AND ` or ` OR `.

use regex::{Regex, RegexBuilder};
use std::fmt;
use thiserror::Error;

/// Maximum rule text size in bytes.
pub const MAX_RULE_BYTES: usize = 64 * 1024;
/// Maximum nesting of NOT and parenthesised groups.
pub const MAX_NESTING: usize = 32;
/// Compiled-program ceiling for untrusted `MATCHES` patterns.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("Empty expression")]
    Empty,
    #[error("rule exceeds size limit: {actual} bytes (max {max})")]
    TooLarge { max: usize, actual: usize },
    #[error("rule nesting exceeds limit of {max} at {position}")]
    NestingTooDeep { max: usize, position: usize },
    #[error("unexpected character `{found}` at {position}")]
    UnexpectedChar { found: char, position: usize },
    #[error("unterminated literal starting at {position}")]
    UnterminatedLiteral { position: usize },
    #[error("empty literal at {position}")]
    EmptyLiteral { position: usize },
    #[error("unexpected {found} at {position}, expected {expected}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        position: usize,
    },
    #[error("Unknown expression `{name}` at {position}")]
    UnknownForm { name: String, position: usize },
    #[error("Invalid regex pattern: {pattern} - {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("unexpected trailing input at {position}")]
    TrailingInput { position: usize },
}

/// A compiled `MATCHES` pattern that remembers its source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn compile(source: &str) -> Result<Self, RuleError> {
        let regex = RegexBuilder::new(source)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| RuleError::InvalidPattern {
                pattern: source.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, content: &str) -> bool {
        self.regex.is_match(content)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Parsed rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Not(Box<Expr>),
    Includes(String),
    Matches(Pattern),
}

impl Expr {
    pub fn evaluate(&self, content: &str) -> bool {
        match self {
            Expr::Or(parts) => parts.iter().any(|p| p.evaluate(content)),
            Expr::And(parts) => parts.iter().all(|p| p.evaluate(content)),
            Expr::Not(inner) => !inner.evaluate(content),
            Expr::Includes(needle) => content.contains(needle.as_str()),
            Expr::Matches(pattern) => pattern.is_match(content),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Or(_) => 0,
            Expr::And(_) => 1,
            _ => 2,
        }
    }

    fn fmt_child(&self, child: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let needs_parens = match self {
            Expr::Not(_) => child.precedence() < 2,
            _ => child.precedence() <= self.precedence(),
        };
        if needs_parens {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }
}

/// Canonical text form; parsing it yields an equal tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Or(parts) | Expr::And(parts) => {
                let sep = if matches!(self, Expr::Or(_)) { " OR " } else { " AND " };
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    self.fmt_child(p, f)?;
                }
                Ok(())
            }
            Expr::Not(inner) => {
                f.write_str("NOT ")?;
                self.fmt_child(inner, f)
            }
            Expr::Includes(s) => write!(f, "INCLUDES('{s}')"),
            Expr::Matches(p) => write!(f, "MATCHES('{}')", p.as_str()),
        }
    }
}

/// Parse rule text into a validated expression tree. Regex patterns are
/// compiled here, so a successful parse can be evaluated without errors.
pub fn parse(input: &str) -> Result<Expr, RuleError> {
    if input.len() > MAX_RULE_BYTES {
        return Err(RuleError::TooLarge {
            max: MAX_RULE_BYTES,
            actual: input.len(),
        });
    }
    let tokens = Lexer::new(input).lex()?;
    let mut parser = Parser {
        tokens,
        index: 0,
        nesting: 0,
    };
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Literal(&'a str),
    LParen,
    RParen,
    Eof,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "`{w}`"),
            Token::Literal(l) => write!(f, "literal '{l}'"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Spanned<'a> {
    token: Token<'a>,
    position: usize,
}

struct Lexer<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    fn lex(mut self) -> Result<Vec<Spanned<'a>>, RuleError> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.input[self.offset..].chars().next() {
            let start = self.offset;
            match ch {
                c if c.is_whitespace() => self.offset += c.len_utf8(),
                '(' => {
                    tokens.push(Spanned {
                        token: Token::LParen,
                        position: start,
                    });
                    self.offset += 1;
                }
                ')' => {
                    tokens.push(Spanned {
                        token: Token::RParen,
                        position: start,
                    });
                    self.offset += 1;
                }
                '\'' => {
                    let body_start = start + 1;
                    let Some(len) = self.input[body_start..].find('\'') else {
                        return Err(RuleError::UnterminatedLiteral { position: start });
                    };
                    if len == 0 {
                        return Err(RuleError::EmptyLiteral { position: start });
                    }
                    tokens.push(Spanned {
                        token: Token::Literal(&self.input[body_start..body_start + len]),
                        position: start,
                    });
                    self.offset = body_start + len + 1;
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let len = self.input[start..]
                        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                        .unwrap_or(self.input.len() - start);
                    tokens.push(Spanned {
                        token: Token::Word(&self.input[start..start + len]),
                        position: start,
                    });
                    self.offset += len;
                }
                other => {
                    return Err(RuleError::UnexpectedChar {
                        found: other,
                        position: start,
                    })
                }
            }
        }
        if tokens.is_empty() {
            return Err(RuleError::Empty);
        }
        tokens.push(Spanned {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    tokens: Vec<Spanned<'a>>,
    index: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Spanned<'a> {
        // the lexer always terminates the stream with Eof
        self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Spanned<'a> {
        let tok = self.peek();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        tok
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.peek().token == Token::Word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn enter(&mut self, position: usize) -> Result<(), RuleError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(RuleError::NestingTooDeep {
                max: MAX_NESTING,
                position,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    fn parse_or(&mut self) -> Result<Expr, RuleError> {
        let mut parts = vec![self.parse_and()?];
        while self.eat_word("OR") {
            parts.push(self.parse_and()?);
        }
        Ok(collapse(parts, Expr::Or))
    }

    fn parse_and(&mut self) -> Result<Expr, RuleError> {
        let mut parts = vec![self.parse_unary()?];
        while self.eat_word("AND") {
            parts.push(self.parse_unary()?);
        }
        Ok(collapse(parts, Expr::And))
    }

    fn parse_unary(&mut self) -> Result<Expr, RuleError> {
        let position = self.peek().position;
        if self.eat_word("NOT") {
            self.enter(position)?;
            let inner = self.parse_unary()?;
            self.leave();
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, RuleError> {
        let tok = self.advance();
        match tok.token {
            Token::LParen => {
                self.enter(tok.position)?;
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "`)`")?;
                self.leave();
                Ok(inner)
            }
            Token::Word("INCLUDES") => Ok(Expr::Includes(self.call_argument()?.to_string())),
            Token::Word("MATCHES") => Ok(Expr::Matches(Pattern::compile(self.call_argument()?)?)),
            Token::Word(name) => Err(RuleError::UnknownForm {
                name: name.to_string(),
                position: tok.position,
            }),
            other => Err(RuleError::UnexpectedToken {
                expected: "INCLUDES, MATCHES, NOT or `(`",
                found: other.to_string(),
                position: tok.position,
            }),
        }
    }

    /// `( 'literal' )` following a leaf keyword.
    fn call_argument(&mut self) -> Result<&'a str, RuleError> {
        self.expect(Token::LParen, "`(`")?;
        let tok = self.advance();
        let Token::Literal(text) = tok.token else {
            return Err(RuleError::UnexpectedToken {
                expected: "a quoted literal",
                found: tok.token.to_string(),
                position: tok.position,
            });
        };
        self.expect(Token::RParen, "`)`")?;
        Ok(text)
    }

    fn expect(&mut self, want: Token<'a>, expected: &'static str) -> Result<(), RuleError> {
        let tok = self.advance();
        if tok.token == want {
            Ok(())
        } else {
            Err(RuleError::UnexpectedToken {
                expected,
                found: tok.token.to_string(),
                position: tok.position,
            })
        }
    }

    fn expect_eof(&self) -> Result<(), RuleError> {
        let tok = self.peek();
        if tok.token == Token::Eof {
            Ok(())
        } else {
            Err(RuleError::TrailingInput {
                position: tok.position,
            })
        }
    }
}

fn collapse(mut parts: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        wrap(parts)
    }
}
