//! Recursive-descent parser for context-key expressions
//!
//! Grammar, lowest to highest precedence:
//!
//! ```text
//! Or      := And ('||' And)*
//! And     := Not ('&&' Not)*
//! Not     := '!' Primary | Primary
//! Primary := 'true' | 'false' | '(' Or ')'
//!          | KEY
//!          | KEY ('==' | '!=' | '===' | '!==' | '<' | '<=' | '>' | '>=') VALUE
//!          | KEY '=~' REGEX
//!          | KEY 'in' VALUE | KEY 'not' 'in' VALUE
//! ```

use thiserror::Error;

use super::expr::{Expr, Literal, Operand, RegexLiteral};
use super::normalize::TooComplex;
use super::scanner::{lexing_errors, scan, LexingError, Token, TokenKind};

const EMPTY_EXPRESSION: &str = "Empty context key expression";
const EMPTY_EXPRESSION_HINT: &str = "Did you forget to write an expression? You can also put 'false' or 'true' to always evaluate to false or true, respectively.";
const UNEXPECTED_TOKEN: &str = "Unexpected token";
const UNEXPECTED_TOKEN_HINT: &str = "Did you forget to put && or || before the token?";
const UNEXPECTED_EOF: &str = "Unexpected end of expression";
const UNEXPECTED_EOF_HINT: &str = "Did you forget to put a context key?";
const TOO_COMPLEX: &str = "Expression is too complex";

/// A parse diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset} ('{lexeme}')")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
    pub lexeme: String,
    pub hint: Option<String>,
}

/// Marker for an aborted parse; the diagnostic is already recorded
struct Abort;

type ParseResult<T> = Result<T, Abort>;

/// Reusable parser; diagnostics of the last [`Parser::parse`] call are kept
#[derive(Debug, Default)]
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ParseError>,
    lexing_errors: Vec<LexingError>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `input`, returning `None` and recording diagnostics on failure
    pub fn parse(&mut self, input: &str) -> Option<Expr> {
        self.errors.clear();
        self.current = 0;

        if input.is_empty() {
            self.tokens.clear();
            self.lexing_errors.clear();
            self.errors.push(ParseError {
                message: EMPTY_EXPRESSION.to_string(),
                offset: 0,
                lexeme: String::new(),
                hint: Some(EMPTY_EXPRESSION_HINT.to_string()),
            });
            return None;
        }

        self.tokens = scan(input);
        self.lexing_errors = lexing_errors(&self.tokens);

        let expr = self.or().ok()?;
        if !self.is_at_end() {
            let token = self.peek().clone();
            let hint = match token.kind {
                TokenKind::Str => Some(UNEXPECTED_TOKEN_HINT.to_string()),
                TokenKind::Error(error) => Some(error.to_string()),
                _ => None,
            };
            self.push_error(UNEXPECTED_TOKEN, &token, hint);
            return None;
        }
        Some(expr)
    }

    /// Diagnostics of the last parse
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Lexical errors of the last parse
    pub fn lexing_errors(&self) -> &[LexingError] {
        &self.lexing_errors
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        let mut items = vec![self.and()?];
        while self.eat(TokenKind::Or) {
            items.push(self.and()?);
        }
        self.within_budget(Expr::try_or(items), &start)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        let mut items = vec![self.not()?];
        while self.eat(TokenKind::And) {
            items.push(self.not()?);
        }
        self.within_budget(Expr::try_and(items), &start)
    }

    fn not(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        if self.eat(TokenKind::Neg) {
            let negated = self.primary()?.try_negate();
            return self.within_budget(negated, &start);
        }
        self.primary()
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::True => {
                self.advance();
                Ok(Expr::True)
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::False)
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.or()?;
                self.expect(TokenKind::RParen, "closing parenthesis ')'")?;
                Ok(expr)
            }
            TokenKind::Str => {
                self.advance();
                let key = token.lexeme.unwrap_or_default();
                self.comparison(key)
            }
            TokenKind::Eof => {
                self.push_error(UNEXPECTED_EOF, &token, Some(UNEXPECTED_EOF_HINT.to_string()));
                Err(Abort)
            }
            TokenKind::Error(error) => {
                self.push_error(UNEXPECTED_TOKEN, &token, Some(error.to_string()));
                Err(Abort)
            }
            _ => {
                self.push_error(UNEXPECTED_TOKEN, &token, None);
                Err(Abort)
            }
        }
    }

    /// Everything that may follow a key
    fn comparison(&mut self, key: String) -> ParseResult<Expr> {
        let operator = self.peek().kind;
        match operator {
            TokenKind::Eq { .. } => {
                self.advance();
                Ok(Expr::equals(key, self.value()?))
            }
            TokenKind::NotEq { .. } => {
                self.advance();
                Ok(Expr::not_equals(key, self.value()?))
            }
            TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq => {
                self.advance();
                let operand = Operand::parse(&self.value()?.value);
                Ok(match operator {
                    TokenKind::Lt => Expr::smaller(key, operand),
                    TokenKind::LtEq => Expr::smaller_equals(key, operand),
                    TokenKind::Gt => Expr::greater(key, operand),
                    _ => Expr::greater_equals(key, operand),
                })
            }
            TokenKind::RegexOp => {
                self.advance();
                self.regex(key)
            }
            TokenKind::In => {
                self.advance();
                Ok(Expr::in_list(key, self.value()?.value))
            }
            TokenKind::Not => {
                self.advance();
                self.expect(TokenKind::In, "'in' after 'not'")?;
                Ok(Expr::not_in_list(key, self.value()?.value))
            }
            _ => Ok(Expr::has(key)),
        }
    }

    fn regex(&mut self, key: String) -> ParseResult<Expr> {
        let token = self.peek().clone();
        if token.kind != TokenKind::RegexStr {
            return self.expected("REGEX", &token);
        }
        self.advance();
        let lexeme = token.lexeme.clone().unwrap_or_default();
        match RegexLiteral::from_literal(&lexeme) {
            Some(Ok(regex)) => Ok(Expr::regex(key, regex)),
            Some(Err(err)) => {
                self.push_error("Invalid regular expression", &token, Some(err.to_string()));
                Err(Abort)
            }
            None => self.expected("REGEX", &token),
        }
    }

    /// VALUE := Str | QuotedStr | 'true' | 'false' | 'in' | empty
    fn value(&mut self) -> ParseResult<Literal> {
        let token = self.peek().clone();
        let literal = match token.kind {
            TokenKind::Str => Literal::bare(token.lexeme.clone().unwrap_or_default()),
            TokenKind::QuotedStr => Literal::quoted(token.lexeme.clone().unwrap_or_default()),
            TokenKind::True => Literal::bare("true"),
            TokenKind::False => Literal::bare("false"),
            TokenKind::In => Literal::quoted("in"),
            _ => return Ok(Literal::empty()),
        };
        self.advance();
        literal.map_err(|err| {
            self.push_error("Invalid value", &token, Some(err.to_string()));
            Abort
        })
    }

    fn within_budget(
        &mut self,
        expr: Result<Expr, TooComplex>,
        start: &Token,
    ) -> ParseResult<Expr> {
        expr.map_err(|err| {
            self.push_error(TOO_COMPLEX, start, Some(err.to_string()));
            Abort
        })
    }

    fn peek(&self) -> &Token {
        // scan() always ends with Eof, and advance() never moves past it
        &self.tokens[self.current.min(self.tokens.len().saturating_sub(1))]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<()> {
        if self.eat(kind) {
            return Ok(());
        }
        let token = self.peek().clone();
        self.expected(expected, &token)
    }

    fn expected<T>(&mut self, expected: &str, token: &Token) -> ParseResult<T> {
        let message = format!("Expected: {} Received: '{}'.", expected, token.text());
        let hint = match token.kind {
            TokenKind::Error(error) => Some(error.to_string()),
            _ => None,
        };
        self.push_error(&message, token, hint);
        Err(Abort)
    }

    fn push_error(&mut self, message: &str, token: &Token, hint: Option<String>) {
        self.errors.push(ParseError {
            message: message.to_string(),
            offset: token.offset,
            lexeme: token.text(),
            hint,
        });
    }
}

impl Expr {
    /// Parse leniently, discarding diagnostics
    pub fn deserialize(input: &str) -> Option<Expr> {
        Parser::new().parse(input)
    }
}

/// Parse `input` and return its canonical serialization
pub fn parse_to_string(input: &str) -> Option<String> {
    Expr::deserialize(input).map(|expr| expr.serialize())
}
