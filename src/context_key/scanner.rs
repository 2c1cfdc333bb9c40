//! Tokenizer for context-key expressions
//!
//! The scanner never fails: malformed input produces [`TokenKind::Error`]
//! tokens and scanning continues with the next character. The token stream
//! always ends with exactly one [`TokenKind::Eof`] token.

use std::fmt;

use thiserror::Error;

/// Lexical problems the scanner knows how to explain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LexError {
    #[error("Did you forget to escape the '/' (slash) character? Put two backslashes before it to escape, e.g., '\\\\/'.")]
    UnescapedSlash,
    #[error("Did you forget to open or close the quote?")]
    UnterminatedQuote,
    #[error("Did you mean == or =~?")]
    LoneEquals,
    #[error("Did you mean &&?")]
    LoneAmpersand,
    #[error("Did you mean ||?")]
    LonePipe,
    #[error("Did you forget to close the regular expression with '/'?")]
    UnterminatedRegex,
    #[error("Unexpected character")]
    UnexpectedChar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    Neg,
    /// `==` or `===`
    Eq { strict: bool },
    /// `!=` or `!==`
    NotEq { strict: bool },
    Lt,
    LtEq,
    Gt,
    GtEq,
    RegexOp,
    RegexStr,
    True,
    False,
    In,
    Not,
    And,
    Or,
    Str,
    QuotedStr,
    Error(LexError),
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the scanned input
    pub offset: usize,
    /// Source text for words, strings, regex literals and errors
    pub lexeme: Option<String>,
}

impl Token {
    fn new(kind: TokenKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            lexeme: None,
        }
    }

    fn with_lexeme(kind: TokenKind, offset: usize, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            lexeme: Some(lexeme.into()),
        }
    }

    /// Human readable form of the token, as used in diagnostics
    pub fn text(&self) -> String {
        match self.kind {
            TokenKind::LParen => "(".into(),
            TokenKind::RParen => ")".into(),
            TokenKind::Neg => "!".into(),
            TokenKind::Eq { strict } => (if strict { "===" } else { "==" }).to_string(),
            TokenKind::NotEq { strict } => (if strict { "!==" } else { "!=" }).to_string(),
            TokenKind::Lt => "<".into(),
            TokenKind::LtEq => "<=".into(),
            TokenKind::Gt => ">".into(),
            TokenKind::GtEq => ">=".into(),
            TokenKind::RegexOp => "=~".into(),
            TokenKind::True => "true".into(),
            TokenKind::False => "false".into(),
            TokenKind::In => "in".into(),
            TokenKind::Not => "not".into(),
            TokenKind::And => "&&".into(),
            TokenKind::Or => "||".into(),
            TokenKind::QuotedStr => format!("'{}'", self.lexeme.as_deref().unwrap_or_default()),
            TokenKind::Str | TokenKind::RegexStr | TokenKind::Error(_) => {
                self.lexeme.clone().unwrap_or_default()
            }
            TokenKind::Eof => "EOF".into(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// A lexical error with its location, collected alongside the token stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexingError {
    pub offset: usize,
    pub lexeme: String,
    pub error: LexError,
}

/// Characters allowed in bare words (keys and unquoted values)
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
        || matches!(
            c,
            '_' | '<' | '>' | '-' | '.' | ':' | '*' | '?' | '+' | '[' | ']' | '^' | ',' | '#'
                | '@' | ';' | '%' | '$' | '\\' | '/'
        )
}

fn is_regex_flag(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'i' | 'g' | 's' | 'm' | 'y' | 'u')
}

fn keyword(word: &str) -> Option<TokenKind> {
    match word {
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        "in" => Some(TokenKind::In),
        "not" => Some(TokenKind::Not),
        _ => None,
    }
}

/// Tokenize `input`
pub fn scan(input: &str) -> Vec<Token> {
    Scanner::new(input).run()
}

/// Collect the lexical errors of a token stream
pub fn lexing_errors(tokens: &[Token]) -> Vec<LexingError> {
    tokens
        .iter()
        .filter_map(|token| match token.kind {
            TokenKind::Error(error) => Some(LexingError {
                offset: token.offset,
                lexeme: token.lexeme.clone().unwrap_or_default(),
                error,
            }),
            _ => None,
        })
        .collect()
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn previous_kind(&self) -> Option<TokenKind> {
        self.tokens.last().map(|t| t.kind)
    }

    fn error(&mut self, start: usize, error: LexError) {
        let lexeme = &self.input[start..self.pos];
        self.tokens
            .push(Token::with_lexeme(TokenKind::Error(error), start, lexeme));
    }

    fn run(mut self) -> Vec<Token> {
        while let Some(c) = self.peek() {
            let start = self.pos;

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            if c == '/' && self.previous_kind() == Some(TokenKind::RegexOp) {
                self.regex(start);
                continue;
            }

            self.bump();
            match c {
                '(' => self.tokens.push(Token::new(TokenKind::LParen, start)),
                ')' => self.tokens.push(Token::new(TokenKind::RParen, start)),
                '!' => {
                    let kind = if self.eat('=') {
                        TokenKind::NotEq {
                            strict: self.eat('='),
                        }
                    } else {
                        TokenKind::Neg
                    };
                    self.tokens.push(Token::new(kind, start));
                }
                '=' => {
                    if self.eat('=') {
                        let strict = self.eat('=');
                        self.tokens
                            .push(Token::new(TokenKind::Eq { strict }, start));
                    } else if self.eat('~') {
                        self.tokens.push(Token::new(TokenKind::RegexOp, start));
                    } else {
                        self.error(start, LexError::LoneEquals);
                    }
                }
                '<' => {
                    let kind = if self.eat('=') {
                        TokenKind::LtEq
                    } else {
                        TokenKind::Lt
                    };
                    self.tokens.push(Token::new(kind, start));
                }
                '>' => {
                    let kind = if self.eat('=') {
                        TokenKind::GtEq
                    } else {
                        TokenKind::Gt
                    };
                    self.tokens.push(Token::new(kind, start));
                }
                '&' => {
                    if self.eat('&') {
                        self.tokens.push(Token::new(TokenKind::And, start));
                    } else {
                        self.error(start, LexError::LoneAmpersand);
                    }
                }
                '|' => {
                    if self.eat('|') {
                        self.tokens.push(Token::new(TokenKind::Or, start));
                    } else {
                        self.error(start, LexError::LonePipe);
                    }
                }
                '\'' | '"' => self.quoted(start, c),
                '/' => self.error(start, LexError::UnescapedSlash),
                c if is_word_char(c) => self.word(start),
                _ => self.error(start, LexError::UnexpectedChar),
            }
        }

        self.tokens
            .push(Token::new(TokenKind::Eof, self.input.len()));
        self.tokens
    }

    fn word(&mut self, start: usize) {
        while let Some(c) = self.peek() {
            if !is_word_char(c) {
                break;
            }
            self.bump();
        }
        let lexeme = &self.input[start..self.pos];
        match keyword(lexeme) {
            Some(kind) => self.tokens.push(Token::new(kind, start)),
            None => self
                .tokens
                .push(Token::with_lexeme(TokenKind::Str, start, lexeme)),
        }
    }

    fn quoted(&mut self, start: usize, quote: char) {
        let content_start = self.pos;
        while let Some(c) = self.bump() {
            if c == quote {
                let content = &self.input[content_start..self.pos - quote.len_utf8()];
                self.tokens
                    .push(Token::with_lexeme(TokenKind::QuotedStr, start, content));
                return;
            }
        }
        self.error(start, LexError::UnterminatedQuote);
    }

    /// Scan `/source/flags`; escapes and character classes may contain `/`
    fn regex(&mut self, start: usize) {
        self.bump();
        let mut in_escape = false;
        let mut in_class = false;
        loop {
            let Some(c) = self.bump() else {
                self.error(start, LexError::UnterminatedRegex);
                return;
            };
            if in_escape {
                in_escape = false;
            } else if c == '\\' {
                in_escape = true;
            } else if c == '[' {
                in_class = true;
            } else if c == ']' {
                in_class = false;
            } else if c == '/' && !in_class {
                break;
            }
        }
        while let Some(c) = self.peek() {
            if !is_regex_flag(c) {
                break;
            }
            self.bump();
        }
        let lexeme = &self.input[start..self.pos];
        self.tokens
            .push(Token::with_lexeme(TokenKind::RegexStr, start, lexeme));
    }
}
