//! This crate implements a zero-copy lexer for the KiCad S-Expression format.
//! Every token carries the byte span it was read from, so callers can slice
//! the original source and reproduce untouched regions exactly.

use std::{iter::Peekable, str::Chars};

pub use token::*;

mod token;

/// An error that can occur during lexing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} (at {line_number}:{column_number})")]
pub struct Error {
    /// The kind of error which was encountered
    pub kind: ErrorKind,
    /// The 1-based line number in the source where the error was detected
    pub line_number: usize,
    /// The 1-based column number in the source where the error was detected
    pub column_number: usize,
}

/// An kind of error which can be encountered while lexing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /* Expectations */
    /// We expected to find a `(` token but found something else
    #[error("expected opening parenthesis")]
    ExpectedOpenParen,
    /// We expected to find a `)` token but found something else
    #[error("expected closing parenthesis")]
    ExpectedCloseParen,
    /// We expected to find a generic symbol token but found something else
    #[error("expected a symbol")]
    ExpectedSymbol,
    /// We expected to find a keyword token but found something else
    #[error("expected a keyword")]
    ExpectedKeyword,
    /// We expected to find a delimited string token but found something else
    #[error("expected a string")]
    ExpectedString,
    /// We expected to find a number token but found something else
    #[error("expected a number")]
    ExpectedNumber,
    /* Strings */
    /// A string was opened with a `"`, but we reached the end of the file
    /// before finding a matching unescaped `"`
    #[error("expected string to terminate but reached EOF")]
    UnterminatedString,
}

/// A zero-copy lexer for the KiCad S-Expression format. Lexer implements
/// [`Iterator`] as well as offering various helper functions like
/// [`expect_open_paren`](Self::expect_open_paren) and
/// [`expect_number`](Self::expect_number) for convenient implementation of
/// format parsers.
///
/// Custom keyword lists are supported through the generic argument `K`. Any
/// type which implements [`FromStr`](core::str::FromStr) can be used as the
/// keyword type. If no generic type is specified, the
/// [`DefaultKeywords`] type will be used instead which will never return
/// [`TokenKind::Keyword`].
///
/// Spans are byte offsets into the source, so `&source[span.start..span.end]`
/// is always the exact text of a token, including for non-ASCII input.
pub struct Lexer<'source, K: Keyword = DefaultKeywords> {
    source: &'source str,
    /// Byte offset of the next unread character
    position: usize,
    line_number: usize,
    /// Counted in characters, not bytes
    column: usize,
    chars: Peekable<Chars<'source>>,
    previous: Option<Token<'source, K>>,
    has_errored: bool,
}

impl<'source, K: Keyword> Lexer<'source, K> {
    /// Constructs a new Lexer over the given source text
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            position: 0,
            line_number: 0,
            column: 0,
            previous: None,
            has_errored: false,
        }
    }

    /// Returns true if the lexer has reached the end of it's input stream
    pub fn is_eof(&self) -> bool {
        self.position >= self.source.len()
    }

    /// Returns a reference to the input stream
    pub fn source(&self) -> &'source str {
        self.source
    }

    /// Returns the byte offset of the next unread character
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns a 1-based line index for use in position formatting
    pub fn line_number(&self) -> usize {
        self.line_number + 1
    }

    /// Returns a 1-based column index for use in position formatting
    pub fn column(&self) -> usize {
        self.column + 1
    }

    /// Returns the token which was returned by the last call to
    /// [`Self::next`] or `None`.
    pub fn previous(&self) -> Option<&Token<'source, K>> {
        self.previous.as_ref()
    }
}

/* Helper functions for parser implementations */

macro_rules! expect_helper {
    ($name:ident, $error_kind:ident, $pattern:pat) => {
        paste::paste! {
            pub fn [<expect_ $name>](&mut self) -> Result<Token<'source, K>, Error> {
                let error = self.create_error(ErrorKind::$error_kind);

                let token = self.next().ok_or(error.clone())??;

                if !matches!(token.kind, TokenKind::$pattern) {
                    return Err(error);
                }

                Ok(token)
            }
        }
    };
}

impl<'source, K: Keyword> Lexer<'source, K> {
    expect_helper!(open_paren, ExpectedOpenParen, OpenParen);
    expect_helper!(close_paren, ExpectedCloseParen, CloseParen);
    expect_helper!(symbol, ExpectedSymbol, Symbol(_));
    expect_helper!(keyword, ExpectedKeyword, Keyword(_));
    expect_helper!(string, ExpectedString, String(_));
    expect_helper!(number, ExpectedNumber, Number(_));
}

/* Helper functions for lexing the input */

impl<'source, K: Keyword> Lexer<'source, K> {
    fn create_error(&self, kind: ErrorKind) -> Error {
        Error {
            kind,
            line_number: self.line_number(),
            column_number: self.column(),
        }
    }

    fn create_span(&self, start: usize) -> Span {
        Span {
            start,
            end: self.position,
        }
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.chars.next()?;

        self.column += 1;
        self.position += c.len_utf8();

        if c == '\n' {
            self.line_number += 1;
            self.column = 0;
        }

        Some(c)
    }

    fn ignore_whitespace(&mut self) {
        while let Some(c) = self.chars.peek().copied() {
            if !c.is_whitespace() {
                break;
            }

            self.consume_char();
        }
    }

    fn read_single(&mut self, kind: TokenKind<'source, K>) -> Token<'source, K> {
        let start_position = self.position;

        self.consume_char();

        Token {
            span: self.create_span(start_position),
            kind,
        }
    }

    fn read_string(&mut self) -> Result<Token<'source, K>, Error> {
        let start_position = self.position;

        // Opening quote
        self.consume_char();

        while let Some(c) = self.consume_char() {
            match c {
                // An escape always swallows the following character, whatever it is
                '\\' => {
                    self.consume_char();
                }
                '"' => {
                    let span = self.create_span(start_position);
                    let value = &self.source[span.start + 1..span.end - 1];

                    return Ok(Token {
                        kind: TokenKind::String(value),
                        span,
                    });
                }
                _ => {}
            }
        }

        Err(self.create_error(ErrorKind::UnterminatedString))
    }

    fn read_until_separator(&mut self) -> Span {
        let start_position = self.position;

        while let Some(c) = self.chars.peek().copied() {
            if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                break;
            }

            self.consume_char();
        }

        self.create_span(start_position)
    }
}

/// Only values that start like a number are handed to the float parser, so
/// that symbols such as `inf` or `nan` stay symbols.
fn parse_number(value: &str) -> Option<f64> {
    let first = value.chars().next()?;

    if !(first.is_ascii_digit() || first == '-' || first == '+' || first == '.') {
        return None;
    }

    value.parse::<f64>().ok()
}

impl<'source, K: Keyword> Iterator for Lexer<'source, K> {
    type Item = Result<Token<'source, K>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_errored {
            return None;
        }

        self.ignore_whitespace();

        let c = self.chars.peek().copied()?;

        let token = match c {
            // List delimiters
            '(' => self.read_single(TokenKind::OpenParen),
            ')' => self.read_single(TokenKind::CloseParen),

            // Try to read a delimited string
            '"' => match self.read_string() {
                Ok(v) => v,
                Err(e) => {
                    self.has_errored = true;
                    return Some(Err(e));
                }
            },

            // All other values
            _ => {
                let span = self.read_until_separator();
                let value = span.slice(self.source);

                let kind = if let Some(number) = parse_number(value) {
                    TokenKind::Number(number)
                } else if let Ok(keyword) = value.parse::<K>() {
                    TokenKind::Keyword(keyword)
                } else {
                    TokenKind::Symbol(value)
                };

                Token { kind, span }
            }
        };

        self.previous = Some(token.clone());

        Some(Ok(token))
    }
}
