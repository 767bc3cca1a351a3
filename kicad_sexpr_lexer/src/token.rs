use std::str::FromStr;

/// A trait which represents a type that can be used as a keyword in the
/// [`Lexer`](crate::Lexer). This is mostly just a supertrait of the various
/// required traits, but has some extra requirements. The
/// [`FromStr`] implementation for this type will never be invoked for any
/// strings that start with a delimiter ( `"`, `(`, or `)` ), contain
/// whitespace, or read as a number.
pub trait Keyword: core::fmt::Debug + Clone + Copy + PartialEq + FromStr {}

/// The default keyword type which is used if no generic type is specified in
/// the [`Lexer`](crate::Lexer). This type is functionally equivalent to
/// [`Infallible`](core::convert::Infallible).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultKeywords {}

impl FromStr for DefaultKeywords {
    type Err = ();

    fn from_str(_: &str) -> Result<Self, Self::Err> {
        Err(())
    }
}

impl Keyword for DefaultKeywords {}

/// A token which has been read from the input source
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token<'source, K: Keyword = DefaultKeywords> {
    #[cfg_attr(feature = "serde", serde(borrow))]
    pub kind: TokenKind<'source, K>,
    pub span: Span,
}

/// A type of token which we can lex
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(rename_all = "snake_case", tag = "type", content = "value")
)]
pub enum TokenKind<'source, K: Keyword = DefaultKeywords> {
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,

    Keyword(K),
    Symbol(&'source str),
    /// The raw contents between the quotes, escapes left untouched
    String(&'source str),
    Number(f64),
}

macro_rules! as_helper {
    ($name:ident, $variant:ident, $ty:ty $(, $tt:tt)?) => {
        paste::paste! {
            pub fn [<as_ $name>](&self) -> Option<$ty> {
              if let Self::$variant(v) = self {
                  Some($($tt)? v)
              } else {
                  None
              }
            }
        }
    };
}

impl<'source, K: Keyword> TokenKind<'source, K> {
    as_helper!(keyword, Keyword, K, *);
    as_helper!(symbol, Symbol, &'source str);
    as_helper!(string, String, &'source str);
    as_helper!(number, Number, f64, *);

    pub fn is_open_paren(&self) -> bool {
        matches!(self, Self::OpenParen)
    }

    pub fn is_close_paren(&self) -> bool {
        matches!(self, Self::CloseParen)
    }
}

/// A start and end byte offset within the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// The offset of the first byte (inclusive)
    pub start: usize,
    /// The offset one past the last byte (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the text covered by this span.
    ///
    /// Panics if the span does not lie on character boundaries of `source`,
    /// which cannot happen for spans produced by the [`Lexer`](crate::Lexer)
    /// over that same source.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}
