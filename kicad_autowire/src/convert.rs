//! Conversion traits and utilities for converting between KiCad's S-expressions
//! and Rust types.
//!
//! Blocks are read leniently: the [`Parser`] walks a list front to back for
//! positional values such as the numbers in `(at X Y ANGLE)`, and looks up
//! named child lists such as `(uuid ...)` wherever they appear. Fields that a
//! reader does not ask for are ignored, so files written by newer KiCad
//! versions still parse.

use std::vec::IntoIter;

use kicad_sexpr::{Sexpr, SexprList};

use crate::{document::DocumentStyle, AutowireError, SexprKind};

/* ========= DESERIALIZATION ========= */

pub trait FromSexpr: Sized {
    fn from_sexpr(parser: Parser) -> Result<Self, AutowireError>;
}

pub trait SexprListExt {
    fn first_symbol(&self) -> Option<&str>;
}

impl SexprListExt for SexprList {
    fn first_symbol(&self) -> Option<&str> {
        self.first()?.as_symbol().map(|s| s.as_str())
    }
}

/// A parser used internally for easily lifting fields out of S-expression trees.
#[derive(Debug, Clone)]
pub struct Parser {
    inner: IntoIter<Sexpr>,
}

impl Parser {
    pub fn new(inner: SexprList) -> Self {
        Self {
            inner: inner.into_iter(),
        }
    }

    fn expect_next(&mut self) -> Result<Sexpr, AutowireError> {
        self.inner.next().ok_or(AutowireError::UnexpectedEndOfList)
    }

    pub fn peek_next(&self) -> Option<&Sexpr> {
        self.inner.as_slice().first()
    }

    /// Expects the next sexpr to be a symbol and returns it.
    ///
    /// If the next sexpr is not a symbol, an error is returned.
    pub fn expect_symbol(&mut self) -> Result<String, AutowireError> {
        let next = self.expect_next()?;

        let Sexpr::Symbol(symbol) = next else {
            return Err(AutowireError::UnexpectedSexprType {
                expected: SexprKind::Symbol,
            });
        };

        Ok(symbol)
    }

    /// Expects the next sexpr to be a symbol and checks if it matches the
    /// expected symbol.
    ///
    /// If the next sexpr is not a symbol or it does not match the expected
    /// symbol, an error is returned.
    pub fn expect_symbol_matching(&mut self, expected: &str) -> Result<(), AutowireError> {
        let symbol = self.expect_symbol()?;

        if symbol != expected {
            return Err(AutowireError::NonMatchingSymbol {
                found: symbol,
                expected: expected.into(),
            });
        }

        Ok(())
    }

    pub fn expect_symbol_matching_any(
        &mut self,
        expected: &[&str],
    ) -> Result<String, AutowireError> {
        let symbol = self.expect_symbol()?;

        if !expected.contains(&symbol.as_str()) {
            return Err(AutowireError::NonMatchingSymbol {
                found: symbol,
                expected: expected.join(", "),
            });
        }

        Ok(symbol)
    }

    /// Expects the next sexpr to be a string and returns it.
    ///
    /// If the next sexpr is not a string, an error is returned.
    pub fn expect_string(&mut self) -> Result<String, AutowireError> {
        let next = self.expect_next()?;

        let Sexpr::String(string) = next else {
            return Err(AutowireError::UnexpectedSexprType {
                expected: SexprKind::String,
            });
        };

        Ok(string)
    }

    /// Expects the next sexpr to be either a string or a symbol and returns
    /// its text. KiCad quotes some values in one version and not the other.
    pub fn expect_text(&mut self) -> Result<String, AutowireError> {
        match self.expect_next()? {
            Sexpr::String(text) | Sexpr::Symbol(text) => Ok(text),
            _ => Err(AutowireError::UnexpectedSexprType {
                expected: SexprKind::String,
            }),
        }
    }

    /// Expects the next sexpr to be a number and returns it.
    ///
    /// If the next sexpr is not a number, an error is returned.
    pub fn expect_number(&mut self) -> Result<f64, AutowireError> {
        let next = self.expect_next()?;

        let Sexpr::Number(number) = next else {
            return Err(AutowireError::UnexpectedSexprType {
                expected: SexprKind::Number,
            });
        };

        Ok(number)
    }

    /// Returns the next sexpr as a number if it is a number.
    ///
    /// If the next sexpr is not a number or there are no more tokens in the
    /// parser, `None` is returned.
    pub fn maybe_number(&mut self) -> Option<f64> {
        let number = self.peek_next()?.as_number().copied()?;
        self.inner.next();

        Some(number)
    }

    /// Expects the next sexpr to be a list and parses it as `T`.
    pub fn expect<T>(&mut self) -> Result<T, AutowireError>
    where
        T: FromSexpr,
    {
        let Sexpr::List(list) = self.expect_next()? else {
            return Err(AutowireError::UnexpectedSexprType {
                expected: SexprKind::List,
            });
        };

        T::from_sexpr(Parser::new(list))
    }

    /* Lookups by name. These never consume anything. */

    /// Returns parsers for every remaining child list whose first symbol is
    /// `name`, in order.
    pub fn find_all(&self, name: &str) -> Vec<Parser> {
        self.inner
            .as_slice()
            .iter()
            .filter_map(Sexpr::as_list)
            .filter(|list| list.first_symbol() == Some(name))
            .map(|list| Parser::new(list.clone()))
            .collect()
    }

    /// Returns a parser for the first remaining child list whose first symbol
    /// is `name`.
    pub fn find(&self, name: &str) -> Option<Parser> {
        self.inner
            .as_slice()
            .iter()
            .filter_map(Sexpr::as_list)
            .find(|list| list.first_symbol() == Some(name))
            .map(|list| Parser::new(list.clone()))
    }

    /// Parses the first remaining child list named `name` as `T`.
    pub fn find_parsed<T: FromSexpr>(&self, name: &str) -> Result<Option<T>, AutowireError> {
        self.find(name).map(T::from_sexpr).transpose()
    }

    /// Like [`Self::find_parsed`], but the field is required.
    pub fn expect_parsed<T: FromSexpr>(&self, name: &'static str) -> Result<T, AutowireError> {
        self.find_parsed(name)?
            .ok_or(AutowireError::MissingField(name))
    }

    /// Returns the text of the first value in the child list `(name VALUE)`.
    pub fn find_text(&self, name: &str) -> Result<Option<String>, AutowireError> {
        self.find(name)
            .map(|mut p| {
                p.expect_symbol()?;
                p.expect_text()
            })
            .transpose()
    }

    /// Returns the number in the child list `(name NUMBER)`.
    pub fn find_number(&self, name: &str) -> Result<Option<f64>, AutowireError> {
        self.find(name)
            .map(|mut p| {
                p.expect_symbol()?;
                p.expect_number()
            })
            .transpose()
    }
}

/* ========= SERIALIZATION ========= */

/// Serialization of values whose text depends on the dialect of the
/// document they are written into.
pub trait ToSexpr {
    fn to_sexpr(&self, style: &DocumentStyle) -> Sexpr;
}

pub trait ToSexprWithName {
    fn to_sexpr_with_name(&self, name: &str) -> Sexpr;
}
