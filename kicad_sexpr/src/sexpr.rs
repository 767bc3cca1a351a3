//! KiCad S-Expression Parser

use std::fmt::Display;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{multispace0, multispace1},
    combinator::{eof, map, peek},
    multi::many0,
    sequence::{delimited, preceded, terminated},
    IResult,
};
use thiserror::Error;

use super::number::parse_number;
use super::string::parse_string;

pub type SexprList = Vec<Sexpr>;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
#[derive(Debug, PartialEq, Clone)]
pub enum Sexpr {
    List(SexprList),
    Number(f64),
    String(String),
    Symbol(String),
}

impl Display for Sexpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", super::format::to_string(self))
    }
}

macro_rules! sexpr_as {
    ($fn_name:ident, $return_type:ty, $variant:ident) => {
        pub fn $fn_name(&self) -> Option<&$return_type> {
            if let Self::$variant(value) = self {
                Some(value)
            } else {
                None
            }
        }
    };
}

macro_rules! sexpr_take {
    ($fn_name:ident, $return_type:ty, $variant:ident) => {
        pub fn $fn_name(self) -> Option<$return_type> {
            if let Self::$variant(value) = self {
                Some(value)
            } else {
                None
            }
        }
    };
}

macro_rules! sexpr_construct {
    ($fn_name:ident, $input_type:ty, $variant:ident) => {
        pub fn $fn_name(value: impl Into<$input_type>) -> Self {
            Self::$variant(value.into())
        }
    };
}

macro_rules! sexpr_construct_with_name {
    ($fn_name:ident, $input_type:ty, $variant:ident) => {
        pub fn $fn_name(name: impl Into<String>, value: impl Into<$input_type>) -> Self {
            Self::list([
                Some(Self::symbol(name.into())),
                Some(Self::$variant(value.into())),
            ])
        }
    };
}

impl Sexpr {
    sexpr_as!(as_list, SexprList, List);
    sexpr_as!(as_number, f64, Number);
    sexpr_as!(as_string, String, String);
    sexpr_as!(as_symbol, String, Symbol);

    sexpr_take!(take_list, SexprList, List);
    sexpr_take!(take_number, f64, Number);
    sexpr_take!(take_string, String, String);
    sexpr_take!(take_symbol, String, Symbol);

    /// Returns the text of a string or symbol atom.
    ///
    /// KiCad is not consistent about quoting (a `uuid` is a bare symbol in
    /// version 7 files and a quoted string in version 8 files), so readers
    /// that only care about the text use this.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(value) | Self::Symbol(value) => Some(value),
            _ => None,
        }
    }

    /// Takes a list of values and constructs a new [`Sexpr::List`]. Crucially,
    /// the list argument takes in an array of [`Option`] values, which
    /// makes it very convenient to serialize a struct with optional fields
    /// into an S-expression.
    ///
    /// # Example
    ///
    /// ```
    /// use kicad_sexpr::Sexpr;
    ///
    /// let diameter: Option<f64> = None;
    ///
    /// assert_eq!(
    ///     Sexpr::list([
    ///         Some(Sexpr::symbol("junction")),
    ///         diameter.map(Sexpr::number),
    ///     ]),
    ///     Sexpr::List(vec![Sexpr::Symbol("junction".to_string())])
    /// )
    /// ```
    pub fn list(value: impl Into<Vec<Option<Sexpr>>>) -> Self {
        Self::List(value.into().into_iter().flatten().collect::<Vec<_>>())
    }

    sexpr_construct!(number, f64, Number);
    sexpr_construct!(string, String, String);
    sexpr_construct!(symbol, String, Symbol);

    /// Works the same way as [`Sexpr::list`], but puts the given name
    /// as a [`Sexpr::Symbol`] in the first position of the list.
    ///
    /// # Example
    ///
    /// ```
    /// use kicad_sexpr::Sexpr;
    ///
    /// assert_eq!(
    ///     Sexpr::list_with_name("xy", [
    ///         Some(Sexpr::number(95.0)),
    ///         Some(Sexpr::number(100.0)),
    ///     ]),
    ///     Sexpr::List(
    ///         vec![
    ///             Sexpr::Symbol("xy".to_string()),
    ///             Sexpr::Number(95.0),
    ///             Sexpr::Number(100.0),
    ///         ]
    ///     )
    /// )
    /// ```
    pub fn list_with_name(name: impl Into<String>, values: impl Into<Vec<Option<Sexpr>>>) -> Self {
        let mut list = vec![Some(Self::symbol(name.into()))];
        list.extend(values.into());
        Self::list(list)
    }

    sexpr_construct_with_name!(number_with_name, f64, Number);
    sexpr_construct_with_name!(string_with_name, String, String);
    sexpr_construct_with_name!(symbol_with_name, String, Symbol);

    pub fn bool_with_name(name: impl Into<String>, value: bool) -> Self {
        Self::symbol_with_name(name, if value { "yes" } else { "no" })
    }
}

#[derive(Debug, Error, PartialEq, Clone)]
#[error("S-expression parse error near `{near}`")]
pub struct SexprParseError {
    /// The first few characters of the input that could not be parsed
    pub near: String,
}

impl SexprParseError {
    fn at(input: &str) -> Self {
        Self {
            near: input.chars().take(32).collect(),
        }
    }
}

pub fn from_str(input: &str) -> Result<Sexpr, SexprParseError> {
    let trimmed = input.trim();

    let (rest, sexpr) = parse_sexpr(trimmed).map_err(|e| match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => SexprParseError::at(e.input),
        nom::Err::Incomplete(_) => SexprParseError::at(""),
    })?;

    if !rest.is_empty() {
        return Err(SexprParseError::at(rest));
    }

    Ok(sexpr)
}

fn parse_sexpr(input: &str) -> IResult<&str, Sexpr> {
    alt((
        parse_sexpr_list,
        parse_sexpr_number,
        parse_sexpr_string,
        parse_sexpr_symbol,
    ))(input)
}

fn parse_sexpr_list(input: &str) -> IResult<&str, Sexpr> {
    map(
        delimited(
            tag("("),
            many0(preceded(multispace0, parse_sexpr)),
            preceded(multispace0, tag(")")),
        ),
        Sexpr::List,
    )(input)
}

fn parse_sexpr_number(input: &str) -> IResult<&str, Sexpr> {
    // A number must be followed by a separator, otherwise it is the start of
    // a symbol such as a UUID
    map(
        terminated(
            parse_number,
            peek(alt((multispace1, tag(")"), tag("("), eof))),
        ),
        Sexpr::Number,
    )(input)
}

fn parse_sexpr_string(input: &str) -> IResult<&str, Sexpr> {
    map(parse_string, Sexpr::String)(input)
}

fn parse_sexpr_symbol(input: &str) -> IResult<&str, Sexpr> {
    map(
        take_while1(|c: char| !(c.is_whitespace() || c == '(' || c == ')' || c == '"')),
        |s: &str| Sexpr::Symbol(s.to_string()),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_parsed(input: &str, expected: Sexpr) {
        let (input, sexpr) = parse_sexpr(input).unwrap();

        assert_eq!(input, "");
        assert_eq!(sexpr, expected);
    }

    fn symbol(s: &str) -> Sexpr {
        Sexpr::Symbol(s.to_string())
    }

    #[test]
    fn test_parse_empty_list() {
        assert_parsed("(test)", Sexpr::List(vec![symbol("test")]));
        assert_parsed("()", Sexpr::List(vec![]));
    }

    #[test]
    fn test_parse_list_with_whitespace() {
        assert_parsed("(\n\ttest  \n)", Sexpr::List(vec![symbol("test")]));
    }

    #[test]
    fn test_parse_number() {
        assert_parsed("123", Sexpr::Number(123.0));
        assert_parsed("-123.456", Sexpr::Number(-123.456));
    }

    #[test]
    fn test_parse_symbol() {
        assert_parsed("yes", symbol("yes"));
        assert_parsed(
            "04740ea2-db09-4cc1-b2d4-53506044432e",
            symbol("04740ea2-db09-4cc1-b2d4-53506044432e"),
        );
        assert_parsed("+3.3V", symbol("+3.3V"));
        assert_parsed("#PWR01", symbol("#PWR01"));
        assert_parsed("1.27mm", symbol("1.27mm"));
    }

    #[test]
    fn test_parse_nested_lists() {
        assert_parsed(
            "(test (nested_one) (nested_two (nested_three)))",
            Sexpr::List(vec![
                symbol("test"),
                Sexpr::List(vec![symbol("nested_one")]),
                Sexpr::List(vec![
                    symbol("nested_two"),
                    Sexpr::List(vec![symbol("nested_three")]),
                ]),
            ]),
        );
    }

    #[test]
    fn test_parse_property() {
        assert_parsed(
            r#"(property "Reference" "R1" (at 100 97.46 0))"#,
            Sexpr::List(vec![
                symbol("property"),
                Sexpr::String("Reference".to_string()),
                Sexpr::String("R1".to_string()),
                Sexpr::List(vec![
                    symbol("at"),
                    Sexpr::Number(100.0),
                    Sexpr::Number(97.46),
                    Sexpr::Number(0.0),
                ]),
            ]),
        );
    }

    #[test]
    fn test_parse_quoted_and_bare_uuid() {
        let bare = from_str("(uuid 2349f563-989d-4999-a369-9f24d984ce74)").unwrap();
        let quoted = from_str(r#"(uuid "2349f563-989d-4999-a369-9f24d984ce74")"#).unwrap();

        assert_eq!(bare.as_list().unwrap()[1].as_text(), quoted.as_list().unwrap()[1].as_text());
    }

    #[test]
    fn test_from_str_rejects_trailing_input() {
        assert!(from_str("(a) (b)").is_err());
        assert!(from_str("(a (b)").is_err());
    }
}
