//! Parser and printer for quoted strings.
//!
//! - Enclosed by double quotes
//! - Can contain any raw unescaped code point besides \ and "
//! - Recognizes the escape sequences \n, \r, \t, \", \\ and \/; any other
//!   escaped character stands for itself

use nom::branch::alt;
use nom::bytes::complete::is_not;
use nom::character::complete::{anychar, char};
use nom::combinator::{map, value, verify};
use nom::multi::fold_many0;
use nom::sequence::{delimited, preceded};
use nom::{IResult, Parser};

/// Parse an escaped character: \n, \t, \r, etc.
fn parse_escaped_char(input: &str) -> IResult<&str, char> {
    preceded(
        char('\\'),
        alt((
            value('\n', char('n')),
            value('\r', char('r')),
            value('\t', char('t')),
            value('\\', char('\\')),
            value('/', char('/')),
            value('"', char('"')),
            anychar,
        )),
    )
    .parse(input)
}

/// Parse a non-empty block of text that doesn't include \ or "
fn parse_literal(input: &str) -> IResult<&str, &str> {
    verify(is_not("\"\\"), |s: &str| !s.is_empty()).parse(input)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringFragment<'a> {
    Literal(&'a str),
    EscapedChar(char),
}

fn parse_fragment(input: &str) -> IResult<&str, StringFragment<'_>> {
    alt((
        map(parse_literal, StringFragment::Literal),
        map(parse_escaped_char, StringFragment::EscapedChar),
    ))
    .parse(input)
}

/// Parse a quoted string, resolving escape sequences.
pub fn parse_string(input: &str) -> IResult<&str, String> {
    let build_string = fold_many0(parse_fragment, String::new, |mut string, fragment| {
        match fragment {
            StringFragment::Literal(s) => string.push_str(s),
            StringFragment::EscapedChar(c) => string.push(c),
        }
        string
    });

    delimited(char('"'), build_string, char('"')).parse(input)
}

/// Quotes a string the way KiCad writes it: backslashes, double quotes and
/// line breaks are escaped, everything else is written as is.
pub fn escape_string(value: &str) -> String {
    let mut result = String::with_capacity(value.len() + 2);

    result.push('"');

    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c => result.push(c),
        }
    }

    result.push('"');

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string() {
        assert_eq!(
            parse_string(r#""Hello, world!""#),
            Ok(("", "Hello, world!".to_string()))
        );
        assert_eq!(
            parse_string(r#""Hello, \"world\"!""#),
            Ok(("", "Hello, \"world\"!".to_string()))
        );
        assert_eq!(
            parse_string(r#""Hello, \nworld!""#),
            Ok(("", "Hello, \nworld!".to_string()))
        );
        assert_eq!(
            parse_string(r#""Hello, \\world!""#),
            Ok(("", "Hello, \\world!".to_string()))
        );
        assert_eq!(
            parse_string(r#""${INTERSHEET_REFS}""#),
            Ok(("", "${INTERSHEET_REFS}".to_string()))
        );
    }

    #[test]
    fn test_parse_empty_string() {
        assert_eq!(parse_string(r#""" x"#), Ok((" x", String::new())));
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("+3.3V"), r#""+3.3V""#);
        assert_eq!(escape_string(r#"a "b" \c"#), r#""a \"b\" \\c""#);
        assert_eq!(escape_string("µA"), "\"µA\"");
    }

    #[test]
    fn test_escape_then_parse() {
        let original = "line one\nsay \"hi\"";

        assert_eq!(
            parse_string(&escape_string(original)),
            Ok(("", original.to_string()))
        );
    }
}
