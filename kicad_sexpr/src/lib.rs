//! KiCad S-Expression tree, parser and printer.
//!
//! [`from_str`] parses a single expression into a [`Sexpr`] tree. The
//! printers in [`format`] write trees back out in the layout KiCad itself
//! uses for schematic files (one nested list per line, closing parenthesis
//! aligned with its opening line).

mod format;
mod number;
mod sexpr;
mod string;

pub use format::{format_number, to_string, to_string_with, FormatOptions};
pub use sexpr::{from_str, Sexpr, SexprList, SexprParseError};
pub use string::escape_string;
