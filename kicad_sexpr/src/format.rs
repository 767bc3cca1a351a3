//! KiCad-style S-expression printer.
//!
//! Lists that only contain atoms are written on one line. Any other list
//! keeps its leading atoms on the opening line, puts every remaining child on
//! its own line one level deeper, and closes on a line of its own:
//!
//! ```text
//! (wire
//! 	(pts
//! 		(xy 95 100)
//! 		(xy 95 102.54)
//! 	)
//! 	(uuid "2349f563-989d-4999-a369-9f24d984ce74")
//! )
//! ```

use crate::{string::escape_string, Sexpr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// One level of indentation, usually a tab or two spaces
    pub indent: String,
    /// The nesting level of the expression being printed. The first line is
    /// never indented, the caller decides where it goes.
    pub depth: usize,
    /// Maximum number of decimal places written for numbers
    pub precision: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent: "\t".to_string(),
            depth: 0,
            precision: 4,
        }
    }
}

/// Prints an expression with the default options.
pub fn to_string(sexpr: &Sexpr) -> String {
    to_string_with(sexpr, &FormatOptions::default())
}

pub fn to_string_with(sexpr: &Sexpr, options: &FormatOptions) -> String {
    let mut result = String::new();
    write_recursive(&mut result, sexpr, options, options.depth);
    result
}

fn write_recursive(result: &mut String, sexpr: &Sexpr, options: &FormatOptions, depth: usize) {
    match sexpr {
        Sexpr::List(list) => {
            result.push('(');

            let inline = list
                .iter()
                .position(|child| matches!(child, Sexpr::List(_)))
                .unwrap_or(list.len());

            for (i, child) in list[..inline].iter().enumerate() {
                if i != 0 {
                    result.push(' ');
                }
                write_recursive(result, child, options, depth + 1);
            }

            if inline == list.len() {
                result.push(')');
                return;
            }

            for child in &list[inline..] {
                result.push('\n');
                result.push_str(&options.indent.repeat(depth + 1));
                write_recursive(result, child, options, depth + 1);
            }

            result.push('\n');
            result.push_str(&options.indent.repeat(depth));
            result.push(')');
        }
        Sexpr::Number(number) => result.push_str(&format_number(*number, options.precision)),
        Sexpr::String(string) => result.push_str(&escape_string(string)),
        Sexpr::Symbol(symbol) => result.push_str(symbol),
    }
}

/// Formats a number with at most `precision` decimal places and no trailing
/// zeros, the way KiCad writes coordinates.
///
/// ```
/// use kicad_sexpr::format_number;
///
/// assert_eq!(format_number(102.54, 4), "102.54");
/// assert_eq!(format_number(95.0, 4), "95");
/// assert_eq!(format_number(1.0 / 3.0, 4), "0.3333");
/// ```
pub fn format_number(value: f64, precision: usize) -> String {
    let mut text = format!("{:.*}", precision, value);

    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }

    if text == "-0" {
        text = "0".to_string();
    }

    text
}
