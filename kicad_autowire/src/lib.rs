//! Automatic net wiring for KiCad schematic files.
//!
//! A schematic is read as a sequence of top-level blocks (see
//! [`document::Document`]), pins are located through a
//! [`library::LibraryPinTable`], a declarative pin-to-net table is turned into
//! a [`net::NetModel`], and [`routing::synthesize`] generates the wires,
//! junctions, labels and no-connect markers that tie every net
//! together. [`patch::patch`] splices those elements into the original text
//! without touching any other byte of the file.
//!
//! [`autowire`] and [`autowire_file`] run the whole pipeline.

use std::path::Path;

use common::{IdSource, Point};
use config::{AutowireConfig, ConfigError};
use document::{Document, Element};
use log::info;
use net::build_nets;
use patch::{patch, write_document};
use routing::{synthesize, ExistingMarkers};
use thiserror::Error;

pub mod common;
pub mod config;
pub mod convert;
pub mod diagnostic;
pub mod document;
pub mod geometry;
pub mod library;
pub mod net;
pub mod patch;
pub mod routing;

pub use diagnostic::Diagnostic;

/// The type of an S-expression token without the inner data.
///
/// Used in error messages to indicate what type of S-expression was expected.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum SexprKind {
    List,
    Symbol,
    String,
    Number,
}

/// Errors that can occur while reading, wiring or writing a schematic.
#[derive(Debug, Error)]
pub enum AutowireError {
    #[error("Malformed document: {message} (at {line}:{column})")]
    MalformedDocument {
        message: String,
        line: usize,
        column: usize,
    },
    #[error(transparent)]
    Sexpr(#[from] kicad_sexpr::SexprParseError),
    #[error("Unexpected end of list")]
    UnexpectedEndOfList,
    #[error("Unexpected sexpr type. Expected: `{expected:?}`")]
    UnexpectedSexprType { expected: SexprKind },
    #[error("Non-matching symbol. Expected: `{expected}`; Found: `{found}`")]
    NonMatchingSymbol { found: String, expected: String },
    #[error("Missing field `{0}`")]
    MissingField(&'static str),
    #[error("Invalid value `{value}` for enum `{enum_name}`.")]
    InvalidEnumValue {
        value: String,
        enum_name: &'static str,
    },
    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
    #[error("Invalid unit identifier: `{0}`")]
    InvalidUnitIdentifier(String),
    #[error("Invalid library identifier: `{0}`")]
    InvalidLibraryIdentifier(String),
    #[error("Invalid rotation: `{0}` is not a multiple of 90 degrees")]
    InvalidRotation(f64),
    #[error("Library symbol `{library_id}` has no pin `{pin_number}`")]
    UnknownLibraryPin {
        library_id: String,
        pin_number: String,
    },
    #[error(
        "Pin {reference}.{pin_number} is assigned to both `{first_net}` and `{second_net}`"
    )]
    DuplicatePinAssignment {
        reference: String,
        pin_number: String,
        first_net: String,
        second_net: String,
    },
    #[error("No component with reference `{reference}` in the document")]
    UnknownComponentReference { reference: String },
    #[error("Nets `{first_net}` and `{second_net}` would share the channel at {offset}")]
    ChannelCollision {
        first_net: String,
        second_net: String,
        offset: f64,
    },
    #[error("Endpoints {first} and {second} belong to different nets but sit at {position}")]
    CoincidentNetEndpoints {
        first: String,
        second: String,
        position: Point,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AutowireError {
    pub fn invalid_enum_value<T>(value: impl Into<String>) -> Self {
        Self::InvalidEnumValue {
            value: value.into(),
            enum_name: std::any::type_name::<T>(),
        }
    }
}

macro_rules! simple_to_from_string {
    ($name:ident, $( $string:ident <-> $variant:ident ),+ $(,)?) => {
        impl std::str::FromStr for $name {
            type Err = $crate::AutowireError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $(
                        stringify!($string) => Self::$variant,
                    )*
                    _ => return Err($crate::AutowireError::invalid_enum_value::<Self>(s)),
                })
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.to_string()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant => f.write_str(stringify!($string)),
                    )*
                }
            }
        }
    };
}

pub(crate) use simple_to_from_string;

/* Exposed APIs */

/// Counts of everything a pipeline run added to the document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub nets: usize,
    pub wires: usize,
    pub junctions: usize,
    pub labels: usize,
    pub power_symbols: usize,
    pub no_connects: usize,
}

impl Summary {
    fn count(nets: usize, elements: &[Element]) -> Self {
        let mut summary = Self {
            nets,
            ..Self::default()
        };

        for element in elements {
            match element {
                Element::Wire(_) => summary.wires += 1,
                Element::Junction(_) => summary.junctions += 1,
                Element::GlobalLabel(_) => summary.labels += 1,
                Element::PowerSymbol(_) => summary.power_symbols += 1,
                Element::NoConnect(_) => summary.no_connects += 1,
            }
        }

        summary
    }
}

/// The result of a successful [`autowire`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct AutowireOutput {
    /// The patched document text
    pub text: String,
    /// Every element that was inserted, in insertion order
    pub elements: Vec<Element>,
    pub summary: Summary,
    /// Problems that were skipped over instead of aborting the run
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the whole pipeline over a document held in memory.
///
/// Nothing is written anywhere; on error the caller simply gets no output.
pub fn autowire(
    source: &str,
    config: &AutowireConfig,
    ids: &mut dyn IdSource,
) -> Result<AutowireOutput, AutowireError> {
    config.validate()?;

    let document = Document::parse(source)?;
    let library = config.library_table(&document)?;

    let net_model = build_nets(
        &config.nets,
        document.components(),
        &library,
        &config.net_options(),
    )?;

    let existing = ExistingMarkers::from_document(&document);
    let synthesis = synthesize(&net_model, &existing, &config.routing_options(), ids)?;

    let text = patch(&document, &synthesis.elements, &config.patch_options());

    let summary = Summary::count(net_model.nets.len(), &synthesis.elements);

    let diagnostics = document
        .diagnostics()
        .iter()
        .chain(&net_model.diagnostics)
        .chain(&synthesis.diagnostics)
        .cloned()
        .collect::<Vec<_>>();

    info!(
        "wired {} nets: {} wires, {} junctions, {} labels, {} power symbols, {} no-connects ({} diagnostics)",
        summary.nets,
        summary.wires,
        summary.junctions,
        summary.labels,
        summary.power_symbols,
        summary.no_connects,
        diagnostics.len()
    );

    Ok(AutowireOutput {
        text,
        elements: synthesis.elements,
        summary,
        diagnostics,
    })
}

/// Reads `input`, runs [`autowire`] and writes the result to `output`.
///
/// The input is read once and the output written once. If any stage fails
/// the output file is left untouched.
pub fn autowire_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &AutowireConfig,
) -> Result<AutowireOutput, AutowireError> {
    let source = std::fs::read_to_string(input.as_ref())?;

    let mut ids = config.id_source();
    let result = autowire(&source, config, ids.as_mut())?;

    write_document(output.as_ref(), &result.text)?;

    info!("wrote {}", output.as_ref().display());

    Ok(result)
}
