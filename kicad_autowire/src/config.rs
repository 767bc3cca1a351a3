//! Run configuration, loaded from TOML or JSON.
//!
//! ```toml
//! unit_scale = 1.0
//! channel_spacing = 2.54
//! strictness = "strict"
//! channel_base = "shared"
//! id_seed = "rev-b"
//!
//! [nets.R1]
//! 1 = "GND"
//! 2 = "VCC"
//!
//! [labels]
//! GND = "power"
//!
//! [library]
//! "Device:R" = [["1", 0, 3.81], ["2", 0, -3.81]]
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    common::{symbol::LibraryId, IdSource, Point, RandomIds, SeededIds},
    document::{Document, LibraryPin},
    library::LibraryPinTable,
    net::{NetOptions, PinMap, Strictness},
    patch::{Anchor, PatchOptions},
    routing::{ChannelBase, LabelKind, RoutingOptions},
    AutowireError,
};

/// Coordinates are written with at most this many decimal places.
const MAX_PRECISION: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Unsupported configuration file `{}`, expected a .toml or .json file", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A pin number written either as a string or as a bare integer.
#[derive(Deserialize)]
#[serde(untagged)]
enum PinNumber {
    Text(String),
    Integer(i64),
}

impl From<PinNumber> for String {
    fn from(number: PinNumber) -> Self {
        match number {
            PinNumber::Text(text) => text,
            PinNumber::Integer(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfiguredPinRepr {
    Tuple(PinNumber, f64, f64),
    Detailed {
        number: PinNumber,
        x: f64,
        y: f64,
        #[serde(default)]
        unit: u16,
    },
}

/// A library pin given in configuration, either as `[number, x, y]` or as
/// `{ number, x, y, unit }`. Coordinates are in configuration units.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(from = "ConfiguredPinRepr")]
pub struct ConfiguredPin {
    pub number: String,
    pub x: f64,
    pub y: f64,
    /// 0 when the pin belongs to every unit
    pub unit: u16,
}

impl From<ConfiguredPinRepr> for ConfiguredPin {
    fn from(repr: ConfiguredPinRepr) -> Self {
        match repr {
            ConfiguredPinRepr::Tuple(number, x, y) => Self {
                number: number.into(),
                x,
                y,
                unit: 0,
            },
            ConfiguredPinRepr::Detailed { number, x, y, unit } => Self {
                number: number.into(),
                x,
                y,
                unit,
            },
        }
    }
}

/// Everything a run of [`crate::autowire`] needs besides the document.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutowireConfig {
    /// `{reference: {pin: net}}`, in declaration order
    pub nets: PinMap,
    /// Pin offsets per library identifier, in configuration units
    pub library: BTreeMap<String, Vec<ConfiguredPin>>,
    /// Also read pins from the document's embedded `lib_symbols`. Configured
    /// pins win over embedded ones.
    pub use_document_library: bool,
    /// Document units per configuration unit, applied to configured
    /// coordinates only
    pub unit_scale: f64,
    pub channel_spacing: f64,
    pub channel_base: ChannelBase,
    pub strictness: Strictness,
    pub reuse_existing_labels: bool,
    /// How each net is marked at its anchor, a global label by default
    pub labels: BTreeMap<String, LabelKind>,
    pub anchor: Anchor,
    pub precision: usize,
    /// Derive identifiers from this seed instead of generating random ones
    pub id_seed: Option<String>,
}

impl Default for AutowireConfig {
    fn default() -> Self {
        Self {
            nets: PinMap::default(),
            library: BTreeMap::new(),
            use_document_library: true,
            unit_scale: 1.0,
            channel_spacing: 2.54,
            channel_base: ChannelBase::Shared,
            strictness: Strictness::Lenient,
            reuse_existing_labels: false,
            labels: BTreeMap::new(),
            anchor: Anchor::default(),
            precision: 4,
            id_seed: None,
        }
    }
}

impl AutowireConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Loads a `.toml` or `.json` file, picked by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let parse = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str,
            Some("json") => Self::from_json_str,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = parse(&source)?;

        debug!(
            "loaded {} pin assignments and {} library symbols from {}",
            config.nets.len(),
            config.library.len(),
            path.display()
        );

        Ok(config)
    }

    /// Rejects values that would produce nonsense coordinates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.unit_scale.is_finite() || self.unit_scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "unit_scale must be a positive number, got {}",
                self.unit_scale
            )));
        }

        if !self.channel_spacing.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "channel_spacing must be a finite number, got {}",
                self.channel_spacing
            )));
        }

        if let ChannelBase::Absolute(y) = self.channel_base {
            if !y.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "channel_base must be `shared`, `anchor` or a finite number, got {y}"
                )));
            }
        }

        if self.precision > MAX_PRECISION {
            return Err(ConfigError::Invalid(format!(
                "precision must be at most {MAX_PRECISION}, got {}",
                self.precision
            )));
        }

        for (id, pins) in &self.library {
            if let Some(pin) = pins.iter().find(|p| !p.x.is_finite() || !p.y.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "pin `{}` of `{id}` has a non-finite offset",
                    pin.number
                )));
            }
        }

        Ok(())
    }

    /// Builds the pin table used to locate pins in `document`.
    pub fn library_table(&self, document: &Document) -> Result<LibraryPinTable, AutowireError> {
        let mut table = if self.use_document_library {
            LibraryPinTable::from_document(document)
        } else {
            LibraryPinTable::new()
        };

        let mut configured = LibraryPinTable::new();

        for (id, pins) in &self.library {
            let pins = pins
                .iter()
                .map(|pin| LibraryPin {
                    number: pin.number.clone(),
                    offset: Point::new(pin.x * self.unit_scale, pin.y * self.unit_scale),
                    unit: pin.unit,
                })
                .collect();

            configured.insert(id.parse::<LibraryId>()?, pins);
        }

        debug!("{} library symbols configured", configured.len());

        table.merge(configured);

        Ok(table)
    }

    pub fn net_options(&self) -> NetOptions {
        NetOptions {
            strictness: self.strictness,
        }
    }

    pub fn routing_options(&self) -> RoutingOptions {
        RoutingOptions {
            channel_spacing: self.channel_spacing * self.unit_scale,
            channel_base: match self.channel_base {
                ChannelBase::Absolute(y) => ChannelBase::Absolute(y * self.unit_scale),
                base => base,
            },
            reuse_existing_labels: self.reuse_existing_labels,
            label_kinds: self.labels.clone(),
        }
    }

    pub fn patch_options(&self) -> PatchOptions {
        PatchOptions {
            anchor: self.anchor.clone(),
            precision: self.precision,
        }
    }

    /// Seeded identifiers when `id_seed` is set, random ones otherwise.
    pub fn id_source(&self) -> Box<dyn IdSource> {
        match &self.id_seed {
            Some(seed) => Box::new(SeededIds::new(seed)),
            None => Box::new(RandomIds),
        }
    }
}
