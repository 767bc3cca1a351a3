//! Common structures shared by the document model, geometry and routing.

use std::{fmt::Display, str::FromStr};

use kicad_sexpr::{format_number, Sexpr};

use crate::{
    convert::{FromSexpr, Parser, ToSexpr, ToSexprWithName},
    document::DocumentStyle,
    simple_to_from_string, AutowireError,
};

pub mod symbol;

/// Two coordinates closer than this (in millimeters) are treated as the same
/// point.
pub const TOLERANCE: f64 = 0.01;

/// Resolution of [`Point::grid_key`], in millimeters.
const GRID_RESOLUTION: f64 = 1e-4;

/// A point in schematic space. KiCad schematics use millimeters with the Y
/// axis pointing down.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn translate(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Returns true if both coordinates are within [`TOLERANCE`] of `other`.
    pub fn same_as(&self, other: &Point) -> bool {
        (self.x - other.x).abs() < TOLERANCE && (self.y - other.y).abs() < TOLERANCE
    }

    pub fn distance_squared(&self, other: &Point) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }

    /// An integer key for hashing and de-duplicating points, rounded to
    /// 0.0001 mm.
    pub fn grid_key(&self) -> (i64, i64) {
        (
            (self.x / GRID_RESOLUTION).round() as i64,
            (self.y / GRID_RESOLUTION).round() as i64,
        )
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", format_number(self.x, 4), format_number(self.y, 4))
    }
}

/// Reads any `(at X Y ...)` or `(xy X Y)` list, ignoring trailing values.
impl FromSexpr for Point {
    fn from_sexpr(mut parser: Parser) -> Result<Self, AutowireError> {
        parser.expect_symbol_matching_any(&["at", "xy"])?;

        let x = parser.expect_number()?;
        let y = parser.expect_number()?;

        Ok(Self { x, y })
    }
}

impl ToSexprWithName for Point {
    fn to_sexpr_with_name(&self, name: &str) -> Sexpr {
        Sexpr::list_with_name(name, [Some(Sexpr::number(self.x)), Some(Sexpr::number(self.y))])
    }
}

// ############################################################################

/// An orthogonal rotation. KiCad only allows symbols and labels to be placed
/// at multiples of 90 degrees.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalizes any multiple of 90 degrees, including negative angles and
    /// full turns.
    pub fn from_degrees(degrees: f64) -> Result<Self, AutowireError> {
        let quarters = degrees / 90.0;

        if !quarters.is_finite() || (quarters - quarters.round()).abs() > 1e-9 {
            return Err(AutowireError::InvalidRotation(degrees));
        }

        Ok(match (quarters.round() as i64).rem_euclid(4) {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        })
    }

    pub fn degrees(self) -> f64 {
        match self {
            Self::Deg0 => 0.0,
            Self::Deg90 => 90.0,
            Self::Deg180 => 180.0,
            Self::Deg270 => 270.0,
        }
    }

    /// Exact `(sin, cos)` of the angle.
    pub fn sin_cos(self) -> (f64, f64) {
        match self {
            Self::Deg0 => (0.0, 1.0),
            Self::Deg90 => (1.0, 0.0),
            Self::Deg180 => (0.0, -1.0),
            Self::Deg270 => (-1.0, 0.0),
        }
    }
}

/// A position together with the rotation of the object placed there, read
/// from `(at X Y ANGLE)`.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Placement {
    pub position: Point,
    pub rotation: Rotation,
}

impl FromSexpr for Placement {
    fn from_sexpr(mut parser: Parser) -> Result<Self, AutowireError> {
        parser.expect_symbol_matching("at")?;

        let x = parser.expect_number()?;
        let y = parser.expect_number()?;
        let rotation = Rotation::from_degrees(parser.maybe_number().unwrap_or(0.0))?;

        Ok(Self {
            position: Point::new(x, y),
            rotation,
        })
    }
}

impl ToSexpr for Placement {
    fn to_sexpr(&self, _style: &DocumentStyle) -> Sexpr {
        Sexpr::list_with_name(
            "at",
            [
                Some(Sexpr::number(self.position.x)),
                Some(Sexpr::number(self.position.y)),
                Some(Sexpr::number(self.rotation.degrees())),
            ],
        )
    }
}

/// The `(mirror x|y)` attribute of a symbol instance.
///
/// Mirroring around the X axis flips the vertical component of pin offsets,
/// mirroring around the Y axis flips the horizontal one.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Mirror {
    X,
    Y,
}

simple_to_from_string! {
    Mirror,
    x <-> X,
    y <-> Y,
}

impl Mirror {
    pub fn apply(self, offset: Point) -> Point {
        match self {
            Self::X => Point::new(offset.x, -offset.y),
            Self::Y => Point::new(-offset.x, offset.y),
        }
    }
}

// ############################################################################

/// A universally unique identifier attached to every schematic item.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Uuid(pub uuid::Uuid);

impl FromStr for Uuid {
    type Err = AutowireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl Display for Uuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Written as a quoted string or a bare symbol, whichever the document uses.
impl ToSexpr for Uuid {
    fn to_sexpr(&self, style: &DocumentStyle) -> Sexpr {
        if style.quoted_uuids() {
            Sexpr::string_with_name("uuid", self.to_string())
        } else {
            Sexpr::symbol_with_name("uuid", self.to_string())
        }
    }
}

/// A source of identifiers for newly synthesized elements.
pub trait IdSource {
    fn next_id(&mut self) -> Uuid;
}

/// Random version 4 identifiers, the way KiCad itself creates them.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&mut self) -> Uuid {
        Uuid(uuid::Uuid::new_v4())
    }
}

/// Deterministic version 5 identifiers derived from a seed and a counter.
///
/// Two runs with the same seed over the same input produce byte-identical
/// output.
#[derive(Debug, Clone)]
pub struct SeededIds {
    namespace: uuid::Uuid,
    counter: u64,
}

impl SeededIds {
    pub fn new(seed: &str) -> Self {
        Self {
            namespace: uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, seed.as_bytes()),
            counter: 0,
        }
    }
}

impl IdSource for SeededIds {
    fn next_id(&mut self) -> Uuid {
        self.counter += 1;

        Uuid(uuid::Uuid::new_v5(
            &self.namespace,
            &self.counter.to_be_bytes(),
        ))
    }
}
