//! Symbols within a schematic: placed component instances and the library
//! definitions embedded in `lib_symbols`.

use kicad_sexpr::Sexpr;

use crate::{
    common::{
        symbol::{LibraryId, UnitId},
        Mirror, Placement, Point, Rotation, Uuid,
    },
    convert::{FromSexpr, Parser},
    AutowireError,
};

/// A symbol instance placed on the schematic.
///
/// Not to be confused with [`LibrarySymbol`], which defines where the pins of
/// every instance of a symbol are.
#[derive(Debug, PartialEq, Clone)]
pub struct ComponentInstance {
    /// The value of the `Reference` property, e.g. `R1` or `#PWR01`
    pub reference: Option<String>,
    /// The `lib_name` override if present, `lib_id` otherwise. This is the
    /// name of the matching entry in `lib_symbols`.
    pub library_id: LibraryId,
    pub position: Point,
    pub rotation: Rotation,
    pub mirror: Option<Mirror>,
    pub unit: u16,
    /// Pin numbers listed by the instance, in document order
    pub pins: Vec<String>,
    pub uuid: Option<Uuid>,
}

impl ComponentInstance {
    /// Power symbols and power flags have references starting with `#`. They
    /// never take part in net resolution.
    pub fn is_virtual(&self) -> bool {
        self.reference
            .as_deref()
            .is_some_and(|reference| reference.starts_with('#'))
    }
}

impl FromSexpr for ComponentInstance {
    fn from_sexpr(mut parser: Parser) -> Result<Self, AutowireError> {
        parser.expect_symbol_matching("symbol")?;

        let lib_name = parser.find_text("lib_name")?;
        let lib_id = parser
            .find_text("lib_id")?
            .ok_or(AutowireError::MissingField("lib_id"))?;
        let library_id = lib_name.unwrap_or(lib_id).parse::<LibraryId>()?;

        let placement = parser.expect_parsed::<Placement>("at")?;
        let mirror = parser
            .find_text("mirror")?
            .map(|m| m.parse::<Mirror>())
            .transpose()?;
        let unit = parser
            .find_number("unit")?
            .map_or(Ok(1), unit_number)?;

        let mut reference = None;

        for mut property in parser.find_all("property") {
            property.expect_symbol_matching("property")?;

            if property.expect_string()? == "Reference" {
                reference = Some(property.expect_string()?);
                break;
            }
        }

        let pins = parser
            .find_all("pin")
            .into_iter()
            .map(|mut pin| {
                pin.expect_symbol_matching("pin")?;
                pin.expect_text()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let uuid = parser
            .find_text("uuid")?
            .map(|text| text.parse::<Uuid>())
            .transpose()?;

        Ok(Self {
            reference,
            library_id,
            position: placement.position,
            rotation: placement.rotation,
            mirror,
            unit,
            pins,
            uuid,
        })
    }
}

/// Instances are drawn by units numbered from 1. Unit 0 only exists in
/// library definitions.
fn unit_number(value: f64) -> Result<u16, AutowireError> {
    let invalid = || AutowireError::InvalidEnumValue {
        value: value.to_string(),
        enum_name: "unit",
    };

    if value.fract() != 0.0 {
        return Err(invalid());
    }

    u16::try_from(value as i64)
        .ok()
        .filter(|&unit| unit >= 1)
        .ok_or_else(invalid)
}

/// A pin of a library symbol, relative to the symbol origin.
#[derive(Debug, PartialEq, Clone)]
pub struct LibraryPin {
    pub number: String,
    pub offset: Point,
    /// The unit drawing this pin. Unit 0 pins belong to every unit.
    pub unit: u16,
}

/// A symbol definition, either a `(symbol "Lib:Name" ...)` entry of
/// `lib_symbols` or a symbol library entry.
#[derive(Debug, PartialEq, Clone)]
pub struct LibrarySymbol {
    pub id: LibraryId,
    pub pins: Vec<LibraryPin>,
}

impl LibrarySymbol {
    /// Returns true if `list` is a library definition rather than a placed
    /// instance. Definitions name themselves with a string right after the
    /// keyword, instances carry a `lib_id`.
    pub fn is_definition(list: &[Sexpr]) -> bool {
        matches!(list.get(1), Some(Sexpr::String(_)))
    }

    fn collect_pins(
        parser: &Parser,
        unit: u16,
        pins: &mut Vec<LibraryPin>,
    ) -> Result<(), AutowireError> {
        for mut pin in parser.find_all("pin") {
            pin.expect_symbol_matching("pin")?;

            let offset = pin.expect_parsed::<Point>("at")?;
            let number = pin
                .find_text("number")?
                .ok_or(AutowireError::MissingField("number"))?;

            pins.push(LibraryPin {
                number,
                offset,
                unit,
            });
        }

        Ok(())
    }
}

impl FromSexpr for LibrarySymbol {
    fn from_sexpr(mut parser: Parser) -> Result<Self, AutowireError> {
        parser.expect_symbol_matching("symbol")?;

        let id = parser.expect_string()?.parse::<LibraryId>()?;

        let mut pins = Vec::new();

        // Pins written directly in the symbol are shared by every unit
        Self::collect_pins(&parser, 0, &mut pins)?;

        for mut sub_unit in parser.find_all("symbol") {
            sub_unit.expect_symbol_matching("symbol")?;

            let unit_id = sub_unit.expect_string()?.parse::<UnitId>()?;

            // De Morgan alternates repeat the pins of the normal body style
            if unit_id.style > 1 {
                continue;
            }

            Self::collect_pins(&sub_unit, unit_id.unit, &mut pins)?;
        }

        Ok(Self { id, pins })
    }
}
