//! Connectivity items of a schematic: wires, junctions, labels, power ports
//! and no-connect markers.
//!
//! These are both read from existing blocks and produced by the routing
//! synthesizer, which is why they know how to write themselves back out.

use kicad_sexpr::Sexpr;

use crate::{
    common::{Placement, Point, Uuid},
    convert::{FromSexpr, Parser, ToSexpr, ToSexprWithName},
    simple_to_from_string, AutowireError,
};

use super::DocumentStyle;

fn find_uuid(parser: &Parser) -> Result<Option<Uuid>, AutowireError> {
    parser
        .find_text("uuid")?
        .map(|text| text.parse::<Uuid>())
        .transpose()
}

fn uuid_sexpr(uuid: &Option<Uuid>, style: &DocumentStyle) -> Option<Sexpr> {
    uuid.as_ref().map(|uuid| uuid.to_sexpr(style))
}

/// `(effects (font (size 1.27 1.27)) ...)`, the default text style.
fn default_effects(extra: Option<Sexpr>) -> Sexpr {
    Sexpr::list_with_name(
        "effects",
        [
            Some(Sexpr::list_with_name(
                "font",
                [Some(Sexpr::list_with_name(
                    "size",
                    [Some(Sexpr::number(1.27)), Some(Sexpr::number(1.27))],
                ))],
            )),
            extra,
        ],
    )
}

/// A straight wire segment between two points.
#[derive(Debug, PartialEq, Clone)]
pub struct Wire {
    pub start: Point,
    pub end: Point,
    pub uuid: Option<Uuid>,
}

impl FromSexpr for Wire {
    fn from_sexpr(mut parser: Parser) -> Result<Self, AutowireError> {
        parser.expect_symbol_matching("wire")?;

        let mut points = parser.find("pts").ok_or(AutowireError::MissingField("pts"))?;
        points.expect_symbol_matching("pts")?;

        let start = points.expect::<Point>()?;
        let end = points.expect::<Point>()?;

        let uuid = find_uuid(&parser)?;

        Ok(Self { start, end, uuid })
    }
}

impl ToSexpr for Wire {
    fn to_sexpr(&self, style: &DocumentStyle) -> Sexpr {
        Sexpr::list_with_name(
            "wire",
            [
                Some(Sexpr::list_with_name(
                    "pts",
                    [
                        Some(self.start.to_sexpr_with_name("xy")),
                        Some(self.end.to_sexpr_with_name("xy")),
                    ],
                )),
                Some(Sexpr::list_with_name(
                    "stroke",
                    [
                        Some(Sexpr::number_with_name("width", 0.0)),
                        Some(Sexpr::symbol_with_name("type", "default")),
                    ],
                )),
                uuid_sexpr(&self.uuid, style),
            ],
        )
    }
}

/// A dot joining crossing or touching wires.
#[derive(Debug, PartialEq, Clone)]
pub struct Junction {
    pub position: Point,
    pub uuid: Option<Uuid>,
}

impl FromSexpr for Junction {
    fn from_sexpr(mut parser: Parser) -> Result<Self, AutowireError> {
        parser.expect_symbol_matching("junction")?;

        let position = parser.expect_parsed::<Point>("at")?;
        let uuid = find_uuid(&parser)?;

        Ok(Self { position, uuid })
    }
}

impl ToSexpr for Junction {
    fn to_sexpr(&self, style: &DocumentStyle) -> Sexpr {
        Sexpr::list_with_name(
            "junction",
            [
                Some(self.position.to_sexpr_with_name("at")),
                Some(Sexpr::number_with_name("diameter", 0.0)),
                Some(Sexpr::list_with_name(
                    "color",
                    [0.0, 0.0, 0.0, 0.0].map(|c| Some(Sexpr::number(c))),
                )),
                uuid_sexpr(&self.uuid, style),
            ],
        )
    }
}

/// Marks a pin as intentionally unconnected.
#[derive(Debug, PartialEq, Clone)]
pub struct NoConnect {
    pub position: Point,
    pub uuid: Option<Uuid>,
}

impl FromSexpr for NoConnect {
    fn from_sexpr(mut parser: Parser) -> Result<Self, AutowireError> {
        parser.expect_symbol_matching("no_connect")?;

        let position = parser.expect_parsed::<Point>("at")?;
        let uuid = find_uuid(&parser)?;

        Ok(Self { position, uuid })
    }
}

impl ToSexpr for NoConnect {
    fn to_sexpr(&self, style: &DocumentStyle) -> Sexpr {
        Sexpr::list_with_name(
            "no_connect",
            [
                Some(self.position.to_sexpr_with_name("at")),
                uuid_sexpr(&self.uuid, style),
            ],
        )
    }
}

/// A local net label. Only ever read, never synthesized.
#[derive(Debug, PartialEq, Clone)]
pub struct Label {
    pub name: String,
    pub placement: Placement,
    pub uuid: Option<Uuid>,
}

impl FromSexpr for Label {
    fn from_sexpr(mut parser: Parser) -> Result<Self, AutowireError> {
        parser.expect_symbol_matching("label")?;

        let name = parser.expect_string()?;
        let placement = parser.expect_parsed::<Placement>("at")?;
        let uuid = find_uuid(&parser)?;

        Ok(Self {
            name,
            placement,
            uuid,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LabelShape {
    #[default]
    Input,
    Output,
    Bidirectional,
    TriState,
    Passive,
}

simple_to_from_string! {
    LabelShape,
    input <-> Input,
    output <-> Output,
    bidirectional <-> Bidirectional,
    tri_state <-> TriState,
    passive <-> Passive,
}

/// A label connecting every item carrying the same name, across all sheets.
#[derive(Debug, PartialEq, Clone)]
pub struct GlobalLabel {
    pub name: String,
    pub shape: LabelShape,
    pub placement: Placement,
    pub uuid: Option<Uuid>,
}

impl FromSexpr for GlobalLabel {
    fn from_sexpr(mut parser: Parser) -> Result<Self, AutowireError> {
        parser.expect_symbol_matching("global_label")?;

        let name = parser.expect_string()?;
        let shape = parser
            .find_text("shape")?
            .map(|s| s.parse::<LabelShape>())
            .transpose()?
            .unwrap_or_default();
        let placement = parser.expect_parsed::<Placement>("at")?;
        let uuid = find_uuid(&parser)?;

        Ok(Self {
            name,
            shape,
            placement,
            uuid,
        })
    }
}

impl ToSexpr for GlobalLabel {
    fn to_sexpr(&self, style: &DocumentStyle) -> Sexpr {
        let fields_autoplaced = if style.is_kicad7() {
            Sexpr::list_with_name("fields_autoplaced", [])
        } else {
            Sexpr::bool_with_name("fields_autoplaced", true)
        };

        let hide = if style.is_kicad7() {
            Sexpr::symbol("hide")
        } else {
            Sexpr::bool_with_name("hide", true)
        };

        Sexpr::list_with_name(
            "global_label",
            [
                Some(Sexpr::string(&self.name)),
                Some(Sexpr::symbol_with_name("shape", self.shape)),
                Some(self.placement.to_sexpr(style)),
                Some(fields_autoplaced),
                Some(default_effects(Some(Sexpr::symbol_with_name(
                    "justify", "left",
                )))),
                uuid_sexpr(&self.uuid, style),
                Some(Sexpr::list_with_name(
                    "property",
                    [
                        Some(Sexpr::string("Intersheetrefs")),
                        Some(Sexpr::string("${INTERSHEET_REFS}")),
                        Some(self.placement.to_sexpr(style)),
                        Some(default_effects(Some(hide))),
                    ],
                )),
            ],
        )
    }
}

/// Library holding the power port symbols.
pub const POWER_LIBRARY: &str = "power";

/// A power port such as `power:GND`, joining its pin to the global net
/// named after the symbol. Only ever synthesized; placed power ports are
/// read as [`super::ComponentInstance`]s.
#[derive(Debug, PartialEq, Clone)]
pub struct PowerSymbol {
    /// Entry name in the power library, which is also the net name
    pub net: String,
    /// e.g. `#PWR01`
    pub reference: String,
    /// Symbol origin, chosen so that its pin lands on the net anchor
    pub position: Point,
    pub uuid: Option<Uuid>,
    pub pin_uuid: Option<Uuid>,
}

impl PowerSymbol {
    fn property(name: &str, value: &str, at: Point, hidden: bool, style: &DocumentStyle) -> Sexpr {
        let hide = match (hidden, style.is_kicad7()) {
            (false, _) => None,
            (true, true) => Some(Sexpr::symbol("hide")),
            (true, false) => Some(Sexpr::bool_with_name("hide", true)),
        };

        Sexpr::list_with_name(
            "property",
            [
                Some(Sexpr::string(name)),
                Some(Sexpr::string(value)),
                Some(
                    Placement {
                        position: at,
                        rotation: Default::default(),
                    }
                    .to_sexpr(style),
                ),
                Some(default_effects(hide)),
            ],
        )
    }
}

impl ToSexpr for PowerSymbol {
    fn to_sexpr(&self, style: &DocumentStyle) -> Sexpr {
        let Point { x, y } = self.position;

        // Ground symbols hang below their pin, supply symbols stand above it
        let reference_offset = if self.net.contains("GND") { 2.5 } else { -2.5 };
        let value_offset = if self.net.contains("GND") { 3.81 } else { -3.81 };

        let exclude_from_sim =
            (!style.is_kicad7()).then(|| Sexpr::bool_with_name("exclude_from_sim", false));

        Sexpr::list_with_name(
            "symbol",
            [
                Some(Sexpr::string_with_name(
                    "lib_id",
                    format!("{POWER_LIBRARY}:{}", self.net),
                )),
                Some(
                    Placement {
                        position: self.position,
                        rotation: Default::default(),
                    }
                    .to_sexpr(style),
                ),
                Some(Sexpr::number_with_name("unit", 1.0)),
                exclude_from_sim,
                Some(Sexpr::bool_with_name("in_bom", true)),
                Some(Sexpr::bool_with_name("on_board", true)),
                Some(Sexpr::bool_with_name("dnp", false)),
                uuid_sexpr(&self.uuid, style),
                Some(Self::property(
                    "Reference",
                    &self.reference,
                    Point::new(x, y + reference_offset),
                    true,
                    style,
                )),
                Some(Self::property(
                    "Value",
                    &self.net,
                    Point::new(x, y + value_offset),
                    false,
                    style,
                )),
                Some(Self::property("Footprint", "", self.position, true, style)),
                Some(Self::property("Datasheet", "", self.position, true, style)),
                Some(Sexpr::list_with_name(
                    "pin",
                    [Some(Sexpr::string("1")), uuid_sexpr(&self.pin_uuid, style)],
                )),
            ],
        )
    }
}

/// An item inserted into a document by the routing synthesizer.
#[derive(Debug, PartialEq, Clone)]
pub enum Element {
    Wire(Wire),
    Junction(Junction),
    GlobalLabel(GlobalLabel),
    PowerSymbol(PowerSymbol),
    NoConnect(NoConnect),
}

impl ToSexpr for Element {
    fn to_sexpr(&self, style: &DocumentStyle) -> Sexpr {
        match self {
            Self::Wire(wire) => wire.to_sexpr(style),
            Self::Junction(junction) => junction.to_sexpr(style),
            Self::GlobalLabel(label) => label.to_sexpr(style),
            Self::PowerSymbol(symbol) => symbol.to_sexpr(style),
            Self::NoConnect(no_connect) => no_connect.to_sexpr(style),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: FromSexpr>(source: &str) -> Result<T, AutowireError> {
        let sexpr = kicad_sexpr::from_str(source).unwrap();
        T::from_sexpr(Parser::new(sexpr.take_list().unwrap()))
    }

    const UUID: &str = "2349f563-989d-4999-a369-9f24d984ce74";

    #[test]
    fn read_wire() {
        let wire = parse::<Wire>(&format!(
            r#"(wire (pts (xy 95 100) (xy 95 102.54)) (stroke (width 0) (type default)) (uuid "{UUID}"))"#
        ))
        .unwrap();

        assert_eq!(wire.start, Point::new(95.0, 100.0));
        assert_eq!(wire.end, Point::new(95.0, 102.54));
        assert_eq!(wire.uuid.unwrap().to_string(), UUID);
    }

    #[test]
    fn read_wire_without_points() {
        assert!(matches!(
            parse::<Wire>("(wire (stroke (width 0)))"),
            Err(AutowireError::MissingField("pts"))
        ));
    }

    #[test]
    fn read_global_label() {
        let label = parse::<GlobalLabel>(&format!(
            r#"(global_label "CAN_H" (shape bidirectional) (at 120 80 180) (fields_autoplaced) (uuid {UUID}))"#
        ))
        .unwrap();

        assert_eq!(label.name, "CAN_H");
        assert_eq!(label.shape, LabelShape::Bidirectional);
        assert_eq!(label.placement.position, Point::new(120.0, 80.0));
        assert_eq!(label.placement.rotation, crate::common::Rotation::Deg180);
    }

    #[test]
    fn read_label_and_markers() {
        let label = parse::<Label>(r#"(label "SDA" (at 10 20 0))"#).unwrap();
        assert_eq!(label.name, "SDA");
        assert_eq!(label.uuid, None);

        let junction = parse::<Junction>("(junction (at 1 2) (diameter 0) (color 0 0 0 0))").unwrap();
        assert_eq!(junction.position, Point::new(1.0, 2.0));

        let no_connect = parse::<NoConnect>(&format!("(no_connect (at 3 4) (uuid {UUID}))")).unwrap();
        assert_eq!(no_connect.position, Point::new(3.0, 4.0));
    }

    #[test]
    fn write_no_connect() {
        let no_connect = NoConnect {
            position: Point::new(110.49, 97.79),
            uuid: Some(UUID.parse().unwrap()),
        };

        assert_eq!(
            kicad_sexpr::to_string(&no_connect.to_sexpr(&DocumentStyle::default())),
            format!("(no_connect\n\t(at 110.49 97.79)\n\t(uuid \"{UUID}\")\n)")
        );
        assert_eq!(
            kicad_sexpr::to_string(&no_connect.to_sexpr(&DocumentStyle::kicad7())),
            format!("(no_connect\n\t(at 110.49 97.79)\n\t(uuid {UUID})\n)")
        );
    }

    #[test]
    fn written_elements_read_back() {
        let style = DocumentStyle::default();

        let wire = Wire {
            start: Point::new(95.0, 100.0),
            end: Point::new(95.0, 102.54),
            uuid: Some(UUID.parse().unwrap()),
        };
        let text = kicad_sexpr::to_string(&wire.to_sexpr(&style));
        assert_eq!(parse::<Wire>(&text).unwrap(), wire);

        let label = GlobalLabel {
            name: "VCC".to_string(),
            shape: LabelShape::Input,
            placement: Placement {
                position: Point::new(95.0, 100.0),
                rotation: Default::default(),
            },
            uuid: Some(UUID.parse().unwrap()),
        };
        let text = kicad_sexpr::to_string(&label.to_sexpr(&style));
        assert!(text.contains("(property \"Intersheetrefs\" \"${INTERSHEET_REFS}\""));
        assert!(text.contains("(hide yes)"));
        assert_eq!(parse::<GlobalLabel>(&text).unwrap(), label);
    }

    #[test]
    fn written_power_symbol_reads_back_as_a_power_port() {
        let symbol = PowerSymbol {
            net: "GND".to_string(),
            reference: "#PWR01".to_string(),
            position: Point::new(95.0, 100.0),
            uuid: Some(UUID.parse().unwrap()),
            pin_uuid: Some(UUID.parse().unwrap()),
        };

        let text = kicad_sexpr::to_string(&symbol.to_sexpr(&DocumentStyle::default()));
        assert!(text.contains("(lib_id \"power:GND\")"));
        assert!(text.contains("(exclude_from_sim no)"));
        assert!(text.contains("(property \"Value\" \"GND\""));

        let component = parse::<super::super::ComponentInstance>(&text).unwrap();
        assert_eq!(component.reference.as_deref(), Some("#PWR01"));
        assert_eq!(component.library_id.to_string(), "power:GND");
        assert_eq!(component.position, Point::new(95.0, 100.0));
        assert_eq!(component.pins, vec!["1".to_string()]);
        assert!(component.is_virtual());

        let text = kicad_sexpr::to_string(&symbol.to_sexpr(&DocumentStyle::kicad7()));
        assert!(!text.contains("exclude_from_sim"));
        assert!(!text.contains("(hide yes)"));
    }
}
