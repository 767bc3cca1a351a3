//! The net connectivity model: which pins belong to which net, where they
//! are, and which pins of the modeled components are left unconnected.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
};

use log::debug;
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer,
};

use crate::{
    common::Point,
    document::ComponentInstance,
    geometry::{pin_inventory, resolve_pin_position},
    library::LibraryPinTable,
    AutowireError, Diagnostic,
};

/// One `reference.pin -> net` line of a [`PinMap`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PinAssignment {
    pub reference: String,
    pub pin_number: String,
    pub net: String,
}

/// The declarative `{reference: {pin: net}}` table, in declaration order.
///
/// Entries are kept exactly as declared, repeated ones included, so that
/// [`build_nets`] can tell a harmless repetition from a contradiction.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct PinMap {
    assignments: Vec<PinAssignment>,
}

impl PinMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        reference: impl Into<String>,
        pin_number: impl Into<String>,
        net: impl Into<String>,
    ) {
        self.assignments.push(PinAssignment {
            reference: reference.into(),
            pin_number: pin_number.into(),
            net: net.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &PinAssignment> {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Every reference named by the map, once, in order of first appearance.
    pub fn references(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();

        self.assignments
            .iter()
            .map(|a| a.reference.as_str())
            .filter(|reference| seen.insert(*reference))
            .collect()
    }
}

impl<R, P, N> FromIterator<(R, P, N)> for PinMap
where
    R: Into<String>,
    P: Into<String>,
    N: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (R, P, N)>>(iter: T) -> Self {
        let mut map = Self::new();

        for (reference, pin_number, net) in iter {
            map.push(reference, pin_number, net);
        }

        map
    }
}

/// The `{pin: net}` table of one component, in declaration order.
struct ComponentPins(Vec<(String, String)>);

impl<'de> Deserialize<'de> for ComponentPins {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ComponentPinsVisitor;

        impl<'de> Visitor<'de> for ComponentPinsVisitor {
            type Value = ComponentPins;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of pin numbers to net names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut pins = Vec::new();

                while let Some(entry) = access.next_entry::<String, String>()? {
                    pins.push(entry);
                }

                Ok(ComponentPins(pins))
            }
        }

        deserializer.deserialize_map(ComponentPinsVisitor)
    }
}

impl<'de> Deserialize<'de> for PinMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PinMapVisitor;

        impl<'de> Visitor<'de> for PinMapVisitor {
            type Value = PinMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of component references to pin tables")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = PinMap::new();

                while let Some((reference, pins)) = access.next_entry::<String, ComponentPins>()? {
                    for (pin_number, net) in pins.0 {
                        map.push(reference.clone(), pin_number, net);
                    }
                }

                Ok(map)
            }
        }

        deserializer.deserialize_map(PinMapVisitor)
    }
}

/// What to do with a declared pin the library table knows nothing about.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Skip the pin and report it as a diagnostic
    #[default]
    Lenient,
    /// Abort with [`AutowireError::UnknownLibraryPin`]
    Strict,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct NetOptions {
    pub strictness: Strictness,
}

/// A pin taking part in a net, at its absolute position on the sheet.
#[derive(Debug, PartialEq, Clone)]
pub struct Endpoint {
    pub reference: String,
    pub pin_number: String,
    pub position: Point,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.reference, self.pin_number)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Net {
    pub name: String,
    /// In declaration order. The first one anchors the net label.
    pub endpoints: Vec<Endpoint>,
}

/// A pin of a modeled component that no net claims.
#[derive(Debug, PartialEq, Clone)]
pub struct UnassignedPin {
    pub reference: String,
    pub pin_number: String,
    pub position: Point,
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct NetModel {
    pub nets: BTreeMap<String, Net>,
    pub unassigned_pins: Vec<UnassignedPin>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolves every declared assignment into a net endpoint and collects the
/// pins left unassigned on the components the map mentions.
///
/// Components with no reference, virtual components and components the map
/// does not mention are never touched.
pub fn build_nets<'a>(
    map: &PinMap,
    components: impl IntoIterator<Item = &'a ComponentInstance>,
    library: &LibraryPinTable,
    options: &NetOptions,
) -> Result<NetModel, AutowireError> {
    // Multi-unit parts place one instance per unit under the same reference
    let mut instances = BTreeMap::<&str, Vec<&ComponentInstance>>::new();

    for component in components {
        if component.is_virtual() {
            continue;
        }

        if let Some(reference) = component.reference.as_deref() {
            instances.entry(reference).or_default().push(component);
        }
    }

    let mut model = NetModel::default();
    let mut assigned = HashMap::<(&str, &str), &str>::new();
    let mut unknown = BTreeSet::<&str>::new();

    for assignment in map.iter() {
        let key = (assignment.reference.as_str(), assignment.pin_number.as_str());

        match assigned.get(&key) {
            Some(&net) if net == assignment.net => {
                Diagnostic::RepeatedAssignment {
                    reference: assignment.reference.clone(),
                    pin_number: assignment.pin_number.clone(),
                    net: assignment.net.clone(),
                }
                .record(&mut model.diagnostics);

                continue;
            }
            Some(&net) => {
                return Err(AutowireError::DuplicatePinAssignment {
                    reference: assignment.reference.clone(),
                    pin_number: assignment.pin_number.clone(),
                    first_net: net.to_string(),
                    second_net: assignment.net.clone(),
                });
            }
            None => {
                assigned.insert(key, &assignment.net);
            }
        }

        let Some(candidates) = instances.get(assignment.reference.as_str()) else {
            if unknown.insert(&assignment.reference) {
                Diagnostic::UnknownComponentReference {
                    reference: assignment.reference.clone(),
                }
                .record(&mut model.diagnostics);
            }

            continue;
        };

        let Some(component) = instance_with_pin(candidates, &assignment.pin_number, library)
        else {
            continue;
        };

        let Some(position) = resolve(
            component,
            &assignment.reference,
            &assignment.pin_number,
            library,
            options,
            &mut model.diagnostics,
        )?
        else {
            continue;
        };

        model
            .nets
            .entry(assignment.net.clone())
            .or_insert_with(|| Net {
                name: assignment.net.clone(),
                endpoints: Vec::new(),
            })
            .endpoints
            .push(Endpoint {
                reference: assignment.reference.clone(),
                pin_number: assignment.pin_number.clone(),
                position,
            });
    }

    for reference in map.references() {
        let Some(candidates) = instances.get(reference) else {
            continue;
        };

        let mut seen = BTreeSet::new();

        for component in candidates {
            for pin_number in pin_inventory(component, library) {
                if assigned.contains_key(&(reference, pin_number.as_str()))
                    || !seen.insert(pin_number.clone())
                {
                    continue;
                }

                let Some(position) = resolve(
                    component,
                    reference,
                    &pin_number,
                    library,
                    options,
                    &mut model.diagnostics,
                )?
                else {
                    continue;
                };

                model.unassigned_pins.push(UnassignedPin {
                    reference: reference.to_string(),
                    pin_number,
                    position,
                });
            }
        }
    }

    check_coincident_endpoints(&model.nets)?;

    for net in model.nets.values() {
        debug!("net `{}`: {} endpoints", net.name, net.endpoints.len());
    }

    debug!("{} unassigned pins", model.unassigned_pins.len());

    Ok(model)
}

/// Picks the instance (unit) of a multi-unit part that carries the pin.
fn instance_with_pin<'a>(
    candidates: &[&'a ComponentInstance],
    pin_number: &str,
    library: &LibraryPinTable,
) -> Option<&'a ComponentInstance> {
    candidates
        .iter()
        .copied()
        .find(|component| {
            pin_inventory(component, library)
                .iter()
                .any(|pin| pin == pin_number)
        })
        .or_else(|| candidates.first().copied())
}

/// Resolves a pin, turning an unknown library pin into a diagnostic unless
/// running strictly.
fn resolve(
    component: &ComponentInstance,
    reference: &str,
    pin_number: &str,
    library: &LibraryPinTable,
    options: &NetOptions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Option<Point>, AutowireError> {
    match resolve_pin_position(component, pin_number, library) {
        Ok(position) => Ok(Some(position)),
        Err(AutowireError::UnknownLibraryPin { library_id, .. })
            if options.strictness == Strictness::Lenient =>
        {
            Diagnostic::UnresolvedPin {
                reference: reference.to_string(),
                pin_number: pin_number.to_string(),
                library_id,
            }
            .record(diagnostics);

            Ok(None)
        }
        Err(error) => Err(error),
    }
}

/// Two nets meeting at the same pin position would be shorted together by
/// the first wire touching that point.
fn check_coincident_endpoints(nets: &BTreeMap<String, Net>) -> Result<(), AutowireError> {
    let mut occupied = HashMap::<(i64, i64), (&str, &Endpoint)>::new();

    for net in nets.values() {
        for endpoint in &net.endpoints {
            match occupied.get(&endpoint.position.grid_key()) {
                Some(&(other_net, other)) if other_net != net.name => {
                    return Err(AutowireError::CoincidentNetEndpoints {
                        first: format!("{other} ({other_net})"),
                        second: format!("{endpoint} ({})", net.name),
                        position: endpoint.position,
                    });
                }
                Some(_) => {}
                None => {
                    occupied.insert(endpoint.position.grid_key(), (net.name.as_str(), endpoint));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::{symbol::LibraryId, Rotation},
        document::LibraryPin,
    };

    fn pin(number: &str, x: f64, y: f64, unit: u16) -> LibraryPin {
        LibraryPin {
            number: number.to_string(),
            offset: Point::new(x, y),
            unit,
        }
    }

    fn library() -> LibraryPinTable {
        let mut table = LibraryPinTable::new();

        table.insert(
            "Device:R".parse().unwrap(),
            vec![pin("1", -5.0, 0.0, 0), pin("2", 5.0, 0.0, 0)],
        );
        table.insert(
            "Test:U".parse().unwrap(),
            vec![
                pin("1", -7.5, 0.0, 0),
                pin("2", 7.5, 2.5, 0),
                pin("3", 7.5, -2.5, 0),
            ],
        );
        table.insert(
            "Test:Dual".parse().unwrap(),
            vec![pin("8", 0.0, -5.0, 0), pin("1", 5.0, 0.0, 1), pin("7", 5.0, 0.0, 2)],
        );

        table
    }

    fn component(reference: &str, library_id: &str, x: f64, y: f64) -> ComponentInstance {
        ComponentInstance {
            reference: Some(reference.to_string()),
            library_id: library_id.parse::<LibraryId>().unwrap(),
            position: Point::new(x, y),
            rotation: Rotation::Deg0,
            mirror: None,
            unit: 1,
            pins: Vec::new(),
            uuid: None,
        }
    }

    #[test]
    fn resistor_between_two_nets() {
        let components = [component("R1", "Device:R", 100.0, 100.0)];
        let map = PinMap::from_iter([("R1", "1", "GND"), ("R1", "2", "VCC")]);

        let model = build_nets(&map, &components, &library(), &NetOptions::default()).unwrap();

        assert_eq!(model.nets.len(), 2);
        assert_eq!(model.nets["GND"].endpoints[0].position, Point::new(95.0, 100.0));
        assert_eq!(model.nets["VCC"].endpoints[0].position, Point::new(105.0, 100.0));
        assert!(model.unassigned_pins.is_empty());
        assert!(model.diagnostics.is_empty());
    }

    #[test]
    fn undeclared_pins_are_unassigned() {
        let components = [
            component("U1", "Test:U", 50.0, 50.0),
            component("R9", "Device:R", 0.0, 0.0),
        ];
        let map = PinMap::from_iter([("U1", "1", "SIG")]);

        let model = build_nets(&map, &components, &library(), &NetOptions::default()).unwrap();

        let unassigned = model
            .unassigned_pins
            .iter()
            .map(|p| (p.reference.as_str(), p.pin_number.as_str(), p.position))
            .collect::<Vec<_>>();

        assert_eq!(
            unassigned,
            vec![
                ("U1", "2", Point::new(57.5, 52.5)),
                ("U1", "3", Point::new(57.5, 47.5)),
            ]
        );
    }

    #[test]
    fn contradicting_assignments_are_fatal() {
        let components = [component("R1", "Device:R", 0.0, 0.0)];
        let map = PinMap::from_iter([("R1", "1", "GND"), ("R1", "1", "VCC")]);

        assert!(matches!(
            build_nets(&map, &components, &library(), &NetOptions::default()),
            Err(AutowireError::DuplicatePinAssignment { first_net, second_net, .. })
                if first_net == "GND" && second_net == "VCC"
        ));
    }

    #[test]
    fn repeated_assignments_are_tolerated() {
        let components = [component("R1", "Device:R", 0.0, 0.0)];
        let map = PinMap::from_iter([("R1", "1", "GND"), ("R1", "2", "VCC"), ("R1", "1", "GND")]);

        let model = build_nets(&map, &components, &library(), &NetOptions::default()).unwrap();

        assert_eq!(model.nets["GND"].endpoints.len(), 1);
        assert!(matches!(
            model.diagnostics.as_slice(),
            [Diagnostic::RepeatedAssignment { .. }]
        ));
    }

    #[test]
    fn unknown_references_are_skipped() {
        let components = [component("R1", "Device:R", 0.0, 0.0)];
        let map = PinMap::from_iter([("R2", "1", "GND"), ("R2", "2", "GND"), ("R1", "1", "GND")]);

        let model = build_nets(&map, &components, &library(), &NetOptions::default()).unwrap();

        assert_eq!(model.nets["GND"].endpoints.len(), 1);
        assert_eq!(
            model.diagnostics,
            vec![Diagnostic::UnknownComponentReference {
                reference: "R2".to_string()
            }]
        );
    }

    #[test]
    fn unknown_pins_depend_on_strictness() {
        let components = [component("R1", "Device:R", 0.0, 0.0)];
        let map = PinMap::from_iter([("R1", "1", "GND"), ("R1", "3", "GND")]);

        let model = build_nets(&map, &components, &library(), &NetOptions::default()).unwrap();
        assert_eq!(model.nets["GND"].endpoints.len(), 1);
        assert!(matches!(
            &model.diagnostics[..],
            [Diagnostic::UnresolvedPin { pin_number, .. }] if pin_number == "3"
        ));

        let strict = NetOptions {
            strictness: Strictness::Strict,
        };

        assert!(matches!(
            build_nets(&map, &components, &library(), &strict),
            Err(AutowireError::UnknownLibraryPin { .. })
        ));
    }

    #[test]
    fn coincident_endpoints_of_different_nets() {
        let components = [
            component("R1", "Device:R", 100.0, 100.0),
            component("R2", "Device:R", 110.0, 100.0),
        ];
        let map = PinMap::from_iter([("R1", "2", "CANH"), ("R2", "1", "GND")]);

        assert!(matches!(
            build_nets(&map, &components, &library(), &NetOptions::default()),
            Err(AutowireError::CoincidentNetEndpoints { position, .. })
                if position == Point::new(105.0, 100.0)
        ));
    }

    #[test]
    fn multi_unit_parts_use_the_unit_with_the_pin() {
        let mut unit_a = component("U2", "Test:Dual", 0.0, 0.0);
        let mut unit_b = component("U2", "Test:Dual", 0.0, 20.0);
        unit_a.unit = 1;
        unit_b.unit = 2;

        let map = PinMap::from_iter([("U2", "7", "OUT_B"), ("U2", "1", "OUT_A")]);

        let model =
            build_nets(&map, [&unit_a, &unit_b], &library(), &NetOptions::default()).unwrap();

        assert_eq!(model.nets["OUT_B"].endpoints[0].position, Point::new(5.0, 20.0));
        assert_eq!(model.nets["OUT_A"].endpoints[0].position, Point::new(5.0, 0.0));

        // The shared supply pin is reported once, not once per unit
        assert_eq!(model.unassigned_pins.len(), 1);
        assert_eq!(model.unassigned_pins[0].pin_number, "8");
    }

    #[test]
    fn virtual_components_are_ignored() {
        let components = [component("#PWR01", "Device:R", 0.0, 0.0)];
        let map = PinMap::from_iter([("#PWR01", "1", "GND")]);

        let model = build_nets(&map, &components, &library(), &NetOptions::default()).unwrap();

        assert!(model.nets.is_empty());
        assert_eq!(model.diagnostics.len(), 1);
    }

    #[test]
    fn pin_map_keeps_declaration_order() {
        let map: PinMap = serde_json::from_str(
            r#"{ "U1": { "3": "SDA", "1": "SCL" }, "R1": { "2": "SDA" }, "U1": { "1": "GND" } }"#,
        )
        .unwrap();

        let entries = map
            .iter()
            .map(|a| format!("{}.{}={}", a.reference, a.pin_number, a.net))
            .collect::<Vec<_>>();

        assert_eq!(entries, vec!["U1.3=SDA", "U1.1=SCL", "R1.2=SDA", "U1.1=GND"]);
        assert_eq!(map.references(), vec!["U1", "R1"]);
    }
}
