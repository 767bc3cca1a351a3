//! Absolute pin positions from component placement and library pin offsets.

use crate::{
    common::{Mirror, Point, Rotation},
    document::ComponentInstance,
    library::LibraryPinTable,
    AutowireError,
};

/// Applies the mirror first, then the rotation, to a pin offset.
///
/// ```text
/// x' = dx·cos(θ) − dy·sin(θ)
/// y' = dx·sin(θ) + dy·cos(θ)
/// ```
pub fn transform_offset(offset: Point, rotation: Rotation, mirror: Option<Mirror>) -> Point {
    let offset = mirror.map_or(offset, |mirror| mirror.apply(offset));
    let (sin, cos) = rotation.sin_cos();

    Point::new(
        offset.x * cos - offset.y * sin,
        offset.x * sin + offset.y * cos,
    )
}

/// Computes where a pin of a placed component ends up on the sheet.
pub fn resolve_pin_position(
    component: &ComponentInstance,
    pin_number: &str,
    library: &LibraryPinTable,
) -> Result<Point, AutowireError> {
    let pin = library
        .pin(&component.library_id, component.unit, pin_number)
        .ok_or_else(|| AutowireError::UnknownLibraryPin {
            library_id: component.library_id.to_string(),
            pin_number: pin_number.to_string(),
        })?;

    let offset = transform_offset(pin.offset, component.rotation, component.mirror);

    Ok(component.position.translate(offset.x, offset.y))
}

/// The pins a component exposes: the ones listed on the instance, or every
/// pin of its unit in the library when the instance lists none.
pub fn pin_inventory(component: &ComponentInstance, library: &LibraryPinTable) -> Vec<String> {
    if !component.pins.is_empty() {
        return component.pins.clone();
    }

    let mut pins = Vec::<String>::new();

    for pin in library.unit_pins(&component.library_id, component.unit) {
        if !pins.contains(&pin.number) {
            pins.push(pin.number.clone());
        }
    }

    pins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LibraryPin;

    fn library() -> LibraryPinTable {
        let mut table = LibraryPinTable::new();

        table.insert(
            "Test:Part".parse().unwrap(),
            vec![
                LibraryPin {
                    number: "1".to_string(),
                    offset: Point::new(5.0, 0.0),
                    unit: 0,
                },
                LibraryPin {
                    number: "2".to_string(),
                    offset: Point::new(0.0, 2.54),
                    unit: 0,
                },
            ],
        );

        table
    }

    fn placed(rotation: Rotation, mirror: Option<Mirror>) -> ComponentInstance {
        ComponentInstance {
            reference: Some("TP1".to_string()),
            library_id: "Test:Part".parse().unwrap(),
            position: Point::new(10.0, 10.0),
            rotation,
            mirror,
            unit: 1,
            pins: Vec::new(),
            uuid: None,
        }
    }

    #[test]
    fn rotations() {
        let library = library();

        let resolve = |rotation| resolve_pin_position(&placed(rotation, None), "1", &library).unwrap();

        assert_eq!(resolve(Rotation::Deg0), Point::new(15.0, 10.0));
        assert_eq!(resolve(Rotation::Deg90), Point::new(10.0, 15.0));
        assert_eq!(resolve(Rotation::Deg180), Point::new(5.0, 10.0));
        assert_eq!(resolve(Rotation::Deg270), Point::new(10.0, 5.0));
    }

    #[test]
    fn mirror_is_applied_before_rotation() {
        let library = library();

        let position = resolve_pin_position(&placed(Rotation::Deg0, Some(Mirror::X)), "2", &library);
        assert!(position.unwrap().same_as(&Point::new(10.0, 7.46)));

        let position = resolve_pin_position(&placed(Rotation::Deg90, Some(Mirror::Y)), "1", &library);
        assert_eq!(position.unwrap(), Point::new(10.0, 5.0));
    }

    #[test]
    fn unknown_pin() {
        let library = library();

        assert!(matches!(
            resolve_pin_position(&placed(Rotation::Deg0, None), "3", &library),
            Err(AutowireError::UnknownLibraryPin { library_id, pin_number })
                if library_id == "Test:Part" && pin_number == "3"
        ));
    }

    #[test]
    fn inventory_falls_back_to_library() {
        let library = library();
        let mut component = placed(Rotation::Deg0, None);

        assert_eq!(pin_inventory(&component, &library), vec!["1", "2"]);

        component.pins = vec!["2".to_string()];
        assert_eq!(pin_inventory(&component, &library), vec!["2"]);
    }
}
