//! Pin offsets of library symbols, keyed by library identifier.

use std::collections::BTreeMap;

use log::debug;

use crate::{
    common::symbol::LibraryId,
    document::{Document, LibraryPin, LibrarySymbol},
};

/// Where the pins of each library symbol sit relative to the symbol origin.
///
/// Built from the definitions embedded in a schematic's `lib_symbols`, from
/// configuration, or both. Read-only once built.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LibraryPinTable {
    symbols: BTreeMap<LibraryId, Vec<LibraryPin>>,
}

impl LibraryPinTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the pins of every library symbol embedded in the document.
    pub fn from_document(document: &Document) -> Self {
        let mut table = Self::new();

        for LibrarySymbol { id, pins } in document.library_symbols() {
            table.insert(id.clone(), pins.clone());
        }

        debug!("{} library symbols found in the document", table.len());

        table
    }

    /// Sets the pins of a symbol, replacing any previous entry.
    pub fn insert(&mut self, id: LibraryId, pins: Vec<LibraryPin>) {
        self.symbols.insert(id, pins);
    }

    /// Merges `other` into this table. Entries of `other` replace entries of
    /// the same symbol.
    pub fn merge(&mut self, other: LibraryPinTable) {
        for (id, pins) in other.symbols {
            if self.symbols.contains_key(&id) {
                debug!("configured pins replace the pins of `{id}`");
            }

            self.symbols.insert(id, pins);
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns every pin of a symbol. An identifier with a library nickname
    /// falls back to an entry registered without one.
    pub fn pins(&self, id: &LibraryId) -> Option<&[LibraryPin]> {
        self.symbols
            .get(id)
            .or_else(|| {
                id.library_nickname
                    .as_ref()
                    .and_then(|_| self.symbols.get(&id.without_nickname()))
            })
            .map(Vec::as_slice)
    }

    /// Returns the pins drawn by one unit of a symbol, which includes the
    /// pins shared by all units.
    pub fn unit_pins<'a>(
        &'a self,
        id: &LibraryId,
        unit: u16,
    ) -> impl Iterator<Item = &'a LibraryPin> + 'a {
        self.pins(id)
            .unwrap_or_default()
            .iter()
            .filter(move |pin| pin.unit == 0 || pin.unit == unit)
    }

    /// Looks up one pin of one unit.
    pub fn pin(&self, id: &LibraryId, unit: u16, number: &str) -> Option<&LibraryPin> {
        self.unit_pins(id, unit).find(|pin| pin.number == number)
    }
}
