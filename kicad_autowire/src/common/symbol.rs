//! Identifiers of library symbols and of their units.

use std::{fmt::Display, str::FromStr, sync::OnceLock};

use regex::Regex;

use crate::AutowireError;

/// A `Library:Entry` symbol identifier. The library nickname is optional,
/// symbols embedded with a `lib_name` override usually have none.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct LibraryId {
    pub library_nickname: Option<String>,
    pub entry_name: String,
}

impl LibraryId {
    pub fn new(library_nickname: Option<&str>, entry_name: &str) -> Self {
        Self {
            library_nickname: library_nickname.map(ToString::to_string),
            entry_name: entry_name.to_string(),
        }
    }

    /// The same entry without its library nickname.
    pub fn without_nickname(&self) -> Self {
        Self::new(None, &self.entry_name)
    }
}

fn library_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();

    PATTERN.get_or_init(|| Regex::new(r"^(?:([^:]+):)?([^:]+)$").expect("pattern is valid"))
}

impl FromStr for LibraryId {
    type Err = AutowireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(captures) = library_id_pattern().captures(s) else {
            return Err(AutowireError::InvalidLibraryIdentifier(s.to_string()));
        };

        let [_full, library_nickname, Some(entry_name)] = &captures.iter().collect::<Vec<_>>()[..]
        else {
            return Err(AutowireError::InvalidLibraryIdentifier(s.to_string()));
        };

        Ok(Self {
            library_nickname: library_nickname.map(|s| s.as_str().to_string()),
            entry_name: entry_name.as_str().to_string(),
        })
    }
}

impl Display for LibraryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(library_nickname) = &self.library_nickname {
            write!(f, "{}:{}", library_nickname, self.entry_name)
        } else {
            write!(f, "{}", self.entry_name)
        }
    }
}

/// The `NAME_UNIT_STYLE` identifier of a unit inside a library symbol.
///
/// Unit 0 holds graphics and pins shared by every unit. Style 1 is the normal
/// body style, style 2 the De Morgan alternate.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UnitId {
    pub parent: String,
    pub unit: u16,
    pub style: u8,
}

fn unit_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();

    PATTERN.get_or_init(|| Regex::new(r"^(.+)_(\d+)_(\d)$").expect("pattern is valid"))
}

impl FromStr for UnitId {
    type Err = AutowireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AutowireError::InvalidUnitIdentifier(s.to_string());

        let Some(captures) = unit_id_pattern().captures(s) else {
            return Err(invalid());
        };

        let (_, [name, unit, style]) = captures.extract();

        Ok(UnitId {
            parent: name.to_string(),
            unit: unit.parse::<u16>().map_err(|_| invalid())?,
            style: style.parse::<u8>().map_err(|_| invalid())?,
        })
    }
}

impl Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.parent, self.unit, self.style)
    }
}
