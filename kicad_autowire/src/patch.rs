//! Splicing synthesized elements into the original document text.

use std::{fmt::Display, io::Write, path::Path};

use atomicwrites::{AtomicFile, OverwriteBehavior};
use kicad_sexpr::FormatOptions;
use log::debug;
use serde::Deserialize;

use crate::{convert::ToSexpr, document::Document, document::Element, AutowireError};

/// Where new elements go.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(from = "String")]
pub enum Anchor {
    /// Before the first top-level block with this keyword
    Keyword(String),
    /// Before the first top-level block that starts with this exact text
    Marker(String),
}

impl Default for Anchor {
    fn default() -> Self {
        Self::Keyword("sheet_instances".to_string())
    }
}

/// A bare word names a block keyword, anything else is a raw text marker.
impl From<String> for Anchor {
    fn from(value: String) -> Self {
        if value.starts_with('(') || value.contains(char::is_whitespace) {
            Self::Marker(value)
        } else {
            Self::Keyword(value)
        }
    }
}

impl From<&str> for Anchor {
    fn from(value: &str) -> Self {
        value.to_string().into()
    }
}

impl Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword(keyword) => write!(f, "`({keyword}` block"),
            Self::Marker(marker) => write!(f, "`{marker}`"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PatchOptions {
    pub anchor: Anchor,
    /// Maximum number of decimal places written for coordinates
    pub precision: usize,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            anchor: Anchor::default(),
            precision: 4,
        }
    }
}

/// Byte offset to insert at, and whether the insertion starts mid-line.
fn insertion_point(source: &str, before: usize) -> (usize, bool) {
    let line_start = source[..before].rfind('\n').map_or(0, |i| i + 1);

    if source[line_start..before].trim().is_empty() {
        (line_start, false)
    } else {
        (before, true)
    }
}

/// Returns the document text with `elements` inserted before the anchor.
///
/// When the anchor can't be found the elements go right before the closing
/// parenthesis of the root list, or at the very end of a document without
/// one. Every byte of the original text is kept, so an empty `elements`
/// gives back the document unchanged.
pub fn patch(document: &Document, elements: &[Element], options: &PatchOptions) -> String {
    let source = document.source();

    if elements.is_empty() {
        return source.to_string();
    }

    let depth = usize::from(document.root().is_some());
    let style = document.style();

    let format = FormatOptions {
        indent: style.indent.clone(),
        depth,
        precision: options.precision,
    };

    let anchor = match &options.anchor {
        Anchor::Keyword(keyword) => document
            .blocks_with_keyword(keyword)
            .next()
            .map(|block| block.span.start),
        // A marker inside a nested list would make the new blocks its children
        Anchor::Marker(marker) => source
            .match_indices(marker.as_str())
            .map(|(offset, _)| offset)
            .find(|&offset| {
                document
                    .blocks()
                    .iter()
                    .any(|block| block.span.start == offset)
            }),
    };

    let indent = style.indent.repeat(depth);

    // The indentation owed to whatever follows a mid-line insertion
    let (offset, mid_line, resume) = match (anchor, document.root()) {
        (Some(offset), _) => {
            let (offset, mid_line) = insertion_point(source, offset);
            (offset, mid_line, indent.as_str())
        }
        (None, Some(root)) => {
            debug!("{} not found, inserting before the end of the root list", options.anchor);
            let (offset, mid_line) = insertion_point(source, root.closing_paren());
            (offset, mid_line, "")
        }
        (None, None) => {
            debug!("{} not found, appending to the document", options.anchor);
            (source.len(), !source.is_empty() && !source.ends_with('\n'), "")
        }
    };

    let mut inserted = String::new();

    if mid_line {
        inserted.push('\n');
    }

    for element in elements {
        inserted.push_str(&indent);
        inserted.push_str(&kicad_sexpr::to_string_with(&element.to_sexpr(style), &format));
        inserted.push('\n');
    }

    if mid_line {
        inserted.push_str(resume);
    }

    debug!(
        "inserting {} elements at line {}",
        elements.len(),
        source[..offset].matches('\n').count() + 1
    );

    let mut text = String::with_capacity(source.len() + inserted.len());
    text.push_str(&source[..offset]);
    text.push_str(&inserted);
    text.push_str(&source[offset..]);

    text
}

/// Writes `text` to `path` through a temporary file that is renamed into
/// place, so `path` is either left as it was or fully written.
pub fn write_document(path: &Path, text: &str) -> Result<(), AutowireError> {
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            f.write_all(text.as_bytes())?;
            f.flush()
        })
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => {
                AutowireError::Io(e)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Point, Uuid};
    use crate::document::{NoConnect, Wire};

    const UUID: &str = "2349f563-989d-4999-a369-9f24d984ce74";

    const SCHEMATIC: &str = "(kicad_sch (version 20231120) (generator \"eeschema\")\n\t(paper \"A4\")\n\t(sheet_instances\n\t\t(path \"/\" (page \"1\"))\n\t)\n)\n";

    fn no_connect(x: f64, y: f64) -> Element {
        Element::NoConnect(NoConnect {
            position: Point::new(x, y),
            uuid: Some(UUID.parse::<Uuid>().unwrap()),
        })
    }

    #[test]
    fn nothing_to_insert() {
        let document = Document::parse(SCHEMATIC).unwrap();

        assert_eq!(patch(&document, &[], &PatchOptions::default()), SCHEMATIC);
    }

    #[test]
    fn insert_before_keyword() {
        let document = Document::parse(SCHEMATIC).unwrap();
        let text = patch(&document, &[no_connect(10.0, 20.5)], &PatchOptions::default());

        assert_eq!(
            text,
            format!(
                "(kicad_sch (version 20231120) (generator \"eeschema\")\n\t(paper \"A4\")\n\t(no_connect\n\t\t(at 10 20.5)\n\t\t(uuid \"{UUID}\")\n\t)\n\t(sheet_instances\n\t\t(path \"/\" (page \"1\"))\n\t)\n)\n"
            )
        );
    }

    #[test]
    fn missing_anchor_falls_back_to_root_end() {
        let document = Document::parse(SCHEMATIC).unwrap();
        let options = PatchOptions {
            anchor: "bus_alias".into(),
            ..Default::default()
        };

        let text = patch(&document, &[no_connect(1.0, 2.0)], &options);

        assert!(text.ends_with(&format!("\t)\n\t(no_connect\n\t\t(at 1 2)\n\t\t(uuid \"{UUID}\")\n\t)\n)\n")));
    }

    #[test]
    fn insert_before_marker() {
        let document = Document::parse(SCHEMATIC).unwrap();
        let options = PatchOptions {
            anchor: "(paper \"A4\")".into(),
            precision: 2,
        };

        let wire = Element::Wire(Wire {
            start: Point::new(1.004, 0.0),
            end: Point::new(2.0, 0.0),
            uuid: None,
        });

        let text = patch(&document, &[wire], &options);
        let at = text.find("\t(wire").unwrap();

        assert!(at < text.find("(paper").unwrap());
        assert!(text.contains("(xy 1 0)"));
        assert!(text.contains("\t\t(stroke\n"));
    }

    #[test]
    fn nested_marker_falls_back_to_root_end() {
        let document = Document::parse(SCHEMATIC).unwrap();
        let options = PatchOptions {
            anchor: "(path \"/\"".into(),
            ..Default::default()
        };

        let text = patch(&document, &[no_connect(1.0, 2.0)], &options);
        let patched = Document::parse(&text).unwrap();

        assert_eq!(patched.no_connects().count(), 1);
        assert!(text.contains("\t\t(path \"/\" (page \"1\"))\n\t)\n\t(no_connect\n"));
    }

    #[test]
    fn single_line_root() {
        let document = Document::parse("(kicad_sch (version 20231120))").unwrap();

        let text = patch(&document, &[no_connect(0.0, 0.0)], &PatchOptions::default());

        assert!(text.starts_with("(kicad_sch (version 20231120)\n\t(no_connect\n"));
        assert!(text.ends_with("\t)\n)"));
        assert!(Document::parse(&text).unwrap().no_connects().count() == 1);
    }

    #[test]
    fn document_without_root() {
        let document = Document::parse("(wire (pts (xy 0 0) (xy 1 0)))").unwrap();

        let text = patch(&document, &[no_connect(5.0, 5.0)], &PatchOptions::default());

        assert_eq!(
            text,
            format!("(wire (pts (xy 0 0) (xy 1 0)))\n(no_connect\n\t(at 5 5)\n\t(uuid \"{UUID}\")\n)\n")
        );
    }

    #[test]
    fn anchor_from_config_text() {
        assert_eq!(Anchor::from("sheet_instances"), Anchor::default());
        assert_eq!(
            Anchor::from("(symbol_instances"),
            Anchor::Marker("(symbol_instances".to_string())
        );
        assert_eq!(
            Anchor::from("; wires below"),
            Anchor::Marker("; wires below".to_string())
        );
    }

    #[test]
    fn write_replaces_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.kicad_sch");

        std::fs::write(&path, "old").unwrap();
        write_document(&path, SCHEMATIC).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), SCHEMATIC);
    }
}
