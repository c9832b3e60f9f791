//! Slide parts and the shapes that carry text.
//!
//! Text lives in three places on a slide: the `txBody` of ordinary shapes,
//! the cells of tables inside graphic frames, and either of those nested in
//! group shapes. [`text_bodies_mut`] flattens that structure so the engines
//! only deal with `txBody` → paragraphs → runs.

use crate::xml::{XmlDocument, XmlElement, DRAWINGML_NS, PRESENTATIONML_NS};
use restyle_core::Result;
use std::path::{Path, PathBuf};

/// A loaded `ppt/slides/slideN.xml` part.
#[derive(Debug)]
pub struct SlidePart {
    path: PathBuf,
    document: XmlDocument,
}

impl SlidePart {
    /// Load and parse the slide at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            document: XmlDocument::load(path)?,
        })
    }

    pub fn from_document(path: impl Into<PathBuf>, document: XmlDocument) -> Self {
        Self {
            path: path.into(),
            document,
        }
    }

    /// Write the slide back to where it was loaded from.
    pub fn save(&self) -> Result<()> {
        self.document.save(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name, e.g. `slide3.xml`.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut XmlDocument {
        &mut self.document
    }

    /// The slide's shape tree (`p:cSld/p:spTree`).
    pub fn shape_tree_mut(&mut self) -> Option<&mut XmlElement> {
        self.document
            .root_mut()
            .find_path_mut(&[(PRESENTATIONML_NS, "cSld"), (PRESENTATIONML_NS, "spTree")])
    }
}

/// What a shape-tree child holds, as far as text is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// `p:sp` with a text frame.
    TextShape,
    /// `p:graphicFrame` holding a table.
    Table,
    /// `p:grpSp`, whose children are shapes again.
    Group,
    /// Pictures, connectors, charts and anything else without text.
    Other,
}

impl ShapeKind {
    pub fn of(shape: &XmlElement) -> Self {
        if shape.is(PRESENTATIONML_NS, "sp") && shape.find(PRESENTATIONML_NS, "txBody").is_some() {
            ShapeKind::TextShape
        } else if shape.is(PRESENTATIONML_NS, "graphicFrame") && table_of(shape).is_some() {
            ShapeKind::Table
        } else if shape.is(PRESENTATIONML_NS, "grpSp") {
            ShapeKind::Group
        } else {
            ShapeKind::Other
        }
    }
}

/// Shape name from its non-visual properties, for log messages.
pub fn shape_label(shape: &XmlElement) -> String {
    shape
        .elements()
        .find(|e| e.local_name().starts_with("nv"))
        .and_then(|nv| nv.find(PRESENTATIONML_NS, "cNvPr"))
        .map(|c| {
            format!(
                "{} (id {})",
                c.attr("name").unwrap_or("unnamed"),
                c.attr("id").unwrap_or("?")
            )
        })
        .unwrap_or_else(|| shape.name().to_string())
}

/// Text bodies of a text shape or table, in document order.
/// Groups are not descended into; walk their children instead.
pub fn text_bodies_mut(shape: &mut XmlElement) -> Vec<&mut XmlElement> {
    match ShapeKind::of(shape) {
        ShapeKind::TextShape => shape
            .find_mut(PRESENTATIONML_NS, "txBody")
            .into_iter()
            .collect(),
        ShapeKind::Table => match table_of_mut(shape) {
            Some(table) => table
                .elements_mut()
                .filter(|row| row.is(DRAWINGML_NS, "tr"))
                .flat_map(|row| row.elements_mut().filter(|c| c.is(DRAWINGML_NS, "tc")))
                .filter_map(|cell| cell.find_mut(DRAWINGML_NS, "txBody"))
                .collect(),
            None => Vec::new(),
        },
        ShapeKind::Group | ShapeKind::Other => Vec::new(),
    }
}

const TABLE_PATH: [(&str, &str); 3] = [
    (DRAWINGML_NS, "graphic"),
    (DRAWINGML_NS, "graphicData"),
    (DRAWINGML_NS, "tbl"),
];

fn table_of(frame: &XmlElement) -> Option<&XmlElement> {
    frame.find_path(&TABLE_PATH)
}

fn table_of_mut(frame: &mut XmlElement) -> Option<&mut XmlElement> {
    frame.find_path_mut(&TABLE_PATH)
}
