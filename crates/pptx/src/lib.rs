//! PPTX (Office Open XML) restyling backend.
//!
//! A .pptx is a ZIP archive of XML parts. This crate unpacks it, rewrites
//! text-run formatting in the slide parts and packs it again:
//!
//! - [`fonts`] replaces typefaces and sizes according to a [`RuleSet`](restyle_core::RuleSet).
//! - [`gradient`] gives runs of a given size and font a linear gradient fill.
//! - [`processor`] chains both passes over a file.
//! - [`inspect`] reports the fonts in use without changing anything.

pub mod archive;
pub mod fill;
pub mod fonts;
pub mod gradient;
pub mod inspect;
pub mod processor;
pub mod run;
pub mod slide;
pub mod xml;

pub use archive::ExtractedPackage;
pub use fill::Fill;
pub use fonts::{FontPassReport, FontRuleEngine};
pub use gradient::{resolve_schemes, GradientEngine, GradientPassReport, SingleScheme};
pub use inspect::inspect_fonts;
pub use processor::{Processor, TransformOptions, TransformReport, TransformState};
pub use run::{Script, TextRun};
pub use xml::{XmlDocument, XmlElement};
