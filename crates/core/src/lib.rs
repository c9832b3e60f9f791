//! Core domain types, rule and scheme stores, and language inference
//! for bulk PowerPoint restyling.

pub mod error;
pub mod lang;
pub mod status;
pub mod store;
pub mod types;
pub mod units;

pub use error::{Error, Result};
pub use lang::LanguageTag;
pub use status::{LogSink, StatusSink};
pub use types::{
    ColorSpec, FillKind, FontRule, GradientScheme, GradientStop, RuleSet, RunFontInfo,
    SchemeTable,
};
