//! Error types for PowerPoint restyling.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while transforming a presentation.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The input file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The input is not a readable ZIP container.
    #[error("Invalid or corrupted archive: {0}")]
    CorruptArchive(String),

    /// A ZIP read or write step failed after the archive was opened.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// An XML part is malformed.
    #[error("XML parsing error in {path}: {message}")]
    ParseError { path: String, message: String },

    /// Serializing an XML tree failed.
    #[error("XML writing error: {0}")]
    XmlError(String),

    /// A single run, shape or rule could not be processed.
    #[error("Rule application error: {0}")]
    RuleApplication(String),

    /// No usable font rules or gradient schemes were found.
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    /// A rule or scheme store exists but is not usable.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Writing a transformed document failed.
    #[error("Failed to save {}: {message}", .path.display())]
    SaveError { path: PathBuf, message: String },
}

impl Error {
    /// Build a parse error for the part at `path`.
    pub fn parse(path: impl Into<String>, message: impl ToString) -> Self {
        Error::ParseError {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Build a save error for the file at `path`.
    pub fn save(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::SaveError {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
