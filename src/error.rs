//! Error types for finding aid conversion

use thiserror::Error;

use crate::record::RecordKind;

/// Everything that can abort a conversion. None of these are recoverable
/// mid-document: partial output is discarded.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The input could not be parsed as XML
    #[error("Malformed markup: {0}")]
    MalformedMarkup(#[from] roxmltree::Error),

    /// A record reached the end of the conversion without a required field
    #[error("{kind} record begun at {path} is missing required field '{field}'")]
    MissingRequiredField {
        kind: RecordKind,
        field: String,
        path: String,
    },

    /// A record was attached but no open record of the wanted kind exists
    #[error("No open {wanted} record to attach '{field}' to (at {path})")]
    NoOwner {
        wanted: String,
        field: &'static str,
        path: String,
    },

    /// A record was begun but never attached to an owner
    #[error("{kind} record begun at {path} was never attached to an owner")]
    Orphan { kind: RecordKind, path: String },

    /// A singular field already holds a link
    #[error("Field '{field}' of {kind} record is already set")]
    SlotOccupied {
        kind: RecordKind,
        field: &'static str,
    },

    /// The document never opened a resource record
    #[error("Document produced no resource record")]
    NoResource,

    /// The conversion configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for ConversionError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConversionError>;
