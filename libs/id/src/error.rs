//! Error types for identifier parsing.

use thiserror::Error;

/// Errors that can occur when parsing or converting daemon identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The identifier string is empty.
    #[error("identifier cannot be empty")]
    Empty,

    /// A letter-form identifier contains a character outside `a`..`z`.
    #[error("invalid char '{ch}' in identifier '{name}'")]
    InvalidChar { ch: char, name: String },

    /// A legacy identifier has a missing or non-numeric suffix.
    #[error("invalid legacy identifier '{0}': expected 'mon' followed by digits")]
    InvalidLegacySuffix(String),

    /// A full resource name does not carry the expected app prefix.
    #[error("missing expected prefix '{expected}' in '{actual}'")]
    MissingPrefix { expected: String, actual: String },

    /// The identifier encodes an index that does not fit in `usize`.
    #[error("identifier '{0}' is out of range")]
    Overflow(String),
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    /// Returns true if this error came from the legacy `mon<N>` grammar.
    pub fn is_legacy_error(&self) -> bool {
        matches!(self, IdError::InvalidLegacySuffix(_))
    }
}
