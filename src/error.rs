//! Error types for VMF parsing and writing
//!
//! This module provides error handling for VMF file operations. All errors
//! include error codes for categorization and enough context to debug a
//! failing map without re-opening it in an editor.
//!
//! # Error Codes
//!
//! Error codes follow the pattern: `E<category><number>`
//!
//! Categories:
//! - **E1xxx**: I/O errors
//! - **E2xxx**: structure-text parsing errors
//! - **E3xxx**: geometry, numeric and reference errors
//! - **E4xxx**: unsupported features
//!
//! ## Common Error Codes
//!
//! - `E1001`: I/O error reading or writing the stream
//! - `E2001`: malformed structure text (unmatched brace, unterminated string)
//! - `E2002`: missing required property
//! - `E3001`: geometry error (degenerate plane set, unmatched face)
//! - `E3002`: numeric parse error
//! - `E3003`: dangling object reference
//! - `E4001`: unsupported feature

use std::io;
use thiserror::Error;

/// Result type for VMF operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when reading or writing VMF files
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred while reading or writing the stream
    ///
    /// **Error Code**: E1001
    #[error("[E1001] I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed structure text
    ///
    /// **Error Code**: E2001
    ///
    /// **Common Causes**:
    /// - Unmatched opening brace
    /// - Unterminated quoted value
    /// - A block body with no preceding name token
    ///
    /// Top-level document parsing treats this as fatal: a truncated or
    /// malformed stream never yields a partial document.
    #[error("[E2001] Parse error at line {line}: {message}")]
    Parse {
        /// Line number in the input where parsing failed (1-based)
        line: usize,
        /// Description of the syntax problem
        message: String,
    },

    /// A record is missing a property required by the format
    ///
    /// **Error Code**: E2002
    #[error("[E2002] Block '{block}' is missing required property '{property}'")]
    MissingProperty {
        /// Name of the structure block
        block: String,
        /// The absent property key
        property: String,
    },

    /// Geometry error
    ///
    /// **Error Code**: E3001
    ///
    /// **Common Causes**:
    /// - Collinear points supplied for a plane
    /// - A plane set that does not bound a convex volume
    /// - A reconstructed face that matches no source plane
    ///
    /// Solid decoding reports this per solid; document assembly recovers by
    /// dropping the offending solid and recording a warning.
    #[error("[E3001] Geometry error: {0}")]
    Geometry(String),

    /// Parse error for numeric values
    ///
    /// **Error Code**: E3002
    #[error("[E3002] Numeric parse error: {0}")]
    NumericParse(String),

    /// Dangling reference to an object that does not exist
    ///
    /// **Error Code**: E3003
    #[error("[E3003] Dangling reference: {0}")]
    Reference(String),

    /// Unsupported feature
    ///
    /// **Error Code**: E4001
    #[error("[E4001] Unsupported feature: {0}")]
    Unsupported(String),
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::NumericParse(format!("Failed to parse floating-point number: {}", err))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::NumericParse(format!("Failed to parse integer: {}", err))
    }
}

impl Error {
    /// Create a Parse error with a line number and message
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create a MissingProperty error
    pub fn missing_property(block: &str, property: &str) -> Self {
        Error::MissingProperty {
            block: block.to_string(),
            property: property.to_string(),
        }
    }

    /// Create a Geometry error with context about the offending record
    ///
    /// # Arguments
    /// * `context` - What was being decoded (e.g. "solid 12")
    /// * `message` - Description of the error
    pub fn geometry(context: &str, message: &str) -> Self {
        Error::Geometry(format!("{}: {}", context, message))
    }

    /// Create a NumericParse error describing the field and offending value
    pub fn numeric(field: &str, value: &str) -> Self {
        Error::NumericParse(format!("Failed to parse '{}' from '{}'", field, value))
    }
}
