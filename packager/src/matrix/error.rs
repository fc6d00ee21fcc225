//! Error types for target matrix and platform list validation.
//!
//! Each variant names the rejected value and the constraint it broke.

use thiserror::Error;

/// Errors arising from an invalid build matrix or platform list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// A target triple or cross-compiler target is syntactically invalid.
    #[error("invalid target \"{value}\": {reason}")]
    InvalidTarget {
        /// The rejected identifier.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A triple and its cross-compiler target describe different platforms.
    #[error("target {triple} does not match cross-compiler target {zig_target}: {reason}")]
    MisalignedTarget {
        /// The Rust target triple.
        triple: String,
        /// The paired cross-compiler target.
        zig_target: String,
        /// Which component disagrees.
        reason: String,
    },

    /// The same identifier appears twice.
    #[error("duplicate {kind} \"{value}\"")]
    Duplicate {
        /// What kind of identifier was repeated.
        kind: &'static str,
        /// The repeated value.
        value: String,
    },

    /// A matrix or platform list has no entries.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// A platform field is empty or unsafe to use as a path segment.
    #[error("invalid platform field {field} \"{value}\": {reason}")]
    InvalidPlatform {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A requested target is not part of the matrix.
    #[error("unknown target \"{value}\"; expected one of: {expected}")]
    UnknownTarget {
        /// The requested triple.
        value: String,
        /// Comma-separated list of configured triples.
        expected: String,
    },
}

/// Result type alias using [`MatrixError`].
pub type Result<T> = std::result::Result<T, MatrixError>;
