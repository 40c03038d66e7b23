//! Error types for supernode-core.
//!
//! Defines the central [`EngineError`] type and the [`EngineResult<T>`]
//! alias. The engine is deliberately hard to make fail at runtime: missing
//! node statistics and degenerate adjacency rows are handled with neutral
//! defaults inside the algorithms. The error surface is limited to
//! preconditions checked before clustering begins: an adjacency matrix
//! whose shape contradicts the declared node counts, and invalid
//! configuration values.
//!
//! # Examples
//!
//! ```rust
//! use supernode_core::EngineError;
//!
//! let err = EngineError::ShapeMismatch {
//!     rows: 4,
//!     cols: 5,
//!     expected: 4,
//! };
//! assert!(err.to_string().contains("4x5"));
//! ```

use thiserror::Error;

/// Top-level error type for supernode-core operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The adjacency matrix shape contradicts the declared node counts.
    ///
    /// This is the only fatal input condition: clustering over a malformed
    /// matrix would silently misattribute edges, so it surfaces before any
    /// propagation or growth starts.
    #[error("adjacency matrix shape mismatch: got {rows}x{cols}, expected {expected}x{expected} (features + sinks)")]
    ShapeMismatch {
        /// Number of rows in the provided matrix.
        rows: usize,
        /// Number of columns in the offending row.
        cols: usize,
        /// Declared node count (`n_features + n_sinks`).
        expected: usize,
    },

    /// The node ordering contains the same key twice.
    #[error("duplicate node key in graph ordering: {key}")]
    DuplicateNode {
        /// Rendered `layer_feature` key.
        key: String,
    },

    /// A parameter value failed validation.
    ///
    /// Builders do not auto-clamp; `validate()` is explicit and fails fast
    /// with the field name and the allowed range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration file/environment loading failed.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl EngineError {
    /// Create an [`EngineError::InvalidParameter`] from any message.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

/// Result alias for supernode-core operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message_names_dimensions() {
        let err = EngineError::ShapeMismatch {
            rows: 10,
            cols: 9,
            expected: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("10x9"), "message must show actual shape: {msg}");
        assert!(msg.contains("10x10"), "message must show expected shape: {msg}");
        println!("[PASS] test_shape_mismatch_message_names_dimensions - {msg}");
    }

    #[test]
    fn test_invalid_parameter_constructor() {
        let err = EngineError::invalid_parameter("top_k must be >= 1, got 0");
        assert!(err.to_string().contains("top_k"));
        println!("[PASS] test_invalid_parameter_constructor");
    }
}
