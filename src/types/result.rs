//! Result type alias.

use super::error::AskError;

/// Result type for all pipeline operations.
pub type Result<T> = std::result::Result<T, AskError>;
