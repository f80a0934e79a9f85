//! Error types for the question-answering pipeline.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` implementations.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which of the two language-model calls failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    /// Question + schema -> SQL statement
    SqlSynthesis,
    /// Question + statement + rows -> answer
    Summarization,
}

impl GenerationPhase {
    /// Get phase name as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlSynthesis => "sql_synthesis",
            Self::Summarization => "summarization",
        }
    }
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable error category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    DataAccess,
    Generation,
    UnsafeStatement,
    Validation,
    Config,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataAccess => "data_access",
            Self::Generation => "generation",
            Self::UnsafeStatement => "unsafe_statement",
            Self::Validation => "validation",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for every stage of a pipeline run.
#[derive(Error, Debug)]
pub enum AskError {
    /// Schema metadata could not be read
    #[error("Schema read failed: {0}")]
    DataAccess(String),

    /// Approved statement failed on the database
    #[error("Query execution failed: {0}")]
    Execution(String),

    /// Language-model call failed or returned nothing usable
    #[error("Generation failed during {phase}: {message}")]
    Generation {
        phase: GenerationPhase,
        message: String,
    },

    /// Safety gate rejected the candidate statement
    #[error("Unsafe statement rejected ({reason}): {statement}")]
    UnsafeStatement { statement: String, reason: String },

    /// Pipeline input missing or malformed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AskError {
    /// Create a generation error for the given phase.
    pub fn generation(phase: GenerationPhase, msg: impl Into<String>) -> Self {
        Self::Generation {
            phase,
            message: msg.into(),
        }
    }

    /// Create a validation error with context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a safety gate rejection.
    pub fn unsafe_statement(statement: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsafeStatement {
            statement: statement.into(),
            reason: reason.into(),
        }
    }

    /// Stable category for callers.
    ///
    /// Schema reads and statement execution share `data_access`; the two
    /// language-model calls share `generation` and are told apart by
    /// [`AskError::generation_phase`].
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DataAccess(_) | Self::Execution(_) => ErrorCategory::DataAccess,
            Self::Generation { .. } => ErrorCategory::Generation,
            Self::UnsafeStatement { .. } => ErrorCategory::UnsafeStatement,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Config(_) => ErrorCategory::Config,
            Self::Json(_) | Self::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Phase tag for generation errors.
    pub fn generation_phase(&self) -> Option<GenerationPhase> {
        match self {
            Self::Generation { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            AskError::DataAccess("x".into()).category(),
            ErrorCategory::DataAccess
        );
        assert_eq!(
            AskError::Execution("x".into()).category(),
            ErrorCategory::DataAccess
        );
        assert_eq!(
            AskError::unsafe_statement("DROP TABLE t", "forbidden keyword DROP").category(),
            ErrorCategory::UnsafeStatement
        );
        assert_eq!(AskError::validation("x").category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_generation_phase_tag() {
        let err = AskError::generation(GenerationPhase::Summarization, "timeout");
        assert_eq!(err.category(), ErrorCategory::Generation);
        assert_eq!(err.generation_phase(), Some(GenerationPhase::Summarization));
        assert_eq!(
            err.to_string(),
            "Generation failed during summarization: timeout"
        );
        assert_eq!(AskError::validation("x").generation_phase(), None);
    }
}
