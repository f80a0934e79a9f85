//! Core data types for the question-answering pipeline.
//!
//! Defines fundamental types used throughout the system:
//! - `SchemaModel`: aggregated description of the database's base tables
//! - `SqlStatement`: a statement approved by the safety gate
//! - `ChatExchange` / `ChatResponse`: what a pipeline run hands back
//! - `AskError`: error type for all operations
//! - `Result`: convenient result type alias

pub mod error;
pub mod exchange;
pub mod result;
pub mod schema;
pub mod statement;

pub use error::{AskError, ErrorCategory, GenerationPhase};
pub use exchange::{ChatExchange, ChatResponse, ResultRow};
pub use result::Result;
pub use schema::{ColumnDescriptor, SchemaModel, TableDescriptor, TableKey};
pub use statement::SqlStatement;
