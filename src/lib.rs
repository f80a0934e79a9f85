//! askdb - natural-language questions over a PostgreSQL database
//!
//! Turns a question into one read-only SQL statement, runs it, and answers in
//! prose:
//! - Schema aggregation from `information_schema` into a deterministic model
//! - Prompt building and SQL synthesis through a completion provider
//! - A safety gate that every statement passes before execution
//! - Execution on a process-wide bounded pool with dynamic row decoding
//! - Answer synthesis from the returned rows
//!
//! [`pipeline::Pipeline`] sequences the steps for one question.

pub mod types;
pub mod config;
pub mod db;
pub mod schema;
pub mod llm;
pub mod gate;
pub mod executor;
pub mod pipeline;
pub mod otel;

pub use config::Config;
pub use db::Database;
pub use gate::{SafetyGate, SafetyPolicy};
pub use pipeline::{Pipeline, PipelineError, PipelineStage};
pub use schema::{CatalogReader, SchemaAggregator};
pub use types::{AskError, ChatExchange, ChatResponse, Result, SchemaModel, SqlStatement};
