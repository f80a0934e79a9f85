//! LLM-powered SQL synthesis and answer generation.

pub mod client;
pub mod prompt;
pub mod query_builder;
pub mod responder;

pub use client::{CompletionError, CompletionProvider, CompletionRequest, LlmClient, LlmProvider};
pub use prompt::{sql_prompt, summary_prompt, ROW_LIMIT};
pub use query_builder::{sanitize_sql, QuerySynthesizer};
pub use responder::{ResponseSynthesizer, FALLBACK_ANSWER};
