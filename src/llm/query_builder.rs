//! Natural language to SQL synthesis.

use crate::llm::client::{CompletionProvider, CompletionRequest};
use crate::llm::prompt::sql_prompt;
use crate::types::{AskError, GenerationPhase, Result, SchemaModel};
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Output cap for the SQL completion.
pub const SQL_MAX_TOKENS: u32 = 500;

/// Low temperature: the same question should keep producing the same SQL.
pub const SQL_TEMPERATURE: f32 = 0.1;

fn fence_opener() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)```sql\n?").expect("static regex"))
}

/// Strip formatting artifacts from raw model output.
///
/// Removes ```` ```sql ```` openers (any case, with an optional trailing
/// newline), every remaining ```` ``` ````, every stray backtick, then trims.
/// Idempotent: `sanitize_sql(sanitize_sql(x)) == sanitize_sql(x)`.
///
/// # Examples
///
/// ```
/// use askdb::llm::sanitize_sql;
///
/// assert_eq!(sanitize_sql("```sql\nSELECT 1\n```"), "SELECT 1");
/// assert_eq!(sanitize_sql("SELECT `name` FROM t"), "SELECT name FROM t");
/// ```
pub fn sanitize_sql(raw: &str) -> String {
    let without_openers = fence_opener().replace_all(raw, "");
    without_openers.replace('`', "").trim().to_string()
}

/// Turns a question plus schema into a candidate SQL statement.
///
/// The result is sanitized but otherwise unchecked; it still has to pass the
/// safety gate, and syntax errors only surface at execution.
pub struct QuerySynthesizer {
    provider: Arc<dyn CompletionProvider>,
}

impl QuerySynthesizer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Generate a candidate statement.
    ///
    /// # Errors
    ///
    /// Returns `AskError::Generation` tagged `sql_synthesis` if the provider
    /// fails or returns no text
    pub async fn synthesize(&self, question: &str, schema: &SchemaModel) -> Result<String> {
        let request =
            CompletionRequest::new(sql_prompt(question, schema), SQL_MAX_TOKENS, SQL_TEMPERATURE);

        let raw = self.provider.complete(&request).await.map_err(|e| {
            AskError::generation(
                GenerationPhase::SqlSynthesis,
                format!("Failed to generate SQL query: {}", e),
            )
        })?;

        let sql = sanitize_sql(&raw);
        if sql.is_empty() {
            return Err(AskError::generation(
                GenerationPhase::SqlSynthesis,
                "model returned no SQL",
            ));
        }

        tracing::debug!(sql = %sql, "SQL synthesized");
        Ok(sql)
    }
}
