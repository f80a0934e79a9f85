//! Pipeline inputs and outputs.

use super::error::{AskError, ErrorCategory};
use super::statement::SqlStatement;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One result row: column label -> scalar value or null, in column order.
pub type ResultRow = serde_json::Map<String, serde_json::Value>;

/// One answered question.
///
/// Built per pipeline run and handed back to the caller; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ChatExchange {
    /// The user's question
    pub question: String,

    /// Statement that produced `rows`
    pub statement: SqlStatement,

    /// Rows in the order the database returned them
    pub rows: Vec<ResultRow>,

    /// Natural-language answer
    pub answer: String,

    /// When the answer was produced
    pub answered_at: DateTime<Utc>,
}

impl ChatExchange {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Outbound shape of a pipeline result.
///
/// Success carries the answer, the exact SQL, the row count and the rows.
/// Failure carries only a category and detail string.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChatResponse {
    Success {
        success: bool,
        response: String,
        #[serde(rename = "sqlQuery")]
        sql_query: String,
        #[serde(rename = "resultCount")]
        result_count: usize,
        data: Vec<ResultRow>,
    },
    Failure {
        success: bool,
        error: String,
        category: ErrorCategory,
        stage: String,
        details: String,
    },
}

impl ChatResponse {
    pub fn failure(stage: impl Into<String>, err: &AskError) -> Self {
        Self::Failure {
            success: false,
            error: "Failed to process your question".to_string(),
            category: err.category(),
            stage: stage.into(),
            details: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<ChatExchange> for ChatResponse {
    fn from(exchange: ChatExchange) -> Self {
        Self::Success {
            success: true,
            result_count: exchange.rows.len(),
            response: exchange.answer,
            sql_query: exchange.statement.into_string(),
            data: exchange.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let mut row = ResultRow::new();
        row.insert("name".into(), json!("Ada"));

        let exchange = ChatExchange {
            question: "Who works here?".into(),
            statement: SqlStatement::approved("SELECT e.name FROM public.employees e LIMIT 50".into()),
            rows: vec![row],
            answer: "Ada works here.".into(),
            answered_at: Utc::now(),
        };
        assert_eq!(exchange.row_count(), 1);

        let value = serde_json::to_value(ChatResponse::from(exchange)).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "response": "Ada works here.",
                "sqlQuery": "SELECT e.name FROM public.employees e LIMIT 50",
                "resultCount": 1,
                "data": [{"name": "Ada"}]
            })
        );
    }

    #[test]
    fn test_failure_shape_has_no_data() {
        let err = AskError::unsafe_statement("DELETE FROM t", "forbidden keyword DELETE");
        let response = ChatResponse::failure("sql_synthesized", &err);
        assert!(!response.is_success());

        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["category"], json!("unsafe_statement"));
        assert_eq!(value["stage"], json!("sql_synthesized"));
        assert!(value.get("data").is_none());
        assert!(value.get("sqlQuery").is_none());
    }
}
