//! Question answering pipeline.
//!
//! One run per question, strictly linear:
//!
//! ```text
//! Received -> SchemaReady -> SqlSynthesized -> SqlValidated
//!          -> RowsFetched -> AnswerSynthesized -> Done
//! ```
//!
//! Any failing step ends the run with a [`PipelineError`] naming the stage the
//! run was trying to reach. Nothing is retried and no partial result is
//! returned.

use crate::config::Config;
use crate::db::Database;
use crate::executor::StatementRunner;
use crate::gate::SafetyGate;
use crate::llm::{CompletionProvider, LlmClient, QuerySynthesizer, ResponseSynthesizer};
use crate::otel::{pipeline_span, record_stage, record_status};
use crate::schema::{CatalogReader, SchemaAggregator};
use crate::types::{AskError, ChatExchange, ChatResponse, ErrorCategory, SchemaModel};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    SchemaReady,
    SqlSynthesized,
    SqlValidated,
    RowsFetched,
    AnswerSynthesized,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::SchemaReady => "schema_ready",
            Self::SqlSynthesized => "sql_synthesized",
            Self::SqlValidated => "sql_validated",
            Self::RowsFetched => "rows_fetched",
            Self::AnswerSynthesized => "answer_synthesized",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed run.
#[derive(Debug, thiserror::Error)]
#[error("failed at {stage}: {error}")]
pub struct PipelineError {
    /// Stage whose step failed
    pub stage: PipelineStage,
    #[source]
    pub error: AskError,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, error: AskError) -> Self {
        Self { stage, error }
    }

    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }
}

impl From<PipelineError> for ChatResponse {
    fn from(err: PipelineError) -> Self {
        ChatResponse::failure(err.stage.as_str(), &err.error)
    }
}

fn at(stage: PipelineStage) -> impl FnOnce(AskError) -> PipelineError {
    move |error| PipelineError::new(stage, error)
}

fn reached(stage: PipelineStage) {
    record_stage(stage.as_str());
    tracing::info!(stage = stage.as_str(), "Stage reached");
}

enum SchemaSource<'a> {
    Supplied(Option<&'a SchemaModel>),
    Catalog(&'a dyn CatalogReader),
}

/// Sequences schema, synthesis, gate, execution and summarization.
///
/// Holds only shared handles; one instance serves concurrent runs.
pub struct Pipeline {
    synthesizer: QuerySynthesizer,
    gate: SafetyGate,
    runner: Arc<dyn StatementRunner>,
    responder: ResponseSynthesizer,
}

impl Pipeline {
    /// Pipeline using one completion provider for both model calls.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        gate: SafetyGate,
        runner: Arc<dyn StatementRunner>,
    ) -> Self {
        Self::from_parts(
            QuerySynthesizer::new(Arc::clone(&provider)),
            gate,
            runner,
            ResponseSynthesizer::new(provider),
        )
    }

    pub fn from_parts(
        synthesizer: QuerySynthesizer,
        gate: SafetyGate,
        runner: Arc<dyn StatementRunner>,
        responder: ResponseSynthesizer,
    ) -> Self {
        Self {
            synthesizer,
            gate,
            runner,
            responder,
        }
    }

    /// Wire the pipeline from configuration and an open database.
    ///
    /// # Errors
    ///
    /// Returns `AskError::Config` if the completion client cannot be built
    pub fn from_config(config: &Config, db: &Database) -> crate::types::Result<Self> {
        let client = LlmClient::new(&config.llm)?;
        Ok(Self::new(
            Arc::new(client),
            SafetyGate::for_policy(config.safety),
            Arc::new(db.executor()),
        ))
    }

    /// Answer `question` against a caller-supplied schema.
    ///
    /// # Errors
    ///
    /// `Validation` at `received` for a blank question or a missing schema;
    /// otherwise the failing component's error at its stage
    pub async fn ask(
        &self,
        question: &str,
        schema: Option<&SchemaModel>,
    ) -> Result<ChatExchange, PipelineError> {
        self.run(question, SchemaSource::Supplied(schema)).await
    }

    /// Answer `question` after aggregating the schema from `reader`.
    pub async fn ask_fresh(
        &self,
        question: &str,
        reader: &dyn CatalogReader,
    ) -> Result<ChatExchange, PipelineError> {
        self.run(question, SchemaSource::Catalog(reader)).await
    }

    async fn run(
        &self,
        question: &str,
        source: SchemaSource<'_>,
    ) -> Result<ChatExchange, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = pipeline_span(run_id);

        async {
            let result = self.stages(question, source).await;
            match &result {
                Ok(exchange) => {
                    record_status("success");
                    tracing::info!(rows = exchange.row_count(), "Question answered");
                }
                Err(e) => {
                    record_status("failed");
                    tracing::warn!(
                        stage = e.stage.as_str(),
                        category = e.category().as_str(),
                        error = %e.error,
                        "Question failed"
                    );
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn stages(
        &self,
        question: &str,
        source: SchemaSource<'_>,
    ) -> Result<ChatExchange, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::new(
                PipelineStage::Received,
                AskError::validation("Question is required"),
            ));
        }
        reached(PipelineStage::Received);

        let fresh;
        let schema = match source {
            SchemaSource::Supplied(Some(schema)) => schema,
            SchemaSource::Supplied(None) => {
                return Err(PipelineError::new(
                    PipelineStage::Received,
                    AskError::validation("Schema is required"),
                ));
            }
            SchemaSource::Catalog(reader) => {
                fresh = SchemaAggregator::aggregate(reader)
                    .await
                    .map_err(at(PipelineStage::SchemaReady))?;
                &fresh
            }
        };
        reached(PipelineStage::SchemaReady);

        let candidate = self
            .synthesizer
            .synthesize(question, schema)
            .await
            .map_err(at(PipelineStage::SqlSynthesized))?;
        reached(PipelineStage::SqlSynthesized);

        let statement = self
            .gate
            .approve(&candidate)
            .map_err(at(PipelineStage::SqlValidated))?;
        reached(PipelineStage::SqlValidated);

        let rows = self
            .runner
            .run(&statement)
            .await
            .map_err(at(PipelineStage::RowsFetched))?;
        reached(PipelineStage::RowsFetched);

        let answer = self
            .responder
            .respond(question, &statement, &rows)
            .await
            .map_err(at(PipelineStage::AnswerSynthesized))?;
        reached(PipelineStage::AnswerSynthesized);

        let exchange = ChatExchange {
            question: question.to_string(),
            statement,
            rows,
            answer,
            answered_at: Utc::now(),
        };
        reached(PipelineStage::Done);

        Ok(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionError, CompletionRequest};
    use crate::types::{ColumnDescriptor, ResultRow, SqlStatement, TableDescriptor};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted(Mutex<VecDeque<std::result::Result<String, String>>>);

    impl Scripted {
        fn new(replies: &[std::result::Result<&str, &str>]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(
                replies
                    .iter()
                    .map(|r| (*r).map(str::to_string).map_err(str::to_string))
                    .collect(),
            )))
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> std::result::Result<String, CompletionError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted reply".into()))
                .map_err(CompletionError::Parse)
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    struct Rows(Vec<ResultRow>);

    #[async_trait]
    impl StatementRunner for Rows {
        async fn run(&self, _statement: &SqlStatement) -> crate::types::Result<Vec<ResultRow>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl StatementRunner for Failing {
        async fn run(&self, _statement: &SqlStatement) -> crate::types::Result<Vec<ResultRow>> {
            Err(AskError::Execution("relation \"employees\" does not exist".into()))
        }
    }

    fn schema() -> SchemaModel {
        SchemaModel::from(vec![TableDescriptor::new("public", "employees")
            .with_column(ColumnDescriptor::new("id", "integer", false).with_constraint("PRIMARY KEY"))
            .with_column(ColumnDescriptor::new("name", "text", true))])
    }

    fn row(name: &str) -> ResultRow {
        let mut row = ResultRow::new();
        row.insert("name".into(), json!(name));
        row
    }

    #[test]
    fn test_stage_order_and_names() {
        assert!(PipelineStage::Received < PipelineStage::SchemaReady);
        assert!(PipelineStage::AnswerSynthesized < PipelineStage::Done);
        assert_eq!(PipelineStage::SqlValidated.to_string(), "sql_validated");
        assert_eq!(
            serde_json::to_value(PipelineStage::RowsFetched).unwrap(),
            json!("rows_fetched")
        );
    }

    #[tokio::test]
    async fn test_happy_path() {
        let provider = Scripted::new(&[
            Ok("```sql\nSELECT e.name FROM public.employees e LIMIT 50\n```"),
            Ok("There are two employees: Ada and Grace."),
        ]);
        let pipeline = Pipeline::new(
            provider,
            SafetyGate::default(),
            Arc::new(Rows(vec![row("Ada"), row("Grace")])),
        );

        let exchange = pipeline.ask("  Who works here? ", Some(&schema())).await.unwrap();
        assert_eq!(exchange.question, "Who works here?");
        assert_eq!(
            exchange.statement.as_str(),
            "SELECT e.name FROM public.employees e LIMIT 50"
        );
        assert_eq!(exchange.row_count(), 2);
        assert_eq!(exchange.answer, "There are two employees: Ada and Grace.");
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let pipeline = Pipeline::new(Scripted::new(&[]), SafetyGate::default(), Arc::new(Rows(vec![])));

        let err = pipeline.ask("   ", Some(&schema())).await.unwrap_err();
        assert_eq!(err.stage, PipelineStage::Received);
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[tokio::test]
    async fn test_missing_schema_rejected() {
        let pipeline = Pipeline::new(Scripted::new(&[]), SafetyGate::default(), Arc::new(Rows(vec![])));

        let err = pipeline.ask("How many employees?", None).await.unwrap_err();
        assert_eq!(err.stage, PipelineStage::Received);
        assert!(matches!(err.error, AskError::Validation(_)));
    }

    #[tokio::test]
    async fn test_synthesis_failure_stage() {
        let pipeline = Pipeline::new(
            Scripted::new(&[Err("rate limited")]),
            SafetyGate::default(),
            Arc::new(Rows(vec![])),
        );

        let err = pipeline.ask("How many employees?", Some(&schema())).await.unwrap_err();
        assert_eq!(err.stage, PipelineStage::SqlSynthesized);
        assert_eq!(err.category(), ErrorCategory::Generation);
    }

    #[tokio::test]
    async fn test_execution_failure_stage() {
        let pipeline = Pipeline::new(
            Scripted::new(&[Ok("SELECT count(*) FROM public.employees")]),
            SafetyGate::default(),
            Arc::new(Failing),
        );

        let err = pipeline.ask("How many employees?", Some(&schema())).await.unwrap_err();
        assert_eq!(err.stage, PipelineStage::RowsFetched);
        assert_eq!(err.category(), ErrorCategory::DataAccess);

        let response = ChatResponse::from(err);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["stage"], json!("rows_fetched"));
        assert!(value.get("data").is_none());
    }

    #[tokio::test]
    async fn test_summary_failure_stage() {
        let pipeline = Pipeline::new(
            Scripted::new(&[Ok("SELECT e.name FROM public.employees e LIMIT 50"), Err("timeout")]),
            SafetyGate::default(),
            Arc::new(Rows(vec![row("Ada")])),
        );

        let err = pipeline.ask("Who works here?", Some(&schema())).await.unwrap_err();
        assert_eq!(err.stage, PipelineStage::AnswerSynthesized);
        assert_eq!(
            err.error.generation_phase(),
            Some(crate::types::GenerationPhase::Summarization)
        );
    }
}
