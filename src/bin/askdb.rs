//! askdb CLI
//!
//! Ask questions of a PostgreSQL database in natural language.

use anyhow::Context;
use askdb::config::{Config, DatabaseConfig};
use askdb::llm::{sanitize_sql, sql_prompt};
use askdb::otel::{init_tracing, LogFormat};
use askdb::{ChatResponse, Database, Pipeline, SafetyGate, SafetyPolicy, SchemaAggregator, SchemaModel};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// askdb - natural-language questions over PostgreSQL
#[derive(Parser)]
#[command(name = "askdb")]
#[command(about = "Answer natural-language questions with read-only SQL", long_about = None)]
#[command(version)]
struct Cli {
    /// Log format: pretty or json (logs go to stderr)
    #[arg(long, global = true, env = "ASKDB_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate the database schema and print it as JSON
    Schema,

    /// Print the SQL-synthesis prompt for a question
    Prompt {
        /// Question in natural language
        question: String,

        /// Schema JSON file (as printed by `askdb schema`) instead of the live catalog
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Run a statement through the safety gate without executing it
    Check {
        /// Candidate SQL
        sql: String,

        /// Gate policy: keyword or strict
        #[arg(long, env = "ASKDB_SAFETY_POLICY", default_value = "keyword")]
        policy: SafetyPolicy,
    },

    /// Answer a question
    Ask {
        /// Question in natural language
        question: String,

        /// Schema JSON file (as printed by `askdb schema`) instead of the live catalog
        #[arg(long)]
        schema: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Schema => cmd_schema().await,
        Commands::Prompt { question, schema } => cmd_prompt(&question, schema.as_deref()).await,
        Commands::Check { sql, policy } => cmd_check(&sql, policy),
        Commands::Ask { question, schema } => cmd_ask(&question, schema.as_deref()).await,
    }
}

async fn cmd_schema() -> anyhow::Result<ExitCode> {
    let model = live_schema().await?;
    println!("{}", model.to_json_pretty()?);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_prompt(question: &str, schema: Option<&Path>) -> anyhow::Result<ExitCode> {
    let model = match schema {
        Some(path) => SchemaModel::from_json_file(path)?,
        None => live_schema().await?,
    };
    println!("{}", sql_prompt(question, &model));
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(sql: &str, policy: SafetyPolicy) -> anyhow::Result<ExitCode> {
    let gate = SafetyGate::for_policy(policy);

    match gate.approve(&sanitize_sql(sql)) {
        Ok(statement) => {
            println!("✓ Approved ({} policy)", policy);
            println!("  {}", statement);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("✗ Rejected ({} policy)", policy);
            println!("  {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn cmd_ask(question: &str, schema: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = Config::from_env()?;
    let supplied = schema.map(SchemaModel::from_json_file).transpose()?;

    let db = Database::connect(&config.database).await?;
    let pipeline = Pipeline::from_config(&config, &db)?;

    let result = match &supplied {
        Some(model) => pipeline.ask(question, Some(model)).await,
        None => pipeline.ask_fresh(question, &db).await,
    };
    db.close().await;

    let response = match result {
        Ok(exchange) => ChatResponse::from(exchange),
        Err(e) => ChatResponse::from(e),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize response")?
    );

    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Aggregate from the live catalog on a short-lived pool.
async fn live_schema() -> anyhow::Result<SchemaModel> {
    let config = DatabaseConfig::from_env()?;
    let db = Database::connect(&config).await?;
    let result = SchemaAggregator::aggregate(&db).await;
    db.close().await;
    Ok(result?)
}
