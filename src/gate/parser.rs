//! Statement-shape policy built on `sqlparser`.

use super::StatementPolicy;
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Accepts exactly one top-level query statement.
///
/// Rejects anything that fails to parse, multiple statements, non-query
/// statements (`SET`, `COPY`, `CALL`, `EXPLAIN ANALYZE`, ...), `SELECT ... INTO`
/// (which creates a table) and row-locking clauses (`FOR UPDATE`, `FOR SHARE`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserPolicy;

impl StatementPolicy for ParserPolicy {
    fn name(&self) -> &'static str {
        "parser"
    }

    fn check(&self, candidate: &str) -> Result<(), String> {
        let statements = Parser::parse_sql(&PostgreSqlDialect {}, candidate)
            .map_err(|e| format!("unparseable statement: {}", e))?;

        let statement = match statements.as_slice() {
            [single] => single,
            [] => return Err("no statement found".to_string()),
            many => return Err(format!("expected one statement, found {}", many.len())),
        };

        let query = match statement {
            Statement::Query(query) => query,
            _ => return Err("only read-only queries are allowed".to_string()),
        };

        if !query.locks.is_empty() {
            return Err("row-locking clause not allowed".to_string());
        }

        if let SetExpr::Select(select) = query.body.as_ref() {
            if select.into.is_some() {
                return Err("SELECT ... INTO not allowed".to_string());
            }
        }

        Ok(())
    }
}
