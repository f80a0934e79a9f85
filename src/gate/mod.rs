//! Safety gate between SQL synthesis and execution.
//!
//! Every statement produced by the model passes through [`SafetyGate::approve`]
//! before it can reach the database. The gate is the only place a
//! [`SqlStatement`] is constructed.
//!
//! # Policies
//!
//! - [`KeywordPolicy`] (default): coarse lexical filter. Rejects any statement
//!   whose upper-cased text contains a mutating keyword anywhere, including
//!   inside identifiers and literals (`update_date` is rejected). False
//!   positives are accepted in exchange for never executing a mutation the
//!   filter could have caught.
//! - [`ParserPolicy`]: statement-shape check built on `sqlparser`. Requires a
//!   single top-level query with no `SELECT ... INTO` and no locking clause.
//!
//! `SafetyPolicy::Strict` runs the keyword policy and then the parser policy.

pub mod keyword;
pub mod parser;

pub use keyword::{KeywordPolicy, FORBIDDEN_KEYWORDS, MIN_STATEMENT_LEN};
pub use parser::ParserPolicy;

use crate::types::{AskError, Result, SqlStatement};
use std::fmt;
use std::str::FromStr;

/// A rule a candidate statement must satisfy.
pub trait StatementPolicy: Send + Sync {
    /// Short policy name used in rejection reasons and logs.
    fn name(&self) -> &'static str;

    /// Check a sanitized candidate.
    ///
    /// # Returns
    ///
    /// `Ok(())` if acceptable, otherwise the human-readable rejection reason
    fn check(&self, candidate: &str) -> std::result::Result<(), String>;
}

/// Which policies the gate runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyPolicy {
    /// Keyword substring filter only
    #[default]
    Keyword,
    /// Keyword filter, then single read-only query shape
    Strict,
}

impl FromStr for SafetyPolicy {
    type Err = AskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "strict" | "parser" => Ok(Self::Strict),
            other => Err(AskError::Config(format!("Unknown safety policy: {}", other))),
        }
    }
}

impl fmt::Display for SafetyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword => f.write_str("keyword"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

/// Static inspection of candidate statements.
pub struct SafetyGate {
    policies: Vec<Box<dyn StatementPolicy>>,
}

impl SafetyGate {
    /// Gate running only the keyword policy.
    pub fn keyword() -> Self {
        Self {
            policies: vec![Box::new(KeywordPolicy)],
        }
    }

    /// Gate running the keyword policy, then the parser policy.
    pub fn strict() -> Self {
        Self {
            policies: vec![Box::new(KeywordPolicy), Box::new(ParserPolicy::default())],
        }
    }

    pub fn for_policy(policy: SafetyPolicy) -> Self {
        match policy {
            SafetyPolicy::Keyword => Self::keyword(),
            SafetyPolicy::Strict => Self::strict(),
        }
    }

    /// Gate with a custom policy chain (evaluated in order, first rejection wins).
    pub fn with_policies(policies: Vec<Box<dyn StatementPolicy>>) -> Self {
        Self { policies }
    }

    /// Approve a sanitized candidate for execution.
    ///
    /// # Errors
    ///
    /// Returns `AskError::UnsafeStatement` carrying the candidate and the
    /// first policy's rejection reason
    pub fn approve(&self, candidate: &str) -> Result<SqlStatement> {
        for policy in &self.policies {
            if let Err(reason) = policy.check(candidate) {
                tracing::warn!(policy = policy.name(), %reason, "Statement rejected");
                return Err(AskError::unsafe_statement(candidate, reason));
            }
        }

        Ok(SqlStatement::approved(candidate.trim().to_string()))
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::keyword()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_trims() {
        let gate = SafetyGate::default();
        let stmt = gate.approve("  SELECT 1 AS one  \n").unwrap();
        assert_eq!(stmt.as_str(), "SELECT 1 AS one");
    }

    #[test]
    fn test_rejection_carries_statement() {
        let gate = SafetyGate::default();
        match gate.approve("DELETE FROM public.employees") {
            Err(AskError::UnsafeStatement { statement, reason }) => {
                assert_eq!(statement, "DELETE FROM public.employees");
                assert!(reason.contains("DELETE"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_runs_keyword_first() {
        let gate = SafetyGate::strict();
        let err = gate.approve("SELECT 1; DROP TABLE t").unwrap_err();
        match err {
            AskError::UnsafeStatement { reason, .. } => assert!(reason.contains("DROP")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_strict_rejects_multiple_statements() {
        let gate = SafetyGate::strict();
        assert!(gate.approve("SELECT 1; SELECT 2").is_err());
        assert!(SafetyGate::keyword().approve("SELECT 1; SELECT 2").is_ok());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("keyword".parse::<SafetyPolicy>().unwrap(), SafetyPolicy::Keyword);
        assert_eq!("STRICT".parse::<SafetyPolicy>().unwrap(), SafetyPolicy::Strict);
        assert!("lenient".parse::<SafetyPolicy>().is_err());
    }
}
