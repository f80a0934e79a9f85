//! Keyword substring policy.

use super::StatementPolicy;

/// Keywords that mark a statement as mutating or schema-altering.
pub const FORBIDDEN_KEYWORDS: [&str; 7] = [
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE",
];

/// Shortest trimmed statement accepted.
pub const MIN_STATEMENT_LEN: usize = 5;

/// Rejects any statement containing a forbidden keyword as a substring of its
/// upper-cased text, and any statement shorter than [`MIN_STATEMENT_LEN`]
/// characters after trimming.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordPolicy;

impl KeywordPolicy {
    /// First forbidden keyword found in `candidate`, if any.
    pub fn find_forbidden(candidate: &str) -> Option<&'static str> {
        let upper = candidate.to_uppercase();
        FORBIDDEN_KEYWORDS
            .iter()
            .copied()
            .find(|keyword| upper.contains(keyword))
    }
}

impl StatementPolicy for KeywordPolicy {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn check(&self, candidate: &str) -> Result<(), String> {
        if let Some(keyword) = Self::find_forbidden(candidate) {
            return Err(format!("forbidden keyword {}", keyword));
        }

        let len = candidate.trim().chars().count();
        if len < MIN_STATEMENT_LEN {
            return Err(format!(
                "statement too short ({} < {} characters)",
                len, MIN_STATEMENT_LEN
            ));
        }

        Ok(())
    }
}
