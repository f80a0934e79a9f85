//! Approved SQL statement.

use serde::Serialize;
use std::fmt;

/// A single SQL statement that passed the safety gate.
///
/// Only [`crate::gate::SafetyGate`] constructs this type, so holding one means
/// the text was approved for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SqlStatement(String);

impl SqlStatement {
    pub(crate) fn approved(sql: String) -> Self {
        Self(sql)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SqlStatement {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
