//! Attribute checks on a located record

use super::normalize::value_to_string;
use super::path_query::{PathQuery, QueryError};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Expectation on one attribute of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrCheck {
    /// Attribute renders exactly as `expected`
    Equals { key: String, expected: String },
    /// Attribute is present, not null and not an empty string
    Set { key: String },
}

impl AttrCheck {
    pub fn key(&self) -> &str {
        match self {
            AttrCheck::Equals { key, .. } | AttrCheck::Set { key } => key.as_str(),
        }
    }

    fn evaluate(&self, record: &Value) -> Result<Option<String>, QueryError> {
        let actual = PathQuery::parse(self.key())?.search(record);
        let failure = match self {
            AttrCheck::Equals { key, expected } => {
                let rendered = value_to_string(&actual, "<null>");
                if actual.is_null() || &rendered != expected {
                    Some(format!("{key}: expected '{expected}', got '{rendered}'"))
                } else {
                    None
                }
            }
            AttrCheck::Set { key } => match &actual {
                Value::Null => Some(format!("{key}: not set")),
                Value::String(s) if s.is_empty() => Some(format!("{key}: empty")),
                _ => None,
            },
        };
        Ok(failure)
    }
}

/// Parses `key=value` into [`AttrCheck::Equals`] and `key` into [`AttrCheck::Set`]
impl FromStr for AttrCheck {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let check = match s.split_once('=') {
            Some((key, expected)) => AttrCheck::Equals {
                key: key.trim().to_string(),
                expected: expected.to_string(),
            },
            None => AttrCheck::Set {
                key: s.trim().to_string(),
            },
        };
        // Reject keys the evaluator cannot handle up front
        PathQuery::parse(check.key())?;
        Ok(check)
    }
}

impl fmt::Display for AttrCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrCheck::Equals { key, expected } => write!(f, "{key}={expected}"),
            AttrCheck::Set { key } => write!(f, "{key}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{} attribute check(s) failed: {}", .0.len(), .0.join("; "))]
    Failed(Vec<String>),

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Run every check against `record`, collecting all failures
pub fn verify(record: &Value, checks: &[AttrCheck]) -> Result<(), CheckError> {
    let mut failures = Vec::new();
    for check in checks {
        if let Some(failure) = check.evaluate(record)? {
            failures.push(failure);
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CheckError::Failed(failures))
    }
}
