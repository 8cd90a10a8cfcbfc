//! Composite resource identifiers
//!
//! Databases have no identifier of their own in the RDS API; they are
//! addressed as `<instance_id>/<name>`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ID format '{raw}', must be <instance_id>/<name>")]
pub struct MalformedIdentifier {
    pub raw: String,
}

/// `<instance_id>/<name>` key of a database
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    pub instance_id: String,
    pub name: String,
}

impl CompositeId {
    pub fn new(instance_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: name.into(),
        }
    }
}

impl FromStr for CompositeId {
    type Err = MalformedIdentifier;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        match parts.as_slice() {
            [instance_id, name] if is_segment(instance_id) && is_segment(name) => {
                Ok(Self::new(*instance_id, *name))
            }
            _ => Err(MalformedIdentifier {
                raw: raw.to_string(),
            }),
        }
    }
}

/// Non-empty and not a relative path component, which URL resolution would
/// collapse into a different request path
fn is_segment(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".."
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.instance_id, SEPARATOR, self.name)
    }
}
