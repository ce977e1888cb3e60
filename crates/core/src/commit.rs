use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of one commit (a full object hash as printed by git).
///
/// Commits are never ordered by value; order only exists as an ancestor
/// offset from a branch tip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRef(String);

impl CommitRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 10 characters, for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(10)
            .map_or(self.0.len(), |(idx, _)| idx);
        &self.0[..end]
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CommitRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}
