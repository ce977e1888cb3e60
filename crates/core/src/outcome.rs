use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::commit::CommitRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Branch,
    Tag,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commit a failed branch could not get past, with its `git log` text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockingCommit {
    pub commit: CommitRef,
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemOutcome {
    Pending,
    Successful,
    Failed {
        cause: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        blocking: Option<BlockingCommit>,
    },
    Skipped {
        reason: String,
    },
}

impl ItemOutcome {
    pub fn state(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Successful => "successful",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OutcomeError {
    #[error("{kind} {name} was already marked {state}")]
    AlreadyResolved {
        kind: ItemKind,
        name: String,
        state: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedItem {
    pub kind: ItemKind,
    pub name: String,
    pub outcome: ItemOutcome,
}

/// Per-item push outcomes for one run.
///
/// Items are kept in registration order. Every item leaves `pending` at most
/// once; a second transition is a caller bug and is refused.
#[derive(Debug, Default)]
pub struct OutcomeTracker {
    items: Vec<TrackedItem>,
    index: HashMap<(ItemKind, String), usize>,
}

impl OutcomeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `name` as pending. Registering twice is a no-op.
    pub fn register(&mut self, kind: ItemKind, name: &str) {
        self.slot(kind, name);
    }

    pub fn mark_successful(&mut self, kind: ItemKind, name: &str) -> Result<(), OutcomeError> {
        self.resolve(kind, name, ItemOutcome::Successful)
    }

    pub fn mark_failed(
        &mut self,
        kind: ItemKind,
        name: &str,
        cause: impl Into<String>,
    ) -> Result<(), OutcomeError> {
        self.resolve(
            kind,
            name,
            ItemOutcome::Failed {
                cause: cause.into(),
                blocking: None,
            },
        )
    }

    /// Mark a branch failed at `blocking`, keeping the commit log for the summary.
    pub fn mark_blocked(
        &mut self,
        name: &str,
        cause: impl Into<String>,
        blocking: BlockingCommit,
    ) -> Result<(), OutcomeError> {
        self.resolve(
            ItemKind::Branch,
            name,
            ItemOutcome::Failed {
                cause: cause.into(),
                blocking: Some(blocking),
            },
        )
    }

    pub fn mark_skipped(
        &mut self,
        kind: ItemKind,
        name: &str,
        reason: impl Into<String>,
    ) -> Result<(), OutcomeError> {
        self.resolve(
            kind,
            name,
            ItemOutcome::Skipped {
                reason: reason.into(),
            },
        )
    }

    pub fn outcome(&self, kind: ItemKind, name: &str) -> Option<&ItemOutcome> {
        self.index
            .get(&(kind, name.to_string()))
            .map(|&idx| &self.items[idx].outcome)
    }

    pub fn items(&self) -> &[TrackedItem] {
        &self.items
    }

    pub fn has_failures(&self) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item.outcome, ItemOutcome::Failed { .. }))
    }

    /// True if at least one item of `kind` exists and every one of them failed.
    pub fn all_failed(&self, kind: ItemKind) -> bool {
        let mut of_kind = self.items.iter().filter(|item| item.kind == kind).peekable();
        of_kind.peek().is_some()
            && of_kind.all(|item| matches!(item.outcome, ItemOutcome::Failed { .. }))
    }

    pub fn summarize(&self) -> Summary {
        let blocking_commits = self
            .items
            .iter()
            .filter_map(|item| match &item.outcome {
                ItemOutcome::Failed {
                    blocking: Some(blocking),
                    ..
                } => Some(BlockingEntry {
                    branch: item.name.clone(),
                    commit: blocking.commit.clone(),
                    log: blocking.log.clone(),
                }),
                _ => None,
            })
            .collect();

        Summary {
            finished_at: Utc::now(),
            branches: Counts::of(self.items.iter().filter(|i| i.kind == ItemKind::Branch)),
            tags: Counts::of(self.items.iter().filter(|i| i.kind == ItemKind::Tag)),
            total: Counts::of(self.items.iter()),
            items: self.items.clone(),
            blocking_commits,
        }
    }

    fn slot(&mut self, kind: ItemKind, name: &str) -> usize {
        let key = (kind, name.to_string());
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        self.items.push(TrackedItem {
            kind,
            name: name.to_string(),
            outcome: ItemOutcome::Pending,
        });
        let idx = self.items.len() - 1;
        self.index.insert(key, idx);
        idx
    }

    fn resolve(&mut self, kind: ItemKind, name: &str, outcome: ItemOutcome) -> Result<(), OutcomeError> {
        let idx = self.slot(kind, name);
        let item = &mut self.items[idx];
        if !item.outcome.is_pending() {
            return Err(OutcomeError::AlreadyResolved {
                kind,
                name: name.to_string(),
                state: item.outcome.state(),
            });
        }
        item.outcome = outcome;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pending: usize,
}

impl Counts {
    fn of<'a>(items: impl Iterator<Item = &'a TrackedItem>) -> Self {
        let mut counts = Self::default();
        for item in items {
            counts.total += 1;
            match item.outcome {
                ItemOutcome::Pending => counts.pending += 1,
                ItemOutcome::Successful => counts.successful += 1,
                ItemOutcome::Failed { .. } => counts.failed += 1,
                ItemOutcome::Skipped { .. } => counts.skipped += 1,
            }
        }
        counts
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} successful, {} failed, {} skipped",
            self.total, self.successful, self.failed, self.skipped
        )?;
        if self.pending > 0 {
            write!(f, ", {} pending", self.pending)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockingEntry {
    pub branch: String,
    pub commit: CommitRef,
    pub log: String,
}

/// End-of-run report.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub finished_at: DateTime<Utc>,
    pub branches: Counts,
    pub tags: Counts,
    pub total: Counts,
    pub items: Vec<TrackedItem>,
    pub blocking_commits: Vec<BlockingEntry>,
}

impl Summary {
    fn section<'a>(
        &'a self,
        state: &'static str,
    ) -> impl Iterator<Item = &'a TrackedItem> + 'a {
        self.items
            .iter()
            .filter(move |item| item.outcome.state() == state)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Push summary ({})", self.finished_at.to_rfc3339())?;
        writeln!(f, "  branches: {}", self.branches)?;
        writeln!(f, "  tags:     {}", self.tags)?;
        writeln!(f, "  total:    {}", self.total)?;

        for state in ["successful", "failed", "skipped", "pending"] {
            let mut items = self.section(state).peekable();
            if items.peek().is_none() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "{}:", capitalize(state))?;
            for item in items {
                match &item.outcome {
                    ItemOutcome::Failed { cause, .. } => {
                        writeln!(f, "  {} {}: {}", item.kind, item.name, cause)?
                    }
                    ItemOutcome::Skipped { reason } => {
                        writeln!(f, "  {} {}: {}", item.kind, item.name, reason)?
                    }
                    _ => writeln!(f, "  {} {}", item.kind, item.name)?,
                }
            }
        }

        if !self.blocking_commits.is_empty() {
            writeln!(f)?;
            writeln!(f, "Blocking commits:")?;
            for entry in &self.blocking_commits {
                writeln!(f, "--- {} ---", entry.branch)?;
                for line in entry.log.lines() {
                    writeln!(f, "    {line}")?;
                }
            }
        }
        Ok(())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
