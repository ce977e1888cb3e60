use std::collections::{HashSet, VecDeque};
use std::convert::Infallible;

use crate::commit::CommitRef;
use crate::pusher::{PushAttempt, PushStatus, PushTarget};

/// In-memory [`PushTarget`] over a linear history `<prefix>-0 .. <prefix>-(n-1)`,
/// oldest first.
///
/// Push results come from the script first; once it runs out, an attempt is
/// rejected if its slice contains a commit passed to [`Self::rejecting`] and
/// accepted otherwise.
#[derive(Debug, Clone)]
pub struct ScriptedTarget {
    commits: Vec<CommitRef>,
    script: VecDeque<bool>,
    poisoned: HashSet<CommitRef>,
    pushes: Vec<PushAttempt>,
}

impl ScriptedTarget {
    pub fn linear(prefix: &str, len: usize) -> Self {
        Self {
            commits: (0..len)
                .map(|i| CommitRef::new(format!("{prefix}-{i}")))
                .collect(),
            script: VecDeque::new(),
            poisoned: HashSet::new(),
            pushes: Vec::new(),
        }
    }

    /// Answer the next pushes with these results (`true` = accepted).
    pub fn with_results(mut self, results: impl IntoIterator<Item = bool>) -> Self {
        self.script.extend(results);
        self
    }

    /// Reject every slice that contains `commit`.
    pub fn rejecting(mut self, commit: &str) -> Self {
        self.poisoned.insert(CommitRef::new(commit));
        self
    }

    /// Every attempt that reached the push primitive, in order.
    pub fn pushes(&self) -> &[PushAttempt] {
        &self.pushes
    }

    fn index_of(&self, commit: &CommitRef) -> usize {
        self.commits
            .iter()
            .position(|c| c == commit)
            .unwrap_or_else(|| panic!("unknown commit {commit}"))
    }
}

impl PushTarget for ScriptedTarget {
    type Error = Infallible;

    fn commit_at(&mut self, _branch: &str, ancestors: usize) -> Result<CommitRef, Infallible> {
        let idx = self.commits.len() - 1 - ancestors;
        Ok(self.commits[idx].clone())
    }

    fn push(&mut self, attempt: &PushAttempt) -> Result<PushStatus, Infallible> {
        self.pushes.push(attempt.clone());
        let accepted = match self.script.pop_front() {
            Some(accepted) => accepted,
            None => {
                let tip = self.index_of(&attempt.tip_commit);
                let first = tip + 1 - attempt.batch_size;
                !self.commits[first..=tip]
                    .iter()
                    .any(|c| self.poisoned.contains(c))
            }
        };
        Ok(if accepted {
            PushStatus::Accepted
        } else {
            PushStatus::Rejected
        })
    }
}
