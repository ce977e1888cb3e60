//! Adaptive batch pushing of one branch.
//!
//! A branch with `N` unpushed commits is sent in slices of at most
//! `max_batch` commits, oldest first. A rejected slice is retried at half the
//! size; after a success the size doubles again. A slice of one commit that
//! is still rejected blocks the branch, and every shape that failed on the
//! way there is remembered so later encounters skip the remote entirely.

use std::num::NonZeroUsize;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commit::CommitRef;
use crate::memo::{Constellation, FailedConstellations};

/// One scheduled push: the commits ending at `tip_commit`, `batch_size` deep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAttempt {
    pub branch_name: String,
    pub batch_size: usize,
    pub tip_commit: CommitRef,
    pub destination_ref: String,
}

impl PushAttempt {
    pub fn new(branch_name: &str, batch_size: usize, tip_commit: CommitRef) -> Self {
        Self {
            branch_name: branch_name.to_string(),
            batch_size,
            tip_commit,
            destination_ref: destination_ref(branch_name),
        }
    }
}

/// Full ref name a branch is pushed to.
pub fn destination_ref(branch_name: &str) -> String {
    format!("refs/heads/{branch_name}")
}

/// What the remote said about one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    Accepted,
    Rejected,
}

/// The repository side of the pusher: commit lookup and the push primitive.
pub trait PushTarget {
    type Error;

    /// The commit `ancestors` first-parent steps below the tip of `branch`.
    fn commit_at(&mut self, branch: &str, ancestors: usize) -> Result<CommitRef, Self::Error>;

    /// Push `attempt.tip_commit` to `attempt.destination_ref`.
    ///
    /// A rejection by the remote is `Ok(PushStatus::Rejected)`; `Err` is
    /// reserved for failures that should abort the whole run.
    fn push(&mut self, attempt: &PushAttempt) -> Result<PushStatus, Self::Error>;
}

/// Whether branches are pushed in adaptive batches or all at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    Incremental(NonZeroUsize),
    AllAtOnce,
}

impl PushMode {
    /// A batch size of 0 selects [`PushMode::AllAtOnce`].
    pub fn from_batch_size(batch_size: usize) -> Self {
        match NonZeroUsize::new(batch_size) {
            Some(max) => Self::Incremental(max),
            None => Self::AllAtOnce,
        }
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::Incremental(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptResult {
    Pushed,
    Rejected,
    /// Matched a known failed constellation; the remote was not contacted.
    KnownFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub batch_size: usize,
    pub tip: CommitRef,
    pub result: AttemptResult,
}

/// The commit a branch could not get past.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blocked {
    pub commit: CommitRef,
    /// Commits still unpushed, the blocking one included.
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchReport {
    pub branch: String,
    pub unpushed: usize,
    pub pushed_count: usize,
    pub attempts: Vec<AttemptRecord>,
    pub blocked: Option<Blocked>,
}

impl BranchReport {
    fn new(branch: &str, unpushed: usize) -> Self {
        Self {
            branch: branch.to_string(),
            unpushed,
            pushed_count: 0,
            attempts: Vec::new(),
            blocked: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.blocked.is_none()
    }

    /// Failure cause for the outcome tracker, `None` on success.
    pub fn failure_cause(&self) -> Option<String> {
        self.blocked.as_ref().map(|blocked| {
            format!(
                "blocked at {}, {} commits left",
                blocked.commit, blocked.remaining
            )
        })
    }

    /// Batch sizes in the order they were tried.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.attempts.iter().map(|a| a.batch_size).collect()
    }

    /// Number of times the push primitive was actually invoked.
    pub fn remote_calls(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.result != AttemptResult::KnownFailure)
            .count()
    }
}

/// Schedules incremental pushes and keeps the failed-constellation memo
/// for the lifetime of one run.
#[derive(Debug, Clone)]
pub struct BatchPusher {
    max_batch: NonZeroUsize,
    failed: FailedConstellations,
}

impl BatchPusher {
    pub fn new(max_batch: NonZeroUsize) -> Self {
        Self {
            max_batch,
            failed: FailedConstellations::new(),
        }
    }

    pub fn failed_constellations(&self) -> &FailedConstellations {
        &self.failed
    }

    /// Push the `unpushed` newest commits of `branch` through `target`.
    pub fn push_branch<T: PushTarget>(
        &mut self,
        target: &mut T,
        branch: &str,
        unpushed: usize,
    ) -> Result<BranchReport, T::Error> {
        let mut report = BranchReport::new(branch, unpushed);
        if unpushed == 0 {
            info!("{}: nothing to push", branch);
            return Ok(report);
        }

        let max = self.max_batch.get();
        let mut remaining = unpushed;
        let mut batch = max.min(unpushed);
        let mut candidates: Vec<Constellation> = Vec::new();

        while remaining > 0 {
            batch = batch.min(remaining);
            let tip = target.commit_at(branch, remaining - batch)?;

            let result = if let Some(blocker) = self.failed.lookup(batch, &tip) {
                info!(
                    "{}: {} commit(s) up to {} are known to fail at {}, skipping",
                    branch,
                    batch,
                    tip.short(),
                    blocker.short()
                );
                AttemptResult::KnownFailure
            } else {
                info!(
                    "{}: pushing {} commit(s) up to {} ({} of {} left)",
                    branch,
                    batch,
                    tip.short(),
                    remaining,
                    unpushed
                );
                let attempt = PushAttempt::new(branch, batch, tip.clone());
                match target.push(&attempt)? {
                    PushStatus::Accepted => AttemptResult::Pushed,
                    PushStatus::Rejected => AttemptResult::Rejected,
                }
            };
            report.attempts.push(AttemptRecord {
                batch_size: batch,
                tip: tip.clone(),
                result,
            });

            match result {
                AttemptResult::Pushed => {
                    remaining -= batch;
                    report.pushed_count += batch;
                    batch = batch.saturating_mul(2).min(max).min(remaining);
                    debug!("{}: next batch size {}", branch, batch);
                }
                AttemptResult::Rejected if batch > 1 => {
                    warn!(
                        "{}: push of {} commit(s) up to {} failed, halving batch size",
                        branch,
                        batch,
                        tip.short()
                    );
                    candidates.push(Constellation::new(batch, tip));
                    batch /= 2;
                }
                AttemptResult::KnownFailure if batch > 1 => {
                    batch = 1;
                }
                AttemptResult::Rejected | AttemptResult::KnownFailure => {
                    warn!(
                        "{}: commit {} cannot be pushed, {} commit(s) left",
                        branch, tip, remaining
                    );
                    candidates.push(Constellation::new(1, tip.clone()));
                    self.failed.confirm(candidates, &tip);
                    report.blocked = Some(Blocked {
                        commit: tip,
                        remaining,
                    });
                    return Ok(report);
                }
            }
        }

        info!("{}: pushed {} commit(s)", branch, report.pushed_count);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTarget;

    fn pusher(max: usize) -> BatchPusher {
        BatchPusher::new(NonZeroUsize::new(max).unwrap())
    }

    #[test]
    fn test_all_success_ten_commits_max_four() {
        let mut target = ScriptedTarget::linear("trunk", 10);
        let report = pusher(4).push_branch(&mut target, "trunk", 10).unwrap();

        assert_eq!(report.batch_sizes(), vec![4, 4, 2]);
        assert_eq!(report.pushed_count, 10);
        assert!(report.is_success());
        let tips: Vec<&str> = report.attempts.iter().map(|a| a.tip.as_str()).collect();
        assert_eq!(tips, vec!["trunk-3", "trunk-7", "trunk-9"]);
    }

    #[test]
    fn test_all_success_schedule_for_various_sizes() {
        for n in 0..40usize {
            for max in 1..9usize {
                let mut target = ScriptedTarget::linear("b", n);
                let report = pusher(max).push_branch(&mut target, "b", n).unwrap();
                assert!(report.is_success());
                assert_eq!(report.pushed_count, n, "n={n} max={max}");
                assert_eq!(report.attempts.len(), n.div_ceil(max), "n={n} max={max}");
                assert_eq!(target.pushes().len(), n.div_ceil(max));
            }
        }
    }

    #[test]
    fn test_zero_commits_never_calls_push() {
        let mut target = ScriptedTarget::linear("main", 5);
        let report = pusher(8).push_branch(&mut target, "main", 0).unwrap();

        assert!(report.is_success());
        assert_eq!(report.pushed_count, 0);
        assert!(report.attempts.is_empty());
        assert!(target.pushes().is_empty());
    }

    #[test]
    fn test_failure_halves_without_consuming_commits() {
        let mut target = ScriptedTarget::linear("main", 6).with_results([false, true, true, true]);
        let report = pusher(6).push_branch(&mut target, "main", 6).unwrap();

        // 6 rejected -> 3 from the same starting point.
        let pushes = target.pushes();
        assert_eq!(pushes[0].batch_size, 6);
        assert_eq!(pushes[1].batch_size, 3);
        assert_eq!(pushes[1].tip_commit.as_str(), "main-2");
        assert_eq!(report.pushed_count, 6);
        assert_eq!(report.batch_sizes(), vec![6, 3, 3]);
    }

    #[test]
    fn test_failure_at_size_one_blocks_branch() {
        let mut target = ScriptedTarget::linear("main", 3).with_results([false]);
        let report = pusher(1).push_branch(&mut target, "main", 3).unwrap();

        assert_eq!(target.pushes().len(), 1);
        assert!(!report.is_success());
        let blocked = report.blocked.as_ref().unwrap();
        assert_eq!(blocked.commit.as_str(), "main-0");
        assert_eq!(blocked.remaining, 3);
        assert_eq!(
            report.failure_cause().as_deref(),
            Some("blocked at main-0, 3 commits left")
        );
    }

    #[test]
    fn test_eight_commits_recover_and_ramp_up() {
        let mut target = ScriptedTarget::linear("main", 8)
            .with_results([false, false, false, true, true, true, true]);
        let mut pusher = pusher(8);
        let report = pusher.push_branch(&mut target, "main", 8).unwrap();

        assert_eq!(report.batch_sizes(), vec![8, 4, 2, 1, 2, 4, 1]);
        assert_eq!(report.pushed_count, 8);
        assert!(report.is_success());
        // The single commit that went through is the oldest one.
        assert_eq!(report.attempts[3].tip.as_str(), "main-0");
        assert_eq!(report.attempts[4].tip.as_str(), "main-2");
        assert_eq!(report.attempts[5].tip.as_str(), "main-6");
        assert_eq!(report.attempts[6].tip.as_str(), "main-7");
        // Candidates are only confirmed by a blocked branch.
        assert!(pusher.failed_constellations().is_empty());
    }

    #[test]
    fn test_poisoned_commit_blocks_and_is_remembered() {
        let mut target = ScriptedTarget::linear("main", 5).rejecting("main-2");
        let mut pusher = pusher(4);
        let first = pusher.push_branch(&mut target, "main", 5).unwrap();

        assert_eq!(first.batch_sizes(), vec![4, 2, 3, 1]);
        assert_eq!(first.pushed_count, 2);
        let blocked = first.blocked.as_ref().unwrap();
        assert_eq!(blocked.commit.as_str(), "main-2");
        assert_eq!(blocked.remaining, 3);

        let memo = pusher.failed_constellations();
        assert_eq!(memo.lookup(4, &"main-3".into()).map(CommitRef::as_str), Some("main-2"));
        assert_eq!(memo.lookup(3, &"main-4".into()).map(CommitRef::as_str), Some("main-2"));
        assert!(memo.contains(1, &"main-2".into()));
    }

    #[test]
    fn test_known_constellations_never_reach_the_remote() {
        let mut pusher = pusher(4);
        let mut target = ScriptedTarget::linear("main", 5).rejecting("main-2");
        pusher.push_branch(&mut target, "main", 5).unwrap();
        let known: Vec<(usize, CommitRef)> = [(4, "main-3"), (3, "main-4"), (1, "main-2")]
            .into_iter()
            .map(|(b, c)| (b, CommitRef::new(c)))
            .collect();

        // Replay the same history from scratch.
        let mut replay = ScriptedTarget::linear("main", 5).rejecting("main-2");
        let report = pusher.push_branch(&mut replay, "main", 5).unwrap();

        for push in replay.pushes() {
            assert!(
                !known.contains(&(push.batch_size, push.tip_commit.clone())),
                "known failure re-sent: {push:?}"
            );
        }
        // (4, main-3) short-circuits straight to single commits.
        assert_eq!(report.attempts[0].result, AttemptResult::KnownFailure);
        assert_eq!(report.attempts[1].batch_size, 1);
        let last = report.attempts.last().unwrap();
        assert_eq!(last.result, AttemptResult::KnownFailure);
        assert_eq!(last.batch_size, 1);
        assert_eq!(last.tip.as_str(), "main-2");
        assert_eq!(report.blocked.as_ref().unwrap().commit.as_str(), "main-2");
        assert!(report.remote_calls() < report.attempts.len());
    }

    #[test]
    fn test_memo_is_shared_across_branches() {
        let mut pusher = pusher(2);
        let mut target = ScriptedTarget::linear("main", 2).rejecting("main-0");
        let first = pusher.push_branch(&mut target, "main", 2).unwrap();
        assert!(!first.is_success());

        // Another branch whose history reaches the same tip is not retried.
        let mut other = ScriptedTarget::linear("main", 2).rejecting("main-0");
        let second = pusher.push_branch(&mut other, "release", 2).unwrap();
        assert!(other.pushes().is_empty());
        assert_eq!(second.blocked.unwrap().commit.as_str(), "main-0");
    }

    #[test]
    fn test_push_mode_from_batch_size() {
        assert_eq!(PushMode::from_batch_size(0), PushMode::AllAtOnce);
        assert_eq!(
            PushMode::from_batch_size(1000),
            PushMode::Incremental(NonZeroUsize::new(1000).unwrap())
        );
        assert!(!PushMode::AllAtOnce.is_incremental());
    }
}
