pub mod commit;
pub mod memo;
pub mod outcome;
pub mod pusher;

pub use commit::CommitRef;
pub use memo::{Constellation, FailedConstellations};
pub use outcome::{
    BlockingCommit, Counts, ItemKind, ItemOutcome, OutcomeError, OutcomeTracker, Summary,
};
pub use pusher::{
    AttemptRecord, AttemptResult, BatchPusher, Blocked, BranchReport, PushAttempt, PushMode,
    PushStatus, PushTarget,
};

/// Cause recorded for a branch the non-incremental push could not deliver.
pub const BATCH_PUSH_FAILED: &str = "batch push failed";

#[cfg(test)]
mod testing;
