use std::collections::HashMap;

use crate::commit::CommitRef;

/// A push attempt's shape: how many commits, ending at which tip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constellation {
    pub batch_size: usize,
    pub tip: CommitRef,
}

impl Constellation {
    pub fn new(batch_size: usize, tip: CommitRef) -> Self {
        Self { batch_size, tip }
    }
}

/// Constellations known to fail, mapped to the commit that blocked them.
///
/// Lives for one run of the program and is shared by every branch pushed in
/// that run. Nothing is persisted.
#[derive(Debug, Default, Clone)]
pub struct FailedConstellations {
    known: HashMap<Constellation, CommitRef>,
}

impl FailedConstellations {
    pub fn new() -> Self {
        Self::default()
    }

    /// The blocking commit recorded for `(batch_size, tip)`, if any.
    pub fn lookup(&self, batch_size: usize, tip: &CommitRef) -> Option<&CommitRef> {
        self.known.get(&Constellation::new(batch_size, tip.clone()))
    }

    pub fn contains(&self, batch_size: usize, tip: &CommitRef) -> bool {
        self.lookup(batch_size, tip).is_some()
    }

    /// Record every candidate as failing at `blocker`.
    pub fn confirm<I>(&mut self, candidates: I, blocker: &CommitRef)
    where
        I: IntoIterator<Item = Constellation>,
    {
        for candidate in candidates {
            self.known.insert(candidate, blocker.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
