//! Revision watermark for one store feed.
//!
//! Store callbacks may arrive out of order. The maintainer keeps one
//! watermark per feed and only takes a snapshot whose revision is at least
//! the last one it accepted, so the published view never moves backwards.
//!
//! # Invariants
//!
//! - **Non-decreasing**: a revision equal to the watermark is accepted
//!   (re-delivery of the same snapshot is harmless).
//! - **Advances only on acceptance**: stale revisions leave it untouched.

// ---------------------------------------------------------------------------
// Freshness decision
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevisionFreshness {
    Fresh,
    /// Strictly older than the last accepted revision.
    Stale { watermark: u64, got: u64 },
}

impl RevisionFreshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, RevisionFreshness::Fresh)
    }

    pub fn is_rejected(&self) -> bool {
        !self.is_fresh()
    }
}

// ---------------------------------------------------------------------------
// Watermark
// ---------------------------------------------------------------------------

/// Last accepted revision of one feed. Starts empty and accepts anything.
#[derive(Clone, Debug, Default)]
pub struct RevisionWatermark {
    last_accepted: Option<u64>,
}

impl RevisionWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only check; does not advance.
    pub fn check(&self, revision: u64) -> RevisionFreshness {
        match self.last_accepted {
            Some(w) if revision < w => RevisionFreshness::Stale {
                watermark: w,
                got: revision,
            },
            _ => RevisionFreshness::Fresh,
        }
    }

    /// Check and advance to `revision` when fresh.
    pub fn accept(&mut self, revision: u64) -> RevisionFreshness {
        let result = self.check(revision);
        if result.is_fresh() {
            self.last_accepted = Some(revision);
        }
        result
    }

    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }

    pub fn has_accepted_any(&self) -> bool {
        self.last_accepted.is_some()
    }
}
