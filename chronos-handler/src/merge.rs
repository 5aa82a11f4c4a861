//! Merge semantics: deciding the winner between a stored timer and an
//! incoming update (spec.md §4.2).
//!
//! Ordering is `(start_time_mono_ms, sequence_number)` lexicographic, with
//! ties going to the incoming update. Each outcome is a distinct, named
//! event so operators can tell "newer in time" apart from "newer in
//! sequence" in logs (spec.md §4.2).

use chronos_types::Timer;
use tracing::debug;

/// The outcome of comparing an incoming timer against a stored one for the
/// same id (spec.md §4.2, §8 invariant 3 "merge monotonicity").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No existing record for this id — the incoming timer is simply added.
    AddNew,
    /// `start_time_mono_ms` strictly greater — a new generation.
    NewerInTime,
    /// Equal start time, `sequence_number` strictly greater.
    NewerInSequence,
    /// Existing record wins; incoming is discarded (older start time).
    DiscardOlderInTime,
    /// Existing record wins; incoming is discarded (older sequence, same
    /// start time).
    DiscardOlderInSequence,
}

impl MergeOutcome {
    /// Whether the incoming timer should replace the stored one.
    pub fn incoming_wins(self) -> bool {
        !matches!(self, Self::DiscardOlderInTime | Self::DiscardOlderInSequence)
    }
}

/// Decides the merge outcome between `existing` (if any) and `incoming`,
/// per spec.md §4.2's three-way rule. Ties on `(start, seq)` go to the
/// incoming update ("last-writer-wins on exact tie", spec.md §3).
pub fn decide(existing: Option<&Timer>, incoming: &Timer) -> MergeOutcome {
    let Some(existing) = existing else {
        return MergeOutcome::AddNew;
    };

    let (existing_start, existing_seq) = existing.occurrence_key();
    let (incoming_start, incoming_seq) = incoming.occurrence_key();

    if incoming_start > existing_start {
        MergeOutcome::NewerInTime
    } else if incoming_start == existing_start && incoming_seq >= existing_seq {
        MergeOutcome::NewerInSequence
    } else if incoming_start < existing_start {
        MergeOutcome::DiscardOlderInTime
    } else {
        MergeOutcome::DiscardOlderInSequence
    }
}

/// Logs the merge decision at the granularity spec.md §4.2 calls for: a
/// distinct trace event per outcome.
pub fn trace(id: u64, outcome: MergeOutcome) {
    match outcome {
        MergeOutcome::AddNew => debug!(timer_id = id, "ADD_NEW"),
        MergeOutcome::NewerInTime => debug!(timer_id = id, "NEWER_IN_TIME"),
        MergeOutcome::NewerInSequence => debug!(timer_id = id, "NEWER_IN_SEQUENCE"),
        MergeOutcome::DiscardOlderInTime => debug!(timer_id = id, "DISCARD_OLDER_IN_TIME"),
        MergeOutcome::DiscardOlderInSequence => {
            debug!(timer_id = id, "DISCARD_OLDER_IN_SEQUENCE");
        }
    }
}
