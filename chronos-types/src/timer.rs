//! The `Timer` record and the `TimerPair` the store indexes on (spec.md §3).

use crate::ids::{NodeAddress, TimerId};

/// `interval_ms` a tombstone carries while it ages out of the store
/// (spec.md §3: "a tombstone has an `interval_ms` equal to the
/// tombstone-retention window").
pub const TOMBSTONE_RETENTION_MS: u32 = 30_000;

/// An immutable-after-creation timer descriptor.
///
/// Only `sequence_number`, `replica_tracker`, and `tombstone` ever change
/// after construction (spec.md §3) — every pop or merge that changes the
/// schedule produces a *new* `Timer` rather than mutating one in place, so
/// the old generation can still be compared against for ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    pub id: TimerId,
    pub start_time_mono_ms: u32,
    pub interval_ms: u32,
    pub repeat_for_ms: u32,
    pub sequence_number: u32,
    pub callback_url: String,
    pub callback_body: Vec<u8>,
    /// Ordered list of replica addresses; index 0 is the primary.
    pub replicas: Vec<NodeAddress>,
    /// Addresses from the previous cluster view still owed a drop notice.
    pub extra_replicas: Vec<NodeAddress>,
    pub cluster_view_id: u64,
    /// Bit *i* set means replica *i* and all lower indices have acked.
    pub replica_tracker: u32,
    pub tombstone: bool,
}

impl Timer {
    /// `next_pop_time = start_time_mono_ms + (sequence_number + 1) * interval_ms`,
    /// computed in wrapping `u32` arithmetic (spec.md §4.4, §9 — the 32-bit
    /// wrap-around is load-bearing for the wire format and must not be
    /// widened).
    pub fn next_pop_time(&self) -> u32 {
        let offset = (self.sequence_number.wrapping_add(1)).wrapping_mul(self.interval_ms);
        self.start_time_mono_ms.wrapping_add(offset)
    }

    /// The `(start_time_mono_ms, sequence_number)` ordering key used for
    /// merge decisions (spec.md §3, §4.2).
    pub fn occurrence_key(&self) -> (u32, u32) {
        (self.start_time_mono_ms, self.sequence_number)
    }

    /// True while `(sequence_number + 1) * interval_ms <= repeat_for_ms`
    /// (spec.md §3).
    pub fn should_repeat(&self) -> bool {
        let next_seq = u64::from(self.sequence_number) + 1;
        next_seq * u64::from(self.interval_ms) <= u64::from(self.repeat_for_ms)
    }

    /// The primary replica, i.e. `replicas[0]`. Pops only occur on the node
    /// whose local address equals this (spec.md §3 invariants).
    pub fn primary(&self) -> Option<&NodeAddress> {
        self.replicas.first()
    }

    /// Whether `local` is this timer's primary replica.
    pub fn is_local(&self, local: &NodeAddress) -> bool {
        self.primary().is_some_and(|p| p == local)
    }

    /// Number of configured replicas (capped at cluster size, spec.md §3).
    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Marks replica `index`, and every lower index, as having accepted
    /// this timer (spec.md §4.3).
    pub fn mark_replicas_up_to_acked(&mut self, index: usize) {
        if index >= 32 {
            self.replica_tracker = u32::MAX;
            return;
        }
        let mask = (1u32 << (index + 1)) - 1;
        self.replica_tracker |= mask;
    }

    /// True once every configured replica has acked, per `replica_tracker`
    /// (spec.md §4.3: "`replica_tracker` shows all replicas informed").
    pub fn all_replicas_acked(&self) -> bool {
        let n = self.replica_count();
        if n == 0 {
            return true;
        }
        if n >= 32 {
            return self.replica_tracker == u32::MAX;
        }
        let full_mask = (1u32 << n) - 1;
        self.replica_tracker & full_mask == full_mask
    }

    /// Produces a tombstone with the same id/view but no callback payload,
    /// advancing past the live occurrence (spec.md §4.2).
    ///
    /// Preserves `start_time_mono_ms`, `sequence_number`, and
    /// `replica_tracker` as they stood on the record being tombstoned — the
    /// right behaviour when a non-primary merge insert needs to retain
    /// replica-tracker bookkeeping (spec.md §4.2, §4.3). Callers that want a
    /// tombstone aged from the current instant (client `DELETE`, a
    /// repeat-exhausted pop) should use [`Timer::new_tombstone`] instead.
    pub fn into_tombstone(mut self) -> Self {
        self.tombstone = true;
        self.interval_ms = TOMBSTONE_RETENTION_MS;
        self.callback_url.clear();
        self.callback_body.clear();
        self.repeat_for_ms = TOMBSTONE_RETENTION_MS;
        self
    }

    /// Builds a fresh tombstone whose retention window starts at `now_ms`
    /// (spec.md §3: "a tombstone has an `interval_ms` equal to the
    /// tombstone-retention window"). Used for client `DELETE` and for a
    /// repeat-exhausted pop, where the retention countdown should start now
    /// rather than inherit a stale `start_time_mono_ms`.
    pub fn new_tombstone(
        id: TimerId,
        now_ms: u32,
        replicas: Vec<NodeAddress>,
        extra_replicas: Vec<NodeAddress>,
        cluster_view_id: u64,
    ) -> Self {
        Self {
            id,
            start_time_mono_ms: now_ms,
            interval_ms: TOMBSTONE_RETENTION_MS,
            repeat_for_ms: TOMBSTONE_RETENTION_MS,
            sequence_number: 0,
            callback_url: String::new(),
            callback_body: Vec::new(),
            replicas,
            extra_replicas,
            cluster_view_id,
            replica_tracker: 0,
            tombstone: true,
        }
    }
}

/// "earlier than" for 32-bit wrap-around timestamps: the sign of `(a - b)`
/// interpreted as a signed 32-bit value (spec.md §4.4 `overflow_less_than`).
pub fn overflow_less_than(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// The store's per-id record: the live timer plus, during a cluster-view
/// transition, the retained pre-transition copy (spec.md §3 `TimerPair`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerPair {
    pub active_timer: Timer,
    /// Present only while old-view replicas still need the replica-tracker
    /// to confirm they've been told to drop their copy (spec.md §3, §4.3).
    pub information_timer: Option<Timer>,
}

impl TimerPair {
    pub fn new(active_timer: Timer) -> Self {
        Self {
            active_timer,
            information_timer: None,
        }
    }

    pub fn with_information_timer(active_timer: Timer, information_timer: Timer) -> Self {
        Self {
            active_timer,
            information_timer: Some(information_timer),
        }
    }

    /// Every cluster-view-id this pair is currently indexed under (the
    /// active timer's, plus the information timer's if retained).
    pub fn view_ids(&self) -> Vec<u64> {
        let mut ids = vec![self.active_timer.cluster_view_id];
        if let Some(info) = &self.information_timer {
            if info.cluster_view_id != self.active_timer.cluster_view_id {
                ids.push(info.cluster_view_id);
            }
        }
        ids
    }

    /// Drops the information timer once all old-view replicas have been
    /// told (spec.md §4.3).
    pub fn drop_information_timer_if_acked(&mut self) {
        if let Some(info) = &self.information_timer {
            if info.all_replicas_acked() {
                self.information_timer = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(start: u32, seq: u32, interval: u32) -> Timer {
        Timer {
            id: TimerId::new(1),
            start_time_mono_ms: start,
            interval_ms: interval,
            repeat_for_ms: 1_000,
            sequence_number: seq,
            callback_url: "http://example.test/cb".to_string(),
            callback_body: b"body".to_vec(),
            replicas: vec![NodeAddress::new("10.0.0.1:7253")],
            extra_replicas: vec![],
            cluster_view_id: 0,
            replica_tracker: 0,
            tombstone: false,
        }
    }

    #[test]
    fn next_pop_time_advances_by_interval_per_sequence() {
        let t = timer(1_000, 2, 100);
        assert_eq!(t.next_pop_time(), 1_000 + 3 * 100);
    }

    #[test]
    fn next_pop_time_wraps() {
        let mut t = timer(u32::MAX - 10, 0, 100);
        t.repeat_for_ms = 100;
        assert_eq!(t.next_pop_time(), (u32::MAX - 10).wrapping_add(100));
    }

    #[test]
    fn overflow_less_than_handles_wrap_around() {
        // u32::MAX - 1 is only 7 ticks (wrapping) before 5, so it is
        // "earlier" even though it is numerically larger.
        assert!(overflow_less_than(u32::MAX - 1, 5));
        assert!(!overflow_less_than(5, u32::MAX - 1));
        assert!(!overflow_less_than(5, 5));
    }

    #[test]
    fn should_repeat_respects_window() {
        let mut t = timer(0, 2, 100);
        t.repeat_for_ms = 350;
        assert!(t.should_repeat()); // (2+1)*100 = 300 <= 350
        t.sequence_number = 3;
        assert!(!t.should_repeat()); // (3+1)*100 = 400 > 350
    }

    #[test]
    fn replica_tracker_marks_lower_indices_too() {
        let mut t = timer(0, 0, 100);
        t.replicas = vec![
            NodeAddress::new("a"),
            NodeAddress::new("b"),
            NodeAddress::new("c"),
        ];
        t.mark_replicas_up_to_acked(1);
        assert_eq!(t.replica_tracker, 0b011);
        assert!(!t.all_replicas_acked());
        t.mark_replicas_up_to_acked(2);
        assert!(t.all_replicas_acked());
    }

    #[test]
    fn into_tombstone_clears_payload() {
        let t = timer(0, 0, 100).into_tombstone();
        assert!(t.tombstone);
        assert_eq!(t.interval_ms, TOMBSTONE_RETENTION_MS);
        assert!(t.callback_url.is_empty());
        assert!(t.callback_body.is_empty());
    }

    #[test]
    fn new_tombstone_ages_from_now() {
        let t = Timer::new_tombstone(TimerId::new(9), 1_000, vec![NodeAddress::new("a")], vec![], 7);
        assert!(t.tombstone);
        assert_eq!(t.next_pop_time(), 1_000 + TOMBSTONE_RETENTION_MS);
        assert!(t.callback_url.is_empty());
    }

    #[test]
    fn information_timer_dropped_once_acked() {
        let mut info = timer(0, 0, 100);
        info.replicas = vec![NodeAddress::new("a"), NodeAddress::new("b")];
        let active = timer(100, 0, 100);
        let mut pair = TimerPair::with_information_timer(active, info);
        pair.drop_information_timer_if_acked();
        assert!(pair.information_timer.is_some());

        pair.information_timer.as_mut().unwrap().mark_replicas_up_to_acked(1);
        pair.drop_information_timer_if_acked();
        assert!(pair.information_timer.is_none());
    }
}
