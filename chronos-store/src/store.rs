//! The in-memory timer store: three collaborating indices over the same
//! set of timer pairs (spec.md §4.4).

use std::collections::{HashMap, HashSet};

use chronos_types::{TimerId, TimerPair};
use tracing::error;

use crate::error::StoreError;
use crate::heap::TimerHeap;

/// `id -> TimerPair`, `cluster_view_id -> {id}`, and a decrease-key heap
/// ordered by next-pop-time, kept in sync on every mutation (spec.md §4.4).
#[derive(Debug, Default)]
pub struct TimerStore {
    id_index: HashMap<TimerId, TimerPair>,
    view_index: HashMap<u64, HashSet<TimerId>>,
    heap: TimerHeap,
}

impl TimerStore {
    pub fn new() -> Self {
        Self {
            id_index: HashMap::new(),
            view_index: HashMap::new(),
            heap: TimerHeap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.id_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_index.is_empty()
    }

    /// Removes and returns the pair for `id`, if present — from all three
    /// indices at once. The caller (the handler's merge path, spec.md
    /// §4.2) owns re-inserting the winner.
    pub fn fetch(&mut self, id: TimerId) -> Option<TimerPair> {
        let pair = self.id_index.remove(&id)?;
        self.heap.remove(id);
        self.unindex_views(id, &pair);
        Some(pair)
    }

    /// Peeks without removing — used by read-only paths (e.g. the resync
    /// server side) that must not disturb the pop schedule.
    pub fn peek(&self, id: TimerId) -> Option<&TimerPair> {
        self.id_index.get(&id)
    }

    /// Inserts a brand-new pair. Fails with [`StoreError::AlreadyPresent`]
    /// if `id` is already indexed — every insert is expected to go through
    /// `fetch` first as part of the merge path (spec.md §4.4 Insert
    /// invariant).
    pub fn insert(&mut self, pair: TimerPair) -> Result<(), StoreError> {
        let id = pair.active_timer.id;
        if self.id_index.contains_key(&id) {
            // A caller reaching this means the merge path in chronos-handler
            // was bypassed (spec.md §4.4). chronos-handler's insert wrapper
            // is the place that turns this into a debug-build panic; the
            // store itself always reports the error and leaves state intact.
            error!(timer_id = %id, "duplicate-id insert rejected");
            return Err(StoreError::AlreadyPresent(u64::from(id)));
        }

        self.heap.push(pair.active_timer.next_pop_time(), id);
        for view_id in pair.view_ids() {
            self.view_index.entry(view_id).or_default().insert(id);
        }
        self.id_index.insert(id, pair);
        Ok(())
    }

    /// All ids indexed under `view_id` — used by the resync server side to
    /// find timers whose view differs from the requester's (spec.md §4.8).
    pub fn ids_for_view(&self, view_id: u64) -> Vec<TimerId> {
        self.view_index.get(&view_id).map(|set| set.iter().copied().collect()).unwrap_or_default()
    }

    /// Every distinct cluster-view-id currently indexed, except `exclude`
    /// (spec.md §4.8: "walks `view_index` for all keys different from the
    /// requester's `cluster-view-id`").
    pub fn view_ids_except(&self, exclude: u64) -> Vec<u64> {
        self.view_index.keys().copied().filter(|v| *v != exclude).collect()
    }

    /// Drains every timer pair whose heap-min next-pop-time is strictly
    /// earlier than `now` (spec.md §4.4 `fetch_next_timers`, using
    /// overflow-safe comparison internally via the heap).
    pub fn fetch_next_timers(&mut self, now: u32) -> Vec<TimerPair> {
        let mut due = Vec::new();

        while let Some((next_pop_time, id)) = self.heap.peek_min() {
            if !chronos_types::overflow_less_than(next_pop_time, now) {
                break;
            }
            self.heap.pop_min();
            if let Some(pair) = self.id_index.remove(&id) {
                self.unindex_views(id, &pair);
                due.push(pair);
            }
        }

        due
    }

    fn unindex_views(&mut self, id: TimerId, pair: &TimerPair) {
        for view_id in pair.view_ids() {
            if let Some(set) = self.view_index.get_mut(&view_id) {
                set.remove(&id);
                if set.is_empty() {
                    self.view_index.remove(&view_id);
                }
            }
        }
    }

    /// Uniqueness check used by property tests (spec.md §8.1): `id_index`
    /// and `view_index` must agree on the live id set.
    #[cfg(test)]
    fn ids_agree(&self) -> bool {
        let from_id_index: HashSet<TimerId> = self.id_index.keys().copied().collect();
        let from_view_index: HashSet<TimerId> =
            self.view_index.values().flat_map(|s| s.iter().copied()).collect();
        from_id_index == from_view_index
    }
}
