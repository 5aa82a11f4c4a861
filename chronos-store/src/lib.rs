//! The in-memory timer store (spec.md §4.4): a single mutex-guarded
//! structure owning three synchronized indices. No network I/O ever
//! happens while the store's lock is held (spec.md §5).

mod error;
mod heap;
mod store;

pub use error::StoreError;
pub use store::TimerStore;

#[cfg(test)]
mod proptests {
    use chronos_types::{NodeAddress, Timer, TimerId, TimerPair};
    use proptest::prelude::*;

    use super::TimerStore;

    fn make_timer(id: u64, start: u32, interval: u16, view: u8) -> Timer {
        Timer {
            id: TimerId::new(id),
            start_time_mono_ms: start,
            interval_ms: u32::from(interval),
            repeat_for_ms: 60_000,
            sequence_number: 0,
            callback_url: "http://example.test/cb".to_string(),
            callback_body: Vec::new(),
            replicas: vec![NodeAddress::new("a")],
            extra_replicas: vec![],
            cluster_view_id: u64::from(view),
            replica_tracker: 0,
            tombstone: false,
        }
    }

    proptest! {
        /// Invariant 1 (spec.md §8): after any sequence of inserts and
        /// deletes, id_index and view_index agree on the live id set.
        #[test]
        fn uniqueness_holds_after_random_ops(
            ops in prop::collection::vec((0u64..12, any::<bool>(), any::<u32>(), any::<u16>(), any::<u8>()), 0..200)
        ) {
            let mut store = TimerStore::new();
            let mut present = std::collections::HashSet::new();

            for (id, insert, start, interval, view) in ops {
                if insert {
                    if !present.contains(&id) {
                        let timer = make_timer(id, start, interval, view);
                        if store.insert(TimerPair::new(timer)).is_ok() {
                            present.insert(id);
                        }
                    }
                } else if store.fetch(TimerId::new(id)).is_some() {
                    present.remove(&id);
                }
            }

            prop_assert_eq!(store.len(), present.len());
        }

        /// Invariant 2 (spec.md §8): pop order is non-decreasing
        /// next_pop_time modulo wrap-around.
        #[test]
        fn pop_order_is_nondecreasing(
            times in prop::collection::vec(any::<u32>(), 1..50)
        ) {
            let mut store = TimerStore::new();
            for (i, t) in times.iter().enumerate() {
                let timer = make_timer(i as u64, *t, 0, 0);
                let _ = store.insert(TimerPair::new(timer));
            }

            let due = store.fetch_next_timers(u32::MAX);
            let mut last = None;
            for pair in &due {
                let npt = pair.active_timer.next_pop_time();
                if let Some(prev) = last {
                    prop_assert!(!chronos_types::overflow_less_than(npt, prev));
                }
                last = Some(npt);
            }
        }
    }
}
