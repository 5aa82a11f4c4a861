//! Server-side resync query support (spec.md §4.8, §4.9 `GET /timers`).
//!
//! Pure, store-independent helpers used by
//! [`crate::handler::TimerHandler::server_resync`]: request/response shapes
//! and the staleness filter. Kept separate from `handler.rs` because none
//! of this needs the store mutex — it operates on data already pulled out.

use chronos_types::{overflow_less_than, NodeAddress, ResyncPage, Timer};

/// Cap on page size even if the caller's `Range` header asks for more
/// (SPEC_FULL.md §3.1, drawn from the original's `MAX_TIMERS_IN_RESPONSE`).
pub const MAX_TIMERS_IN_RESPONSE: usize = 100;

/// The parsed `GET /timers` resync query (spec.md §4.8, §4.9).
#[derive(Debug, Clone)]
pub struct ResyncQuery {
    pub requester: NodeAddress,
    pub requester_view_id: u64,
    pub time_from: u32,
    /// Requested page size, taken from the `Range` header; callers should
    /// still clamp to [`MAX_TIMERS_IN_RESPONSE`].
    pub max_page: usize,
}

/// A resolved page plus whether more pages remain (spec.md §4.8: the old
/// peer replies `200` on the final page, `206` otherwise).
#[derive(Debug, Clone)]
pub struct ResyncOutcome {
    pub page: ResyncPage,
    pub more: bool,
}

/// True if `timer` is a tombstone whose retention window had already
/// elapsed as of `as_of`. Excluding these keeps resync pages from being
/// dominated by garbage the requester would just re-tombstone on merge
/// anyway; spec.md §4.8 doesn't mandate the filter, but doesn't forbid it
/// either, and the original's resync walk applies the same aging check
/// (`original_source/src/timer_store.cpp`).
pub fn expired_as_of(timer: &Timer, as_of: u32) -> bool {
    timer.tombstone && !overflow_less_than(as_of, timer.next_pop_time())
}
