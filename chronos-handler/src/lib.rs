//! The timer handler (spec.md §4.2–§4.6, §4.8): merge semantics, the pop
//! loop, replica-tracker bookkeeping, and the resync server-side query.
//!
//! Everything here runs synchronously under the store's mutex or against
//! an `Arc<dyn Clock>` — no network I/O happens in this crate. HTTP
//! transport, the replicator/callback worker pools, and the resync client
//! driver live in sibling crates that hold an `Arc`/`Weak<TimerHandler>`.

mod clock;
mod error;
mod handler;
mod merge;
mod replication_job;
mod resync;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::HandlerError;
pub use handler::{TimerHandler, DEFAULT_REPLICATION_FACTOR};
pub use merge::MergeOutcome;
pub use replication_job::ReplicationJob;
pub use resync::{ResyncOutcome, ResyncQuery, MAX_TIMERS_IN_RESPONSE};
