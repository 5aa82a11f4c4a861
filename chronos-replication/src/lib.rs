//! Worker-pool pipelines for outbound traffic the handler itself never
//! sends: replica fan-out (spec.md §4.7) and client callbacks (spec.md
//! §4.6). Both share the [`WorkerPool`] abstraction (SPEC_FULL.md §5.1),
//! generalized from the teacher's `CoreRuntime` spawn-loop-join lifecycle.

mod callback;
mod pool;
mod replicator;

pub use callback::{spawn as spawn_callback_pool, DEFAULT_CALLBACK_WORKERS};
pub use pool::WorkerPool;
pub use replicator::{spawn as spawn_replicator_pool, DEFAULT_REPLICATOR_WORKERS};
