//! The client-side half of the resync protocol (spec.md §4.8): pages
//! through an old peer's `/timers` resync endpoint after a cluster-config
//! change and replays each entry through [`chronos_handler::TimerHandler`].

mod driver;
mod error;
mod transport;

pub use driver::{run_resync, run_resync_for_peer, DEFAULT_RESYNC_CONCURRENCY, RESYNC_REQUEST_TIMEOUT};
pub use error::ResyncError;
pub use transport::{ReqwestResyncTransport, ResyncPageResponse, ResyncRequest, ResyncTransport};
