//! The background tick thread (spec.md §4.4: "A single background task
//! wakes at least every `tick_ms` (default 10 ms)").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chronos_handler::TimerHandler;
use chronos_http::Metrics;
use tracing::error;

pub const DEFAULT_TICK_MS: u64 = 10;

/// Spawns the pop-loop thread. Ticks every `tick_ms` until `shutdown` is
/// set, driving [`TimerHandler::pop_tick`] and refreshing the
/// `chronos_timers_stored` gauge alongside it.
pub fn spawn(handler: Arc<TimerHandler>, tick_ms: u64, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
    let tick = Duration::from_millis(tick_ms.max(1));
    thread::Builder::new()
        .name("chronos-pop-loop".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                match handler.pop_tick() {
                    Ok(dispatched) => {
                        Metrics::global().pops_total.inc_by(dispatched as u64);
                    }
                    Err(err) => {
                        error!(error = %err, "pop loop tick failed");
                    }
                }
                Metrics::global().timers_stored.set(handler.store_len() as i64);
                thread::sleep(tick);
            }
        })
        .expect("failed to spawn pop loop thread")
}
