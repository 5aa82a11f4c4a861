//! The callback pipeline (spec.md §4.6): fires the client's HTTP POST for a
//! due timer and feeds the outcome back into the handler.
//!
//! Ordering is load-bearing here: [`chronos_handler::TimerHandler::return_timer`]
//! runs *before* the POST is sent, so a client that reacts to the callback by
//! immediately updating the timer can never race ahead of our own re-insert
//! (spec.md §4.6).

use std::sync::Arc;
use std::time::Duration;

use chronos_handler::TimerHandler;
use chronos_types::TimerPair;
use tracing::{error, warn};

use crate::pool::WorkerPool;

/// Default worker count (spec.md §4.6, §5: "default 50").
pub const DEFAULT_CALLBACK_WORKERS: usize = 50;

struct CallbackState {
    handler: Arc<TimerHandler>,
    client: reqwest::blocking::Client,
}

fn fire_callback(state: &CallbackState, pair: TimerPair) {
    let id = pair.active_timer.id;

    let fired = match state.handler.return_timer(pair) {
        Ok(fired) => fired,
        Err(err) => {
            error!(timer_id = u64::from(id), error = %err, "failed to re-insert timer before callback");
            return;
        }
    };

    let result = state
        .client
        .post(&fired.callback_url)
        .header("X-Sequence-Number", fired.sequence_number.to_string())
        .header("Content-Type", "application/octet-stream")
        .body(fired.callback_body.clone())
        .send();

    match result {
        Ok(resp) if resp.status().is_success() => {
            if let Err(err) = state.handler.handle_successful_callback(id) {
                error!(timer_id = u64::from(id), error = %err, "post-callback replication failed");
            }
            chronos_http::Metrics::global().callback_success_total.inc();
        }
        Ok(resp) => {
            warn!(
                timer_id = u64::from(id),
                status = %resp.status(),
                "callback returned non-2xx; dropping timer"
            );
            let _ = state.handler.handle_failed_callback(id);
            chronos_http::Metrics::global().callback_failure_total.inc();
        }
        Err(err) => {
            warn!(timer_id = u64::from(id), error = %err, "callback request failed; dropping timer");
            let _ = state.handler.handle_failed_callback(id);
            chronos_http::Metrics::global().callback_failure_total.inc();
        }
    }
}

/// Builds the callback worker pool over `handler`. One client per worker
/// thread, as with the replicator (spec.md §6.1).
pub fn spawn(worker_count: usize, handler: Arc<TimerHandler>) -> WorkerPool<TimerPair> {
    WorkerPool::spawn(
        "chronos-callback",
        worker_count,
        move || CallbackState {
            handler: Arc::clone(&handler),
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client builds with default TLS backend"),
        },
        fire_callback,
    )
}
