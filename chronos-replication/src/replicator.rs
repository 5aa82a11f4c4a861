//! The replicator fan-out pool (spec.md §4.7): mirrors a timer write to one
//! peer replica via `PUT http://<peer>/timers/<id_hex><replica_hash_hex>`.
//!
//! Failures are logged and not retried at this layer — the next occurrence
//! re-replicates, and resync (`chronos-resync`) repairs any persistent
//! drops (spec.md §4.7, §7 `PeerUnreachable`).

use std::time::Duration;

use chronos_handler::ReplicationJob;
use tracing::warn;

use crate::pool::WorkerPool;

/// Default worker count (spec.md §4.7, §5: "default 50").
pub const DEFAULT_REPLICATOR_WORKERS: usize = 50;

fn put_job(client: &reqwest::blocking::Client, job: ReplicationJob) {
    let url = job.url();
    match client.put(&url).body(job.body).send() {
        Ok(resp) if resp.status().is_success() => {}
        Ok(resp) => {
            warn!(
                target = %job.target,
                timer_id = u64::from(job.timer_id),
                status = %resp.status(),
                "CL_CHRONOS_REPLICATION_ERROR: peer rejected replication PUT"
            );
            chronos_http::Metrics::global().replication_failure_total.inc();
        }
        Err(err) => {
            warn!(
                target = %job.target,
                timer_id = u64::from(job.timer_id),
                error = %err,
                "CL_CHRONOS_REPLICATION_ERROR: peer unreachable"
            );
            chronos_http::Metrics::global().replication_failure_total.inc();
        }
    }
}

/// Builds the replicator pool. One `reqwest::blocking::Client` is
/// constructed per worker thread (spec.md §6.1).
pub fn spawn(worker_count: usize) -> WorkerPool<ReplicationJob> {
    WorkerPool::spawn(
        "chronos-replicator",
        worker_count,
        || {
            reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client builds with default TLS backend")
        },
        put_job,
    )
}
