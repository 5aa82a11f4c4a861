//! Watches `chronos_cluster.conf` for changes and drives `update_config`
//! (spec.md §6: "Cluster-config changes trigger `update_config` under the
//! config write lock, regenerate hashes and bloom, and schedule a
//! resync"). No filesystem-notification crate is in the workspace's
//! dependency stack, so this polls mtime on the same cadence the pop loop
//! polls the clock — a hand-rolled check in the same spirit as
//! `chronos-cluster`'s hand-rolled INI reader.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use chronos_cluster::{ClusterFileConfig, ClusterMembership};
use chronos_handler::TimerHandler;
use chronos_http::{HealthChecker, Metrics};
use chronos_resync::{ReqwestResyncTransport, DEFAULT_RESYNC_CONCURRENCY, RESYNC_REQUEST_TIMEOUT};
use tracing::{info, warn};

/// Spawns the cluster-config watcher thread.
pub fn spawn(
    path: PathBuf,
    cluster: Arc<ClusterMembership>,
    handler: Arc<TimerHandler>,
    health: Arc<HealthChecker>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("chronos-reload".to_string())
        .spawn(move || {
            let mut last_modified = file_mtime(&path);
            let transport = ReqwestResyncTransport::new(RESYNC_REQUEST_TIMEOUT);

            while !shutdown.load(Ordering::Relaxed) {
                thread::sleep(poll_interval);
                let modified = file_mtime(&path);
                if modified == last_modified {
                    continue;
                }
                last_modified = modified;

                let cfg = match ClusterFileConfig::load(&path) {
                    Ok(cfg) => cfg,
                    Err(err) => {
                        warn!(error = %err, "failed to reload cluster config; keeping current view");
                        continue;
                    }
                };

                let old_view = cluster.snapshot();
                let new_view = cluster.reload(&cfg);
                health.mark_config_loaded();

                if old_view.cluster_view_id == new_view.cluster_view_id {
                    continue;
                }
                info!(
                    old_view_id = old_view.cluster_view_id,
                    new_view_id = new_view.cluster_view_id,
                    "cluster view changed; starting resync"
                );

                let now = handler.clock().now_ms();
                chronos_resync::run_resync(
                    &transport,
                    &handler,
                    &old_view.nodes,
                    &new_view.localhost,
                    new_view.cluster_view_id,
                    now,
                    DEFAULT_RESYNC_CONCURRENCY,
                );
                Metrics::global().timers_stored.set(handler.store_len() as i64);
            }
        })
        .expect("failed to spawn cluster-config reload thread")
}

fn file_mtime(path: &PathBuf) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
