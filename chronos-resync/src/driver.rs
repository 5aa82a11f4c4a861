//! The client-side resync driver (spec.md §4.8): on a cluster-config
//! change, pull every timer an old peer still holds that now belongs to
//! this node, replay it through the ordinary merge path, and tell the
//! peer which replica index this node landed at.

use std::thread;
use std::time::Duration;

use chronos_handler::TimerHandler;
use chronos_types::{DeleteReferencesBody, NodeAddress, ReplicaReference, TimerId};
use crossbeam_channel::bounded;
use tracing::{debug, warn};

use crate::error::ResyncError;
use crate::transport::{ResyncRequest, ResyncTransport};

/// Marks a resync-replayed write as peer-origin so `TimerHandler::apply_write`
/// never re-fans it back out (spec.md §4.7: "tells the handler not to
/// re-replicate"). `u32::MAX` can never collide with a real replica index —
/// the replica list is bounded by the cluster's node count.
const RESYNC_REPLICA_INDEX_MARKER: u32 = u32::MAX;

/// Default bound on how many old peers are resynced concurrently
/// (spec.md §4.8, §5: "bounded concurrency").
pub const DEFAULT_RESYNC_CONCURRENCY: usize = 8;

/// Drains every page an old peer has for this node, merging each entry and
/// reporting the resulting replica index back. Returns how many entries
/// were pulled, for logging.
pub fn run_resync_for_peer<T: ResyncTransport>(
    transport: &T,
    handler: &TimerHandler,
    peer: &str,
    local: &NodeAddress,
    local_view_id: u64,
    now: u32,
) -> Result<usize, ResyncError> {
    let mut pulled = 0usize;
    let mut more = true;

    while more {
        let query = ResyncRequest {
            node_for_replicas: local.clone(),
            time_from: now,
            cluster_view_id: local_view_id,
            max_page: chronos_handler::MAX_TIMERS_IN_RESPONSE,
        };
        let response = transport.fetch_page(peer, &query)?;
        more = response.more;
        chronos_http::Metrics::global().resync_pages_pulled_total.inc();

        let mut references = Vec::new();
        for entry in response.page.timers {
            let Some(id) = TimerId::from_hex16(&entry.timer_id) else {
                warn!(
                    timer_id = %entry.timer_id,
                    "CL_CHRONOS_RESYNC_ERROR: peer sent an unparsable timer id"
                );
                continue;
            };

            let json = entry.timer.with_replica_index(RESYNC_REPLICA_INDEX_MARKER);
            let winner = match handler.apply_write(json, id) {
                Ok(winner) => winner,
                Err(err) => {
                    warn!(
                        timer_id = %entry.timer_id,
                        error = %err,
                        "CL_CHRONOS_RESYNC_ERROR: failed to merge resync entry"
                    );
                    continue;
                }
            };
            pulled += 1;

            if let Some(index) = winner.replicas.iter().position(|r| r == local) {
                references.push(ReplicaReference {
                    id: entry.timer_id,
                    replica_index: index as u32,
                });
            }
        }

        if !references.is_empty() {
            let body = DeleteReferencesBody { ids: references };
            if let Err(err) = transport.delete_references(peer, &body) {
                warn!(
                    peer,
                    error = %err,
                    "CL_CHRONOS_RESYNC_ERROR: failed to report replica references back to peer"
                );
            }
        }
    }

    Ok(pulled)
}

/// Runs resync against every peer in `old_peers` (the previous cluster
/// view, minus `local`), bounded to `max_concurrency` peers in flight at
/// once. A peer failing does not stop the others (spec.md §7
/// `PeerUnreachable`: "logged, counted, not retried at the operation
/// level").
pub fn run_resync<T: ResyncTransport>(
    transport: &T,
    handler: &TimerHandler,
    old_peers: &[NodeAddress],
    local: &NodeAddress,
    local_view_id: u64,
    now: u32,
    max_concurrency: usize,
) {
    let max_concurrency = max_concurrency.max(1);
    let (permit_tx, permit_rx) = bounded::<()>(max_concurrency);
    for _ in 0..max_concurrency {
        permit_tx.send(()).expect("permit channel was just created");
    }

    thread::scope(|scope| {
        for peer in old_peers {
            if peer == local {
                continue;
            }
            let permit_tx = permit_tx.clone();
            let permit_rx = permit_rx.clone();

            scope.spawn(move || {
                let _permit = permit_rx.recv().expect("a permit is always returned by its holder");

                match run_resync_for_peer(transport, handler, peer.as_str(), local, local_view_id, now) {
                    Ok(count) if count > 0 => {
                        debug!(peer = peer.as_str(), count, "resync pulled timers from peer");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(
                            peer = peer.as_str(),
                            error = %err,
                            "CL_CHRONOS_RESYNC_ERROR: resync against peer failed"
                        );
                    }
                }

                let _ = permit_tx.send(());
            });
        }
    });
}

/// The per-request timeout a [`crate::transport::ReqwestResyncTransport`]
/// should use (spec.md §6 "Resync paging has a per-request timeout").
pub const RESYNC_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
