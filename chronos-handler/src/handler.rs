//! The timer handler: merges incoming writes against stored state, drives
//! the pop loop, tracks replica acknowledgement, and answers the resync
//! server-side query (spec.md §4.2–§4.5, §4.8).

use std::sync::{Arc, Mutex, MutexGuard};

use chronos_cluster::{ClusterMembership, ClusterView};
use chronos_replicas::{self, ReplicaResolution};
use chronos_store::TimerStore;
use chronos_types::{NodeAddress, ResyncEntry, Timer, TimerId, TimerJson, TimerPair};
use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::HandlerError;
use crate::merge;
use crate::replication_job::ReplicationJob;
use crate::resync::{self, ResyncOutcome, ResyncQuery};

/// Default replication factor when the process config doesn't override it
/// (spec.md §3 "replicas: ... length = configured replication factor").
pub const DEFAULT_REPLICATION_FACTOR: usize = 3;

/// The owning handle for the single in-process [`TimerHandler`]. Shared via
/// `Arc` with the HTTP front-end, the pop loop, and (via `Weak`, spec.md §9)
/// the callback worker pool.
pub struct TimerHandler {
    store: Mutex<TimerStore>,
    cluster: Arc<ClusterMembership>,
    clock: Arc<dyn Clock>,
    replication_factor: usize,
    replication_tx: Sender<ReplicationJob>,
    callback_tx: Sender<TimerPair>,
}

impl TimerHandler {
    pub fn new(
        cluster: Arc<ClusterMembership>,
        clock: Arc<dyn Clock>,
        replication_factor: usize,
        replication_tx: Sender<ReplicationJob>,
        callback_tx: Sender<TimerPair>,
    ) -> Self {
        Self {
            store: Mutex::new(TimerStore::new()),
            cluster,
            clock,
            replication_factor,
            replication_tx,
            callback_tx,
        }
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, TimerStore>, HandlerError> {
        self.store.lock().map_err(|_| HandlerError::LockPoisoned)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn cluster(&self) -> &Arc<ClusterMembership> {
        &self.cluster
    }

    pub fn store_len(&self) -> usize {
        self.store.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Resolves a timer's replica set for the current view, honouring the
    /// open question in spec.md §9.1: a client-supplied `replicas` list is
    /// advisory only if it agrees with the local rendezvous computation;
    /// otherwise it is discarded and recomputed, with a trace event marking
    /// the discrepancy.
    fn resolve_replicas(
        &self,
        view: &ClusterView,
        id: TimerId,
        client_replicas: Option<Vec<NodeAddress>>,
        old_replicas: &[NodeAddress],
    ) -> ReplicaResolution {
        let computed = chronos_replicas::resolve(view, id, self.replication_factor, old_replicas);

        if let Some(claimed) = client_replicas {
            if claimed == computed.replicas {
                return computed;
            }
            warn!(
                timer_id = u64::from(id),
                "REPLICAS_OVERRIDE_DISCARDED: client-supplied replicas disagree with rendezvous"
            );
        }

        computed
    }

    /// Applies an incoming client or peer write (spec.md §4.2, §4.9 `POST`
    /// / `PUT`). Returns the timer as it was merged (the winner — which may
    /// be the pre-existing record if the incoming update lost).
    pub fn apply_write(&self, json: TimerJson, id: TimerId) -> Result<Timer, HandlerError> {
        let view = self.cluster.snapshot();
        let local = view.localhost.clone();
        let peer_origin = json.is_peer_origin();

        let mut store = self.lock_store()?;
        let existing_pair = store.peek(id).cloned();
        let old_replicas = existing_pair
            .as_ref()
            .map(|p| p.active_timer.replicas.clone())
            .unwrap_or_default();

        let resolution =
            self.resolve_replicas(&view, id, json.client_replicas(), &old_replicas);
        let incoming = json.into_timer(
            id,
            resolution.replicas.clone(),
            resolution.extra_replicas.clone(),
            resolution.cluster_view_id,
        );

        let outcome = merge::decide(existing_pair.as_ref().map(|p| &p.active_timer), &incoming);
        merge::trace(u64::from(id), outcome);

        if !outcome.incoming_wins() {
            drop(store);
            return Ok(existing_pair
                .map(|p| p.active_timer)
                .unwrap_or(incoming));
        }

        if existing_pair.is_some() {
            store.fetch(id);
        }

        let stored_timer = if resolution.is_primary(&local) {
            incoming.clone()
        } else {
            incoming.clone().into_tombstone()
        };

        let pair = build_pair(existing_pair, stored_timer, &resolution);
        store.insert(pair).map_err(HandlerError::from)?;
        drop(store);

        if !peer_origin {
            self.fan_out_replication(&incoming, &local);
        }

        Ok(incoming)
    }

    /// Converts a client `DELETE` into a tombstone write (spec.md §4.2,
    /// §4.9). Goes through the same merge path as any other update, so a
    /// late-arriving non-tombstone write for the same id is still subject
    /// to ordering.
    pub fn apply_delete(&self, id: TimerId) -> Result<Timer, HandlerError> {
        let view = self.cluster.snapshot();
        let local = view.localhost.clone();
        let now = self.clock.now_ms();

        let mut store = self.lock_store()?;
        let existing_pair = store.peek(id).cloned();
        let old_replicas = existing_pair
            .as_ref()
            .map(|p| p.active_timer.replicas.clone())
            .unwrap_or_default();

        let resolution = self.resolve_replicas(&view, id, None, &old_replicas);
        let incoming = Timer::new_tombstone(
            id,
            now,
            resolution.replicas.clone(),
            resolution.extra_replicas.clone(),
            resolution.cluster_view_id,
        );

        let outcome = merge::decide(existing_pair.as_ref().map(|p| &p.active_timer), &incoming);
        merge::trace(u64::from(id), outcome);

        if !outcome.incoming_wins() {
            drop(store);
            return Ok(existing_pair
                .map(|p| p.active_timer)
                .unwrap_or(incoming));
        }

        if existing_pair.is_some() {
            store.fetch(id);
        }

        let pair = build_pair(existing_pair, incoming.clone(), &resolution);
        store.insert(pair).map_err(HandlerError::from)?;
        drop(store);

        self.fan_out_replication(&incoming, &local);
        Ok(incoming)
    }

    /// One pop-loop tick (spec.md §4.5): drains every timer whose
    /// next-pop-time has passed and, for each, either enqueues it to the
    /// callback pipeline (local primary, non-tombstone) or lets it age out.
    pub fn pop_tick(&self) -> Result<usize, HandlerError> {
        let now = self.clock.now_ms();
        let due = {
            let mut store = self.lock_store()?;
            store.fetch_next_timers(now)
        };

        let view = self.cluster.snapshot();
        let mut dispatched = 0;
        for pair in due {
            if pair.active_timer.tombstone {
                debug!(timer_id = u64::from(pair.active_timer.id), "tombstone aged out");
                continue;
            }
            if pair.active_timer.is_local(&view.localhost) {
                if self.callback_tx.send(pair).is_err() {
                    warn!("callback queue is closed; dropping due timer");
                }
                dispatched += 1;
            } else {
                warn!(
                    timer_id = u64::from(pair.active_timer.id),
                    "non-local, non-tombstone timer reached the pop loop — dropping"
                );
            }
        }
        Ok(dispatched)
    }

    /// Called by a callback worker *before* sending the HTTP POST (spec.md
    /// §4.6: "this ordering is essential"). Computes the next occurrence
    /// (or a fresh tombstone if the repeat window is exhausted) and
    /// re-inserts it, preserving any retained `information_timer`. Returns
    /// the fired occurrence — the data the worker needs for the callback.
    pub fn return_timer(&self, pair: TimerPair) -> Result<Timer, HandlerError> {
        let fired = pair.active_timer.clone();
        let now = self.clock.now_ms();

        let mut next = fired.clone();
        next.sequence_number = fired.sequence_number.wrapping_add(1);
        let next = if next.should_repeat() {
            next
        } else {
            Timer::new_tombstone(
                fired.id,
                now,
                fired.replicas.clone(),
                fired.extra_replicas.clone(),
                fired.cluster_view_id,
            )
        };

        let mut store = self.lock_store()?;
        let new_pair = TimerPair {
            active_timer: next,
            information_timer: pair.information_timer,
        };
        store.insert(new_pair).map_err(HandlerError::from)?;
        Ok(fired)
    }

    /// Called on a 2xx callback response (spec.md §4.6): replicates the
    /// re-inserted record to its replicas.
    pub fn handle_successful_callback(&self, id: TimerId) -> Result<(), HandlerError> {
        let view = self.cluster.snapshot();
        let local = view.localhost.clone();

        let current = {
            let store = self.lock_store()?;
            store.peek(id).map(|p| p.active_timer.clone())
        };

        if let Some(timer) = current {
            self.fan_out_replication(&timer, &local);
        }
        Ok(())
    }

    /// Called on any non-2xx callback outcome (spec.md §4.6, §7
    /// `CallbackFailure`): removes the timer from the store entirely.
    pub fn handle_failed_callback(&self, id: TimerId) -> Result<(), HandlerError> {
        let mut store = self.lock_store()?;
        store.fetch(id);
        Ok(())
    }

    /// `DELETE /timers/references` (spec.md §4.3): marks replica
    /// `replica_index` (and all lower indices) as having accepted the
    /// timer, dropping the retained `information_timer` once every
    /// replica has been told.
    pub fn update_replica_tracker(&self, id: TimerId, replica_index: u32) -> Result<(), HandlerError> {
        let mut store = self.lock_store()?;
        let Some(mut pair) = store.fetch(id) else {
            return Ok(());
        };

        pair.active_timer.mark_replicas_up_to_acked(replica_index as usize);
        if let Some(info) = pair.information_timer.as_mut() {
            info.mark_replicas_up_to_acked(replica_index as usize);
        }
        pair.drop_information_timer_if_acked();

        store.insert(pair).map_err(HandlerError::from)?;
        Ok(())
    }

    /// Server side of `GET /timers` (spec.md §4.8, §4.9): walks
    /// `view_index` for every view different from the requester's, keeps
    /// only timers whose rendezvous set under the *current* view would
    /// include `query.requester`, and pages the result.
    pub fn server_resync(&self, query: &ResyncQuery) -> Result<ResyncOutcome, HandlerError> {
        let view = self.cluster.snapshot();
        let store = self.lock_store()?;

        let mut candidates: Vec<(TimerId, TimerPair)> = Vec::new();
        for view_id in store.view_ids_except(query.requester_view_id) {
            for id in store.ids_for_view(view_id) {
                let Some(pair) = store.peek(id) else { continue };
                if resync::expired_as_of(&pair.active_timer, query.time_from) {
                    continue;
                }
                let replicas =
                    chronos_replicas::rendezvous_replicas(&view, id, self.replication_factor);
                if replicas.contains(&query.requester) {
                    candidates.push((id, pair.clone()));
                }
            }
        }
        drop(store);

        candidates.sort_by_key(|(id, _)| *id);
        let page_size = query.max_page.min(resync::MAX_TIMERS_IN_RESPONSE).max(1);
        let more = candidates.len() > page_size;
        let timers = candidates
            .into_iter()
            .take(page_size)
            .map(|(id, pair)| ResyncEntry {
                timer_id: id.to_hex16(),
                old_replicas: pair.active_timer.replicas.iter().map(ToString::to_string).collect(),
                timer: TimerJson::from_timer(&pair.active_timer),
            })
            .collect();

        Ok(ResyncOutcome {
            page: chronos_types::ResyncPage { timers },
            more,
        })
    }

    /// Replicates `timer` to every node in `replicas`/`extra_replicas`
    /// except `local` (spec.md §4.7). The wire body carries the sender's
    /// index into `replicas` via `ReplicaIndex` so the receiver treats it
    /// as peer-origin and does not re-replicate (spec.md §4.7).
    fn fan_out_replication(&self, timer: &Timer, local: &NodeAddress) {
        let hash = chronos_replicas::replica_hash(&timer.replicas);

        for (index, replica) in timer.replicas.iter().enumerate() {
            if replica == local {
                continue;
            }
            let body = TimerJson::from_timer(timer)
                .with_replica_index(index as u32)
                .to_vec();
            let job = ReplicationJob {
                target: replica.to_string(),
                replica_index: index as u32,
                timer_id: timer.id,
                replica_hash: hash,
                body,
            };
            if self.replication_tx.send(job).is_err() {
                warn!("replication queue is closed; dropping replication job");
            }
        }

        for replica in &timer.extra_replicas {
            if replica == local || timer.replicas.contains(replica) {
                continue;
            }
            // Marked peer-origin (spec.md §4.7) even though there's no
            // meaningful index into `replicas` for a node that is leaving
            // the replica set — this only has to stop the receiver from
            // re-fanning the write out.
            let body = TimerJson::from_timer(timer)
                .with_replica_index(u32::MAX)
                .to_vec();
            let job = ReplicationJob {
                target: replica.to_string(),
                replica_index: u32::MAX,
                timer_id: timer.id,
                replica_hash: hash,
                body,
            };
            if self.replication_tx.send(job).is_err() {
                warn!("replication queue is closed; dropping replication job");
            }
        }
    }
}

/// Builds the `TimerPair` to store: carries forward `information_timer`
/// from the prior record, or starts one when a cluster-view transition
/// just introduced `extra_replicas` that still need telling (spec.md §3,
/// §4.3).
fn build_pair(existing: Option<TimerPair>, stored: Timer, resolution: &ReplicaResolution) -> TimerPair {
    match existing {
        Some(old) if old.information_timer.is_some() => TimerPair {
            active_timer: stored,
            information_timer: old.information_timer,
        },
        Some(old) if !resolution.extra_replicas.is_empty() => {
            TimerPair::with_information_timer(stored, old.active_timer)
        }
        Some(_) | None => TimerPair::new(stored),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronos_cluster::ClusterFileConfig;
    use chronos_types::{CallbackJson, HttpCallbackJson, ReliabilityJson, TimingJson};
    use crossbeam_channel::{unbounded, Receiver};

    use crate::clock::FakeClock;

    fn cluster(localhost: &str, nodes: &[&str]) -> Arc<ClusterMembership> {
        let cfg = ClusterFileConfig {
            localhost: localhost.to_string(),
            nodes: nodes.iter().map(|s| s.to_string()).collect(),
            leaving: vec![],
        };
        Arc::new(ClusterMembership::new(ClusterView::from_file_config(&cfg)))
    }

    fn wire(start: u32, seq: u32, interval: u32, repeat_for: u32) -> TimerJson {
        TimerJson {
            timing: TimingJson {
                start_time: start,
                sequence_number: seq,
                interval,
                repeat_for,
            },
            callback: CallbackJson {
                http: HttpCallbackJson {
                    uri: "http://sub.example.test/cb".to_string(),
                    opaque: "payload".to_string(),
                },
            },
            reliability: ReliabilityJson {
                replicas: None,
                cluster_view_id: None,
                replica_count: None,
            },
            replica_index: None,
        }
    }

    struct TestHandler {
        handler: Arc<TimerHandler>,
        clock: Arc<FakeClock>,
        rep_rx: Receiver<ReplicationJob>,
        cb_rx: Receiver<TimerPair>,
    }

    fn make_handler(localhost: &str, nodes: &[&str]) -> TestHandler {
        let (rep_tx, rep_rx) = unbounded();
        let (cb_tx, cb_rx) = unbounded();
        let clock = Arc::new(FakeClock::new(0));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let handler = Arc::new(TimerHandler::new(
            cluster(localhost, nodes),
            dyn_clock,
            nodes.len().min(3),
            rep_tx,
            cb_tx,
        ));
        TestHandler { handler, clock, rep_rx, cb_rx }
    }

    /// S1 — single-shot pop (spec.md §8).
    #[test]
    fn s1_single_shot_pop_fires_once_and_is_removed() {
        let t = make_handler("only-node:1", &["only-node:1"]);
        let id = TimerId::new(1);
        t.handler.apply_write(wire(0, 0, 100, 100), id).unwrap();
        assert_eq!(t.handler.store_len(), 1);

        t.clock.set(150);
        let dispatched = t.handler.pop_tick().unwrap();
        assert_eq!(dispatched, 1);
        let fired = t.cb_rx.try_recv().unwrap();
        assert_eq!(fired.active_timer.sequence_number, 0);

        let snapshot = t.handler.return_timer(fired).unwrap();
        assert_eq!(snapshot.sequence_number, 0);
        // The next generation (seq=1) checks (1+1)*100=200 > 100, so it is
        // tombstoned rather than rescheduled, but still occupies a slot.
        assert_eq!(t.handler.store_len(), 1);
    }

    /// S2 — repeat: interval=100, repeat_for=350 -> 3 callbacks then
    /// tombstone (spec.md §8).
    #[test]
    fn s2_repeats_three_times_then_tombstones() {
        let t = make_handler("only-node:1", &["only-node:1"]);
        let id = TimerId::new(2);
        t.handler.apply_write(wire(0, 0, 100, 350), id).unwrap();

        let mut fired_seqs = vec![];
        for now in [150u32, 250, 350] {
            t.clock.set(now);
            t.handler.pop_tick().unwrap();
            let pair = t.cb_rx.try_recv().expect("callback expected");
            fired_seqs.push(pair.active_timer.sequence_number);
            t.handler.return_timer(pair).unwrap();
        }
        assert_eq!(fired_seqs, vec![0, 1, 2]);

        // A fourth tick should find nothing live to pop (record is now a
        // tombstone scheduled far in the future).
        t.clock.set(360);
        assert_eq!(t.handler.pop_tick().unwrap(), 0);
    }

    /// S3 — overwrite by later start (spec.md §8).
    #[test]
    fn s3_overwrite_by_later_start_wins() {
        let t = make_handler("only-node:1", &["only-node:1"]);
        let id = TimerId::new(3);
        t.handler.apply_write(wire(1_000, 0, 100, 1_000), id).unwrap();
        let winner = t.handler.apply_write(wire(2_000, 0, 100, 1_000), id).unwrap();
        assert_eq!(winner.start_time_mono_ms, 2_000);
    }

    /// S4 — older-in-sequence discard (spec.md §8).
    #[test]
    fn s4_older_in_sequence_is_discarded() {
        let t = make_handler("only-node:1", &["only-node:1"]);
        let id = TimerId::new(4);
        t.handler.apply_write(wire(1_000, 5, 100, 10_000), id).unwrap();
        let result = t.handler.apply_write(wire(1_000, 3, 100, 10_000), id).unwrap();
        assert_eq!(result.sequence_number, 5);
    }

    /// S5 — replica fan-out on client write (spec.md §8): a 3-node
    /// cluster's client write enqueues replication jobs to the other
    /// replicas chosen by rendezvous.
    #[test]
    fn s5_client_write_fans_out_to_other_replicas() {
        let t = make_handler("node-1:7253", &["node-1:7253", "node-2:7253", "node-3:7253"]);
        let id = TimerId::new(555);
        let winner = t.handler.apply_write(wire(0, 0, 100, 1_000), id).unwrap();

        let jobs: Vec<ReplicationJob> = t.rep_rx.try_iter().collect();
        assert_eq!(jobs.len(), winner.replicas.len() - 1);
        for job in &jobs {
            assert_ne!(job.target, "node-1:7253");
        }
    }

    /// Peer-origin writes are not re-replicated (spec.md §4.7).
    #[test]
    fn peer_origin_write_does_not_re_replicate() {
        let t = make_handler("node-1:7253", &["node-1:7253", "node-2:7253", "node-3:7253"]);
        let mut body = wire(0, 0, 100, 1_000);
        body.replica_index = Some(1);
        t.handler.apply_write(body, TimerId::new(9)).unwrap();
        assert!(t.rep_rx.try_recv().is_err());
    }

    /// DELETE /timers/references clears the information_timer once every
    /// replica is acked (spec.md §4.3).
    #[test]
    fn replica_tracker_update_is_a_no_op_without_a_view_transition() {
        let t = make_handler("node-1:7253", &["node-1:7253", "node-2:7253"]);
        let id = TimerId::new(77);
        t.handler.apply_write(wire(0, 0, 100, 1_000), id).unwrap();
        t.handler.update_replica_tracker(id, 1).unwrap();
        // No information_timer was ever created here (no view transition),
        // so this is a no-op that must not panic or drop the live record.
        assert_eq!(t.handler.store_len(), 1);
    }

    /// Client `DELETE` is applied as a tombstone write that still fans out
    /// to the other replicas (spec.md §4.2, §4.9).
    #[test]
    fn apply_delete_tombstones_and_replicates() {
        let t = make_handler("node-1:7253", &["node-1:7253", "node-2:7253"]);
        let id = TimerId::new(321);
        t.handler.apply_write(wire(0, 0, 100, 1_000), id).unwrap();
        t.rep_rx.try_iter().for_each(drop);

        let tombstoned = t.handler.apply_delete(id).unwrap();
        assert!(tombstoned.tombstone);
        assert!(t.rep_rx.try_recv().is_ok());
    }

    /// Server-side resync (spec.md §4.8, S6): a timer inserted under a
    /// stale view is handed back only to a requester whose address
    /// currently belongs to its rendezvous set.
    #[test]
    fn server_resync_returns_timers_for_a_new_replica() {
        let t = make_handler("node-1:7253", &["node-1:7253", "node-2:7253", "node-3:7253"]);
        let id = TimerId::new(4242);
        let winner = t.handler.apply_write(wire(0, 0, 100, 10_000), id).unwrap();

        // Ask on behalf of every node in the cluster and confirm the union
        // of returned pages is exactly the current replica set.
        let mut found_for: Vec<NodeAddress> = Vec::new();
        for node in ["node-1:7253", "node-2:7253", "node-3:7253"] {
            let query = ResyncQuery {
                requester: NodeAddress::new(node),
                requester_view_id: winner.cluster_view_id.wrapping_add(1),
                time_from: 0,
                max_page: 10,
            };
            let outcome = t.handler.server_resync(&query).unwrap();
            if !outcome.page.timers.is_empty() {
                found_for.push(NodeAddress::new(node));
            }
            assert!(!outcome.more);
        }
        assert_eq!(found_for.len(), winner.replicas.len());
    }

    /// A requester whose view already matches the stored timer's view is
    /// never handed that timer back (spec.md §4.8: "walks `view_index`
    /// for all keys different from the requester's").
    #[test]
    fn server_resync_skips_timers_already_in_the_requesters_view() {
        let t = make_handler("node-1:7253", &["node-1:7253", "node-2:7253"]);
        let id = TimerId::new(7);
        let winner = t.handler.apply_write(wire(0, 0, 100, 10_000), id).unwrap();

        let query = ResyncQuery {
            requester: NodeAddress::new("node-2:7253"),
            requester_view_id: winner.cluster_view_id,
            time_from: 0,
            max_page: 10,
        };
        let outcome = t.handler.server_resync(&query).unwrap();
        assert!(outcome.page.timers.is_empty());
    }
}
