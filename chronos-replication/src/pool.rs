//! A generic worker-pool over an unbounded job queue, shared by the
//! replicator (spec.md §4.7) and the callback pipeline (spec.md §4.6).
//!
//! Generalizes the teacher's `CoreRuntime` spawn-loop-join lifecycle away
//! from per-core stream routing and toward N identical workers draining one
//! shared queue (SPEC_FULL.md §5.1). Unlike a `CoreRuntime` inbox, there is
//! no backpressure: the queue is unbounded and closed by dropping every
//! `Sender`, which is exactly what `shutdown` does.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};

/// A pool of `worker_count` threads, each built from `build_state` once at
/// spawn time and then running `work` for every job received until the
/// queue's senders are all dropped (spec.md §4.6/§4.7: "terminate the
/// queue; workers drain and exit").
pub struct WorkerPool<J> {
    sender: Sender<J>,
    handles: Vec<JoinHandle<()>>,
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Spawns `worker_count` named threads (`"<name>-<i>"`). `build_state` is
    /// called once per worker thread — the natural place for a per-worker
    /// resource such as an HTTP client (spec.md §6.1: "one client constructed
    /// per worker thread"). `work` processes one job against that state.
    pub fn spawn<S, Build, Work>(name: &str, worker_count: usize, build_state: Build, work: Work) -> Self
    where
        S: 'static,
        Build: Fn() -> S + Send + Sync + 'static,
        Work: Fn(&S, J) + Send + Sync + 'static,
    {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = unbounded::<J>();
        let build_state = std::sync::Arc::new(build_state);
        let work = std::sync::Arc::new(work);

        let handles = (0..worker_count)
            .map(|i| {
                let receiver = receiver.clone();
                let build_state = std::sync::Arc::clone(&build_state);
                let work = std::sync::Arc::clone(&work);
                thread::Builder::new()
                    .name(format!("{name}-{i}"))
                    .spawn(move || {
                        let state = build_state();
                        while let Ok(job) = receiver.recv() {
                            work(&state, job);
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self { sender, handles }
    }

    /// A cloneable handle jobs are submitted through.
    pub fn sender(&self) -> Sender<J> {
        self.sender.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Drops the pool's own sender and joins every worker thread. Callers
    /// that cloned a [`Sender`] elsewhere (e.g. the handler) must drop their
    /// copies too, or workers will never observe the channel closing.
    pub fn shutdown(self) {
        drop(self.sender);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}
