//! The job type handed from [`crate::TimerHandler`] to the replicator
//! worker pool (spec.md §4.7). Defined here, not in `chronos-replication`,
//! so the handler crate has no dependency on the pool crate — the pool
//! depends on this type instead, keeping the data flow one-directional
//! (spec.md §9 "cyclic ownership").

use chronos_types::TimerId;

/// One outbound replication PUT: mirror `body` to `target` at the timer
/// URL computed from `timer_id` and `replica_hash` (spec.md §6 "Timer
/// URL").
#[derive(Debug, Clone)]
pub struct ReplicationJob {
    pub target: String,
    pub replica_index: u32,
    pub timer_id: TimerId,
    pub replica_hash: u64,
    pub body: Vec<u8>,
}

impl ReplicationJob {
    /// `http://<peer>/timers/<id_hex><replica_hash_hex>` (spec.md §4.7, §6).
    pub fn url(&self) -> String {
        format!(
            "http://{}/timers/{:016x}{:016x}",
            self.target,
            u64::from(self.timer_id),
            self.replica_hash
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_node_plus_id_plus_hash() {
        let job = ReplicationJob {
            target: "10.0.0.2:7253".to_string(),
            replica_index: 1,
            timer_id: TimerId::new(0x42),
            replica_hash: 0xabcd,
            body: vec![],
        };
        assert_eq!(
            job.url(),
            "http://10.0.0.2:7253/timers/0000000000000042000000000000abcd"
        );
    }

    #[test]
    fn url_has_expected_shape() {
        let job = ReplicationJob {
            target: "node-a:7253".to_string(),
            replica_index: 0,
            timer_id: TimerId::new(1),
            replica_hash: 2,
            body: vec![],
        };
        let url = job.url();
        assert!(url.starts_with("http://node-a:7253/timers/"));
        let hex = &url["http://node-a:7253/timers/".len()..];
        assert_eq!(hex.len(), 32);
    }
}
