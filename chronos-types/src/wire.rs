//! Wire JSON shapes (spec.md §6) and the codec between them and [`Timer`].
//!
//! The wire format is deliberately decoupled from [`Timer`]: decoding a
//! [`TimerJson`] yields every field the client/peer sent, but `replicas`
//! may be absent (compute from rendezvous) or merely *advisory* (spec.md
//! §9.1) — resolving that is `chronos-handler`'s job, not this crate's.

use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::ids::{NodeAddress, TimerId};
use crate::timer::Timer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingJson {
    #[serde(rename = "start-time")]
    pub start_time: u32,
    #[serde(rename = "sequence-number")]
    pub sequence_number: u32,
    pub interval: u32,
    #[serde(rename = "repeat-for")]
    pub repeat_for: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCallbackJson {
    pub uri: String,
    /// Opaque client payload, carried verbatim in the POST body.
    pub opaque: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackJson {
    pub http: HttpCallbackJson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<Vec<String>>,
    #[serde(rename = "cluster-view-id", default, skip_serializing_if = "Option::is_none")]
    pub cluster_view_id: Option<String>,
    #[serde(rename = "replica-count", default, skip_serializing_if = "Option::is_none")]
    pub replica_count: Option<u32>,
}

/// The full wire shape of a timer, as posted/put/replicated (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerJson {
    pub timing: TimingJson,
    pub callback: CallbackJson,
    #[serde(default)]
    pub reliability: ReliabilityJson,
    /// Present only on peer-origin writes; marks the sender's index into
    /// `replicas` and tells the handler not to re-replicate (spec.md §4.7).
    #[serde(rename = "ReplicaIndex", default, skip_serializing_if = "Option::is_none")]
    pub replica_index: Option<u32>,
}

impl TimerJson {
    pub fn from_slice(body: &[u8]) -> Result<Self, TypesError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Whether this write carries the peer-origin marker (spec.md §4.7).
    pub fn is_peer_origin(&self) -> bool {
        self.replica_index.is_some()
    }

    /// The client-supplied replica list, if any (spec.md §9.1: advisory,
    /// not authoritative).
    pub fn client_replicas(&self) -> Option<Vec<NodeAddress>> {
        self.reliability
            .replicas
            .as_ref()
            .map(|list| list.iter().map(|s| NodeAddress::new(s.as_str())).collect())
    }

    /// Builds the wire JSON for an in-memory [`Timer`], e.g. for
    /// replication or a client response body.
    pub fn from_timer(timer: &Timer) -> Self {
        Self {
            timing: TimingJson {
                start_time: timer.start_time_mono_ms,
                sequence_number: timer.sequence_number,
                interval: timer.interval_ms,
                repeat_for: timer.repeat_for_ms,
            },
            callback: CallbackJson {
                http: HttpCallbackJson {
                    uri: timer.callback_url.clone(),
                    opaque: String::from_utf8_lossy(&timer.callback_body).into_owned(),
                },
            },
            reliability: ReliabilityJson {
                replicas: Some(timer.replicas.iter().map(ToString::to_string).collect()),
                cluster_view_id: Some(timer.cluster_view_id.to_string()),
                replica_count: Some(timer.replicas.len() as u32),
            },
            replica_index: None,
        }
    }

    /// Marks this wire body as peer-origin at the given replica index,
    /// used by the replicator when fanning out to peers.
    pub fn with_replica_index(mut self, index: u32) -> Self {
        self.replica_index = Some(index);
        self
    }

    pub fn to_vec(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("TimerJson always serializes")
    }

    /// Materializes a [`Timer`] given the id and the already-resolved
    /// replica set / cluster-view-id (spec.md §4.2's merge path is the only
    /// legitimate caller — this does not itself decide rendezvous vs.
    /// client-supplied replicas).
    pub fn into_timer(
        self,
        id: TimerId,
        replicas: Vec<NodeAddress>,
        extra_replicas: Vec<NodeAddress>,
        cluster_view_id: u64,
    ) -> Timer {
        Timer {
            id,
            start_time_mono_ms: self.timing.start_time,
            interval_ms: self.timing.interval,
            repeat_for_ms: self.timing.repeat_for,
            sequence_number: self.timing.sequence_number,
            callback_url: self.callback.http.uri,
            callback_body: self.callback.http.opaque.into_bytes(),
            replicas,
            extra_replicas,
            cluster_view_id,
            replica_tracker: 0,
            tombstone: false,
        }
    }
}

/// One entry in a `/timers` resync page response (spec.md §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncEntry {
    #[serde(rename = "TimerID")]
    pub timer_id: String,
    #[serde(rename = "OldReplicas")]
    pub old_replicas: Vec<String>,
    #[serde(rename = "Timer")]
    pub timer: TimerJson,
}

/// The body of a `GET /timers` resync page response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResyncPage {
    #[serde(rename = "Timers")]
    pub timers: Vec<ResyncEntry>,
}

/// One `{ID, ReplicaIndex}` entry in a `DELETE /timers/references` body
/// (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaReference {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "ReplicaIndex")]
    pub replica_index: u32,
}

/// The body of a `DELETE /timers/references` request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeleteReferencesBody {
    #[serde(rename = "IDs")]
    pub ids: Vec<ReplicaReference>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> Vec<u8> {
        br#"{
            "timing": {"start-time": 1000, "sequence-number": 0, "interval": 100, "repeat-for": 300},
            "callback": {"http": {"uri": "http://sub.example.test/cb", "opaque": "hello"}},
            "reliability": {"replicas": ["10.0.0.1:7253", "10.0.0.2:7253"], "cluster-view-id": "42", "replica-count": 2}
        }"#.to_vec()
    }

    #[test]
    fn decodes_full_shape() {
        let parsed = TimerJson::from_slice(&sample_json()).unwrap();
        assert_eq!(parsed.timing.start_time, 1000);
        assert_eq!(parsed.callback.http.uri, "http://sub.example.test/cb");
        assert_eq!(
            parsed.reliability.replicas.unwrap(),
            vec!["10.0.0.1:7253".to_string(), "10.0.0.2:7253".to_string()]
        );
        assert!(!parsed.is_peer_origin());
    }

    #[test]
    fn replica_index_marks_peer_origin() {
        let body = br#"{
            "timing": {"start-time": 0, "sequence-number": 0, "interval": 0, "repeat-for": 0},
            "callback": {"http": {"uri": "http://x", "opaque": ""}},
            "ReplicaIndex": 1
        }"#;
        let parsed = TimerJson::from_slice(body).unwrap();
        assert!(parsed.is_peer_origin());
        assert_eq!(parsed.replica_index, Some(1));
    }

    #[test]
    fn missing_reliability_defaults_to_none() {
        let body = br#"{
            "timing": {"start-time": 0, "sequence-number": 0, "interval": 0, "repeat-for": 0},
            "callback": {"http": {"uri": "http://x", "opaque": ""}}
        }"#;
        let parsed = TimerJson::from_slice(body).unwrap();
        assert!(parsed.reliability.replicas.is_none());
        assert!(parsed.client_replicas().is_none());
    }

    #[test]
    fn round_trips_through_timer() {
        let parsed = TimerJson::from_slice(&sample_json()).unwrap();
        let replicas = parsed.client_replicas().unwrap();
        let timer = parsed.into_timer(TimerId::new(7), replicas.clone(), vec![], 42);
        let back = TimerJson::from_timer(&timer);
        assert_eq!(back.timing.start_time, 1000);
        assert_eq!(back.reliability.replicas.unwrap(), vec!["10.0.0.1:7253".to_string(), "10.0.0.2:7253".to_string()]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(TimerJson::from_slice(b"not json").is_err());
    }
}
