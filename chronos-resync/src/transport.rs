//! The wire side of resync (spec.md §4.8): paged `GET /timers` against an
//! old peer and the follow-up `DELETE /timers/references` report. Kept
//! behind a trait so the driver in `driver.rs` can be exercised without
//! real sockets, the same way `chronos_handler::Clock` decouples the pop
//! loop from wall-clock time.

use std::time::Duration;

use chronos_types::{DeleteReferencesBody, NodeAddress, ResyncPage};

use crate::error::ResyncError;

/// One `GET /timers` query (spec.md §4.8: `node-for-replicas`, `time-from`,
/// `cluster-view-id`, and the `Range` header for page size).
#[derive(Debug, Clone)]
pub struct ResyncRequest {
    pub node_for_replicas: NodeAddress,
    pub time_from: u32,
    pub cluster_view_id: u64,
    pub max_page: usize,
}

/// A decoded page plus whether the peer has more to send (spec.md §4.8:
/// `200` on the last page, `206` otherwise).
#[derive(Debug, Clone)]
pub struct ResyncPageResponse {
    pub page: ResyncPage,
    pub more: bool,
}

/// Abstracts the HTTP calls the resync driver makes against an old peer.
pub trait ResyncTransport: Send + Sync {
    fn fetch_page(&self, peer: &str, query: &ResyncRequest) -> Result<ResyncPageResponse, ResyncError>;

    fn delete_references(&self, peer: &str, body: &DeleteReferencesBody) -> Result<(), ResyncError>;
}

/// The production transport, one [`reqwest::blocking::Client`] shared
/// across every peer the driver talks to within a single resync run.
pub struct ReqwestResyncTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestResyncTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client builds with default TLS backend"),
        }
    }
}

impl ResyncTransport for ReqwestResyncTransport {
    fn fetch_page(&self, peer: &str, query: &ResyncRequest) -> Result<ResyncPageResponse, ResyncError> {
        let url = format!(
            "http://{peer}/timers?node-for-replicas={}&time-from={}&cluster-view-id={}",
            query.node_for_replicas, query.time_from, query.cluster_view_id
        );

        let resp = self
            .client
            .get(&url)
            .header("Range", query.max_page.to_string())
            .send()
            .map_err(|source| ResyncError::PeerUnreachable { peer: peer.to_string(), source })?;

        let more = match resp.status().as_u16() {
            200 => false,
            206 => true,
            status => return Err(ResyncError::UnexpectedStatus { peer: peer.to_string(), status }),
        };

        let bytes = resp
            .bytes()
            .map_err(|source| ResyncError::PeerUnreachable { peer: peer.to_string(), source })?;
        let page: ResyncPage = serde_json::from_slice(&bytes)
            .map_err(|source| ResyncError::Decode { peer: peer.to_string(), source })?;

        Ok(ResyncPageResponse { page, more })
    }

    fn delete_references(&self, peer: &str, body: &DeleteReferencesBody) -> Result<(), ResyncError> {
        let url = format!("http://{peer}/timers/references");
        let payload = serde_json::to_vec(body).expect("DeleteReferencesBody always serializes");

        self.client
            .delete(&url)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .map_err(|source| ResyncError::ReferenceReportFailed { peer: peer.to_string(), source })?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chronos_types::ReplicaReference;

    /// A transport double that hands back one fixed page and records the
    /// reference report it received, so `driver.rs` tests never touch a
    /// real socket.
    #[derive(Default)]
    pub struct FakeTransport {
        pub pages: std::sync::Mutex<std::collections::VecDeque<ResyncPageResponse>>,
        pub reported: std::sync::Mutex<Vec<DeleteReferencesBody>>,
    }

    impl ResyncTransport for FakeTransport {
        fn fetch_page(&self, _peer: &str, _query: &ResyncRequest) -> Result<ResyncPageResponse, ResyncError> {
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ResyncError::UnexpectedStatus { peer: "test".to_string(), status: 0 })
        }

        fn delete_references(&self, _peer: &str, body: &DeleteReferencesBody) -> Result<(), ResyncError> {
            self.reported.lock().unwrap().push(body.clone());
            Ok(())
        }
    }

    #[test]
    fn fake_transport_reports_what_it_receives() {
        let fake = FakeTransport::default();
        fake.pages.lock().unwrap().push_back(ResyncPageResponse {
            page: ResyncPage::default(),
            more: false,
        });
        let body = DeleteReferencesBody {
            ids: vec![ReplicaReference { id: "a".to_string(), replica_index: 1 }],
        };
        fake.delete_references("peer", &body).unwrap();
        assert_eq!(fake.reported.lock().unwrap().len(), 1);
    }
}
