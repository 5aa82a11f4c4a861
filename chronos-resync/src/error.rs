use thiserror::Error;

/// Errors from one peer's resync exchange (spec.md §4.8, §7 `PeerUnreachable`).
/// None of these abort the overall driver — a failing peer is logged and
/// skipped; the next cluster-config change retries it.
#[derive(Debug, Error)]
pub enum ResyncError {
    #[error("peer {peer} unreachable during resync: {source}")]
    PeerUnreachable {
        peer: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("peer {peer} returned unexpected status {status} for a resync page")]
    UnexpectedStatus { peer: String, status: u16 },

    #[error("peer {peer} sent an undecodable resync page: {source}")]
    Decode {
        peer: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("peer {peer} rejected the DELETE /timers/references report: {source}")]
    ReferenceReportFailed {
        peer: String,
        #[source]
        source: reqwest::Error,
    },
}
