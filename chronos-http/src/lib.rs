//! The mio-based HTTP/1.1 front-end (spec.md §4.9): the Timer API, the
//! resync API, and the health/readiness/metrics sidecar endpoints
//! (SPEC_FULL.md §4.10/§4.11), generalized from `kimberlite-server::http`'s
//! single-shot GET sidecar.

mod error;
mod health;
mod metrics;
mod request;
mod response;
mod routes;
mod server;

pub use error::HttpError;
pub use health::{HealthChecker, HealthResponse, HealthStatus};
pub use metrics::Metrics;
pub use response::HttpResponse;
pub use routes::AppState;
pub use server::HttpServer;
