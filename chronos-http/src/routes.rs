//! Dispatch for every endpoint in spec.md §4.9's Timer API table, plus the
//! health/readiness/metrics sidecar endpoints (SPEC_FULL.md §4.10/§4.11).

use std::sync::Arc;

use chronos_handler::{ResyncQuery, TimerHandler};
use chronos_replicas::replica_hash;
use chronos_types::{DeleteReferencesBody, NodeAddress, TimerId, TimerJson};
use rand::Rng;
use tracing::warn;

use crate::error::HttpError;
use crate::health::HealthChecker;
use crate::metrics::Metrics;
use crate::request::{Method, ParsedRequest};
use crate::response::HttpResponse;

/// Shared, request-independent state every route needs.
pub struct AppState {
    pub handler: Arc<TimerHandler>,
    pub health: Arc<HealthChecker>,
}

pub fn dispatch(state: &AppState, request: &ParsedRequest) -> HttpResponse {
    let response = route(state, request);
    match response {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

fn route(state: &AppState, request: &ParsedRequest) -> Result<HttpResponse, HttpError> {
    match (request.method, request.path.as_str()) {
        (Method::Post, "/timers") => post_timer(state, request),
        (Method::Get, "/timers") => get_timers(state, request),
        (_, "/timers") => Err(HttpError::MethodNotAllowed),

        (Method::Delete, "/timers/references") => delete_references(state, request),
        (_, "/timers/references") => Err(HttpError::MethodNotAllowed),

        (Method::Get, "/health") => Ok(health_response(state.health.liveness_check())),
        (_, "/health") => Err(HttpError::MethodNotAllowed),

        (Method::Get, "/ready") => Ok(health_response(state.health.readiness_check())),
        (_, "/ready") => Err(HttpError::MethodNotAllowed),

        (Method::Get, "/metrics") => Ok(HttpResponse::text(200, Metrics::global().render())),
        (_, "/metrics") => Err(HttpError::MethodNotAllowed),

        (Method::Put, path) if path.starts_with("/timers/") => put_timer(state, request),
        (Method::Delete, path) if path.starts_with("/timers/") => delete_timer(state, path),
        (_, path) if path.starts_with("/timers/") => Err(HttpError::MethodNotAllowed),

        _ => Err(HttpError::NotFound),
    }
}

fn error_response(err: &HttpError) -> HttpResponse {
    match err {
        HttpError::BadRequest(msg) => HttpResponse::text(400, msg.clone()),
        HttpError::NotFound => HttpResponse::text(404, "not found"),
        HttpError::MethodNotAllowed => HttpResponse::text(405, "method not allowed"),
        HttpError::Handler(err) => {
            warn!(error = %err, "request failed with an internal handler error");
            HttpResponse::text(500, "internal error")
        }
    }
}

fn health_response(resp: crate::health::HealthResponse) -> HttpResponse {
    let status = if resp.status.is_healthy() { 200 } else { 503 };
    HttpResponse::json(status, resp.to_json().into_bytes())
}

/// `POST /timers`: the server assigns a random id and responds with the
/// timer's URL in `Location` (spec.md §4.9).
fn post_timer(state: &AppState, request: &ParsedRequest) -> Result<HttpResponse, HttpError> {
    let json = parse_timer_json(&request.body)?;
    let id = TimerId::new(rand::thread_rng().gen::<u64>());

    let winner = state.handler.apply_write(json, id)?;
    let hash = replica_hash(&winner.replicas);
    let location = format!("/timers/{}{:016x}", id.to_hex16(), hash);

    Ok(HttpResponse::empty(201).with_header("Location", location))
}

/// `PUT /timers/<id16hex><rhash16hex>`: create-or-update. `rhash` is
/// validated against the client-supplied replica list when present
/// (spec.md §4.9: "`rhash` must match the computed `replica_hash` for
/// validation").
fn put_timer(state: &AppState, request: &ParsedRequest) -> Result<HttpResponse, HttpError> {
    let (id, path_hash) = parse_timer_path(&request.path)?;
    let json = parse_timer_json(&request.body)?;

    if let Some(client_replicas) = json.client_replicas() {
        let expected = replica_hash(&client_replicas);
        if expected != path_hash {
            return Err(HttpError::BadRequest(
                "replica_hash in path does not match the body's replica list".to_string(),
            ));
        }
    }

    state.handler.apply_write(json, id)?;
    Ok(HttpResponse::empty(200))
}

/// `DELETE /timers/<id16hex><rhash16hex>`: convert to a tombstone
/// (spec.md §4.9).
fn delete_timer(state: &AppState, path: &str) -> Result<HttpResponse, HttpError> {
    let (id, _path_hash) = parse_timer_path(path)?;
    state.handler.apply_delete(id)?;
    Ok(HttpResponse::empty(200))
}

/// `GET /timers`: the resync paged query (spec.md §4.8, §4.9).
fn get_timers(state: &AppState, request: &ParsedRequest) -> Result<HttpResponse, HttpError> {
    let requester = request
        .query
        .get("node-for-replicas")
        .ok_or_else(|| HttpError::BadRequest("missing node-for-replicas".to_string()))?;
    let requester = NodeAddress::new(requester.as_str());

    let view = state.handler.cluster().snapshot();
    if !view.is_known_node(&requester) {
        return Err(HttpError::BadRequest("unknown requesting node".to_string()));
    }

    let time_from: u32 = request
        .query
        .get("time-from")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| HttpError::BadRequest("missing or invalid time-from".to_string()))?;
    let requester_view_id: u64 = request
        .query
        .get("cluster-view-id")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| HttpError::BadRequest("missing or invalid cluster-view-id".to_string()))?;
    let max_page: usize = request
        .header("range")
        .and_then(|v| v.parse().ok())
        .unwrap_or(chronos_handler::MAX_TIMERS_IN_RESPONSE);

    let query = ResyncQuery { requester, requester_view_id, time_from, max_page };
    let outcome = state.handler.server_resync(&query)?;
    Metrics::global().resync_pages_served_total.inc();

    let status = if outcome.more { 206 } else { 200 };
    let body = serde_json::to_vec(&outcome.page).map_err(|err| {
        HttpError::BadRequest(format!("failed to encode resync page: {err}"))
    })?;
    Ok(HttpResponse::json(status, body))
}

/// `DELETE /timers/references`: bulk replica-tracker update (spec.md
/// §4.3, §4.9).
fn delete_references(state: &AppState, request: &ParsedRequest) -> Result<HttpResponse, HttpError> {
    let body: DeleteReferencesBody = serde_json::from_slice(&request.body)
        .map_err(|err| HttpError::BadRequest(format!("malformed references body: {err}")))?;

    for reference in body.ids {
        let Some(id) = TimerId::from_hex16(&reference.id) else {
            continue;
        };
        state.handler.update_replica_tracker(id, reference.replica_index)?;
    }

    Ok(HttpResponse::empty(202))
}

fn parse_timer_json(body: &[u8]) -> Result<TimerJson, HttpError> {
    TimerJson::from_slice(body).map_err(|err| HttpError::BadRequest(format!("malformed timer body: {err}")))
}

/// Splits `/timers/<id16hex><rhash16hex>` into its two 16-hex-character
/// halves (spec.md §6 "Timer URL").
fn parse_timer_path(path: &str) -> Result<(TimerId, u64), HttpError> {
    let suffix = path
        .strip_prefix("/timers/")
        .ok_or_else(|| HttpError::BadRequest("not a timer path".to_string()))?;
    if suffix.len() != 32 {
        return Err(HttpError::BadRequest("timer path must be 32 hex characters".to_string()));
    }
    let (id_hex, hash_hex) = suffix.split_at(16);
    let id = TimerId::from_hex16(id_hex)
        .ok_or_else(|| HttpError::BadRequest("invalid timer id in path".to_string()))?;
    let hash = u64::from_str_radix(hash_hex, 16)
        .map_err(|_| HttpError::BadRequest("invalid replica hash in path".to_string()))?;
    Ok((id, hash))
}
