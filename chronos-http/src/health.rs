//! Liveness/readiness, matching the shape `kimberlite-server::http`
//! dispatches against (`HealthChecker::{liveness_check,readiness_check}`,
//! `HealthResponse::to_json`, `HealthStatus::is_healthy`) — SPEC_FULL.md
//! §4.10, ambient operability carried regardless of spec.md's Non-goals.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub detail: &'static str,
}

impl HealthResponse {
    pub fn to_json(&self) -> String {
        format!(
            r#"{{"status":"{}","detail":"{}"}}"#,
            if self.status.is_healthy() { "healthy" } else { "unhealthy" },
            self.detail
        )
    }
}

/// Readiness tracks one thing the handler can't answer itself: whether
/// `chronos_cluster.conf` has been loaded at least once. Liveness is
/// unconditional — if this code is running, the process is up.
pub struct HealthChecker {
    config_loaded: AtomicBool,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self { config_loaded: AtomicBool::new(false) }
    }

    pub fn mark_config_loaded(&self) {
        self.config_loaded.store(true, Ordering::SeqCst);
    }

    pub fn liveness_check(&self) -> HealthResponse {
        HealthResponse { status: HealthStatus::Healthy, detail: "process is up" }
    }

    pub fn readiness_check(&self) -> HealthResponse {
        if self.config_loaded.load(Ordering::SeqCst) {
            HealthResponse { status: HealthStatus::Healthy, detail: "cluster config loaded" }
        } else {
            HealthResponse { status: HealthStatus::Unhealthy, detail: "cluster config not yet loaded" }
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liveness_is_always_healthy() {
        let checker = HealthChecker::new();
        assert!(checker.liveness_check().status.is_healthy());
    }

    #[test]
    fn readiness_is_unhealthy_until_config_loads() {
        let checker = HealthChecker::new();
        assert!(!checker.readiness_check().status.is_healthy());
        checker.mark_config_loaded();
        assert!(checker.readiness_check().status.is_healthy());
    }

    #[test]
    fn to_json_embeds_status_and_detail() {
        let resp = HealthResponse { status: HealthStatus::Unhealthy, detail: "cluster config not yet loaded" };
        let json = resp.to_json();
        assert!(json.contains("\"status\":\"unhealthy\""));
        assert!(json.contains("cluster config not yet loaded"));
    }
}
