//! Shared runtime state for dp-daemon.
//!
//! The policy engine and the canary controller are synchronous, CPU-bound
//! components (ADR: the core never awaits). They sit behind plain
//! `std::sync::Mutex`/no lock at all rather than `tokio::sync::RwLock`,
//! since there is nothing to hold the lock across an await point for.

use std::sync::Mutex;

use dp_canary::CanaryController;
use dp_policy::PolicyEngine;
use serde::{Deserialize, Serialize};

/// Static build metadata included in the health response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Handle shared across all Axum handlers. Cheap to clone (everything
/// interior is behind `Arc` at the router level via `State<Arc<AppState>>`).
pub struct AppState {
    pub build: BuildInfo,
    pub engine: PolicyEngine,
    pub canary: Mutex<CanaryController>,
}

impl AppState {
    pub fn new(engine: PolicyEngine, canary: CanaryController) -> Self {
        Self {
            build: BuildInfo {
                service: "dp-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            engine,
            canary: Mutex::new(canary),
        }
    }
}
