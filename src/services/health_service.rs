use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness, flagging a stopped lobby dispatcher as degraded.
pub fn health_status(state: &SharedState) -> HealthResponse {
    if state.dispatcher().is_running() {
        HealthResponse::ok()
    } else {
        warn!("lobby dispatcher stopped; reporting degraded health");
        HealthResponse::degraded()
    }
}
