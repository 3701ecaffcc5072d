use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub service: String,
    pub version: &'static str,
    pub status: &'static str,
    /// `None` when the health server is disabled.
    pub ready: Option<bool>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let ready = state.health.as_ref().map(|h| h.is_ready());
    Json(SystemStatus {
        service: state.service_name.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        status: match ready {
            Some(false) => "starting",
            _ => "operational",
        },
        ready,
    })
}
