//! `GET /api/system-info` and the identity endpoints polled by the desktop
//! client. Every route answers 200; failures show up as flags in the body.

mod config;
mod ingest;

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use telemetry::DirectoryFacts;

pub use config::ServerConfig;
pub use ingest::{IncidentIngest, SystemInfoResponse};

#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IncidentIngest>,
    pub directory: Arc<dyn DirectoryFacts>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/system-info", get(system_info))
        .route("/api/check-domain", get(check_domain))
        .route("/api/user-details", get(user_details))
        .with_state(state)
}

async fn system_info(State(state): State<AppState>) -> Json<SystemInfoResponse> {
    Json(state.ingest.handle().await)
}

async fn check_domain(State(state): State<AppState>) -> Json<Value> {
    let status = state.directory.domain_status();
    Json(json!({
        "isInDomain": status.is_in_domain,
        "domain": status.domain,
    }))
}

async fn user_details(State(state): State<AppState>) -> Json<Value> {
    let status = state.directory.domain_status();
    let username = state
        .directory
        .user()
        .unwrap_or_else(|| core_types::UNAVAILABLE.to_string());
    Json(json!({
        "success": true,
        "userDetails": {
            "isDomain": status.is_in_domain,
            "domain": status.domain,
            "username": username,
        }
    }))
}
