use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    store: &'static str,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Health> {
    let store = match state.db.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!("Store health check failed: {e}");
            "degraded"
        }
    };

    Json(Health {
        status: "healthy",
        store,
    })
}
