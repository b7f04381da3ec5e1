use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;
use std::sync::Arc;

use crate::{database, AppState};

pub mod automation;

pub use automation::automation_routes;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let db_status = match &state.db_pool {
        Some(pool) => {
            if database::health_check(pool).await { "healthy" } else { "unhealthy" }
        }
        None => "in_memory",
    };

    let status = if db_status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "healthy" } else { "degraded" },
            "service": "automation-api",
            "database": db_status
        })),
    )
}
