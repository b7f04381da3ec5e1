use axum::{http::Method, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod services;
pub mod store;
pub mod workflows;

pub use error::{ApiError, ApiResult, AppError};

#[cfg(test)]
mod tests;

use store::AutomationStore;
use workflows::EventDispatcher;

pub struct AppState {
    pub store: Arc<dyn AutomationStore>,
    pub dispatcher: EventDispatcher,
    /// Present when running against PostgreSQL; used by the health check
    pub db_pool: Option<sqlx::PgPool>,
}

impl AppState {
    pub fn new(store: Arc<dyn AutomationStore>, dispatcher: EventDispatcher) -> Self {
        Self {
            store,
            dispatcher,
            db_pool: None,
        }
    }

    pub fn with_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Automation Engine API v1.0.0" }))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1/automation", handlers::automation_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
