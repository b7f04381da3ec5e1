// Common test utilities that are shared across integration tests
#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use automation_backend::{
    build_router,
    store::{AutomationStore, MemoryStore},
    workflows::{AutomationEngine, EventDispatcher},
    AppState,
};
use axum::{body::Body, http::Request, Router};
use serde_json::Value;
use tower::ServiceExt;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("debug")
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        init_test_logging();

        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn AutomationStore> = store.clone();
        let dispatcher = EventDispatcher::new(AutomationEngine::new(Arc::clone(&dyn_store)));
        let router = build_router(Arc::new(AppState::new(dyn_store, dispatcher)));

        Self { store, router }
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (u16, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Poll until the background dispatch has written `count` execution logs.
    pub async fn wait_for_logs(&self, count: usize) -> bool {
        for _ in 0..200 {
            if self.store.execution_logs().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
