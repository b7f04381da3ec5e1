
// Common test utilities and shared test setup
use std::sync::{Arc, Once};

use crate::store::{AutomationStore, MemoryStore};
use crate::workflows::{ActionRegistry, AutomationEngine, EventDispatcher};
use automation_shared::AutomationRule;
use fixtures::RuleFixture;

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

pub struct TestContext {
    pub store: Arc<MemoryStore>,
}

impl TestContext {
    pub fn new() -> Self {
        init_test_logging();
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn AutomationStore> {
        self.store.clone()
    }

    pub fn engine(&self) -> AutomationEngine {
        AutomationEngine::new(self.dyn_store())
    }

    pub fn engine_with(&self, registry: ActionRegistry) -> AutomationEngine {
        AutomationEngine::new(self.dyn_store()).with_registry(registry)
    }

    pub fn dispatcher_with(&self, registry: ActionRegistry) -> EventDispatcher {
        EventDispatcher::new(self.engine_with(registry))
    }

    pub fn add_rule(&self, fixture: RuleFixture) -> AutomationRule {
        let rule = fixture.build();
        self.store.insert_rule(rule.clone());
        rule
    }
}
