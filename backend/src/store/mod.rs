// Automation Store - the five collections the engine reads and writes
//
// The engine only sees simple per-row operations: filtered select, insert,
// update-by-id and delete. Nothing spans a transaction.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use automation_shared::{
    AutomationRule, ExecutionLogEntry, ExecutionStatus, NewActivity, NewNotification, RuleInput,
    TriggerType,
};

pub use memory::MemoryStore;
pub use postgres::PgAutomationStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub const DEFAULT_LOG_LIMIT: i64 = 50;
pub const MAX_LOG_LIMIT: i64 = 200;

/// Filters for the execution log listing
#[derive(Debug, Clone)]
pub struct ExecutionLogQuery {
    pub rule_id: Option<Uuid>,
    pub status: Option<ExecutionStatus>,
    pub limit: i64,
}

impl Default for ExecutionLogQuery {
    fn default() -> Self {
        Self {
            rule_id: None,
            status: None,
            limit: DEFAULT_LOG_LIMIT,
        }
    }
}

impl ExecutionLogQuery {
    pub fn clamped_limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LOG_LIMIT)
    }

    pub fn matches(&self, entry: &ExecutionLogEntry) -> bool {
        self.rule_id.is_none_or(|id| id == entry.rule_id)
            && self.status.is_none_or(|status| status == entry.status)
    }
}

#[async_trait]
pub trait AutomationStore: Send + Sync {
    // --- Rules (read-only to the engine apart from the counter) ---

    /// Enabled rules whose trigger matches. Order is implementation-defined.
    async fn enabled_rules_for_trigger(&self, trigger: TriggerType) -> StoreResult<Vec<AutomationRule>>;

    async fn list_rules(&self, trigger: Option<TriggerType>) -> StoreResult<Vec<AutomationRule>>;

    async fn get_rule(&self, id: Uuid) -> StoreResult<AutomationRule>;

    async fn create_rule(&self, input: &RuleInput) -> StoreResult<AutomationRule>;

    async fn update_rule(&self, id: Uuid, input: &RuleInput) -> StoreResult<AutomationRule>;

    async fn delete_rule(&self, id: Uuid) -> StoreResult<()>;

    async fn increment_execution_count(&self, id: Uuid) -> StoreResult<()>;

    // --- Side-effect collections ---

    async fn insert_notification(&self, notification: &NewNotification) -> StoreResult<Uuid>;

    /// Sets status and timestamp. Fails with `NotFound` when no project matches.
    async fn update_project_status(&self, project_id: &str, status: &str) -> StoreResult<()>;

    async fn insert_activity(&self, entry: &NewActivity) -> StoreResult<Uuid>;

    // --- Execution log ---

    async fn insert_execution_log(&self, entry: &ExecutionLogEntry) -> StoreResult<()>;

    /// Newest first.
    async fn list_execution_logs(&self, query: &ExecutionLogQuery) -> StoreResult<Vec<ExecutionLogEntry>>;
}
