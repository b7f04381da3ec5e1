// In-memory store used by tests and by `AUTOMATION_STORE=memory`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use automation_shared::{
    ActivityLog, AutomationRule, ExecutionLogEntry, NewActivity, NewNotification, Notification,
    RuleInput, TriggerType,
};

use super::{AutomationStore, ExecutionLogQuery, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub status: String,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MemoryState {
    rules: Vec<AutomationRule>,
    notifications: Vec<Notification>,
    projects: HashMap<String, ProjectRecord>,
    project_updates: usize,
    activities: Vec<ActivityLog>,
    execution_logs: Vec<ExecutionLogEntry>,
    fail_execution_log_writes: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a rule row as-is, including malformed condition/action JSON.
    pub fn insert_rule(&self, rule: AutomationRule) {
        self.state().rules.push(rule);
    }

    pub fn add_project(&self, id: &str, status: &str) {
        self.state().projects.insert(
            id.to_string(),
            ProjectRecord {
                status: status.to_string(),
                updated_at: None,
            },
        );
    }

    pub fn project(&self, id: &str) -> Option<ProjectRecord> {
        self.state().projects.get(id).cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state().notifications.clone()
    }

    pub fn activities(&self) -> Vec<ActivityLog> {
        self.state().activities.clone()
    }

    /// Oldest first, in write order.
    pub fn execution_logs(&self) -> Vec<ExecutionLogEntry> {
        self.state().execution_logs.clone()
    }

    /// Make every execution-log insert fail with a database error.
    pub fn fail_execution_log_writes(&self, fail: bool) {
        self.state().fail_execution_log_writes = fail;
    }

    /// Writes to the notification, project, activity and execution-log collections.
    pub fn write_count(&self) -> usize {
        let state = self.state();
        state.notifications.len()
            + state.project_updates
            + state.activities.len()
            + state.execution_logs.len()
    }

    fn rule_from_input(id: Uuid, input: &RuleInput) -> StoreResult<AutomationRule> {
        Ok(AutomationRule {
            id,
            name: input.name.clone(),
            trigger: input.trigger,
            conditions: serde_json::to_value(&input.conditions)?,
            actions: serde_json::to_value(&input.actions)?,
            enabled: input.enabled,
            execution_count: 0,
            created_at: Utc::now(),
            updated_at: None,
        })
    }
}

fn rule_not_found(id: Uuid) -> StoreError {
    StoreError::NotFound {
        entity: "Rule",
        id: id.to_string(),
    }
}

#[async_trait]
impl AutomationStore for MemoryStore {
    async fn enabled_rules_for_trigger(&self, trigger: TriggerType) -> StoreResult<Vec<AutomationRule>> {
        Ok(self
            .state()
            .rules
            .iter()
            .filter(|r| r.enabled && r.trigger == trigger)
            .cloned()
            .collect())
    }

    async fn list_rules(&self, trigger: Option<TriggerType>) -> StoreResult<Vec<AutomationRule>> {
        Ok(self
            .state()
            .rules
            .iter()
            .filter(|r| trigger.is_none_or(|t| t == r.trigger))
            .cloned()
            .collect())
    }

    async fn get_rule(&self, id: Uuid) -> StoreResult<AutomationRule> {
        self.state()
            .rules
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| rule_not_found(id))
    }

    async fn create_rule(&self, input: &RuleInput) -> StoreResult<AutomationRule> {
        let rule = Self::rule_from_input(Uuid::new_v4(), input)?;
        self.state().rules.push(rule.clone());
        Ok(rule)
    }

    async fn update_rule(&self, id: Uuid, input: &RuleInput) -> StoreResult<AutomationRule> {
        let replacement = Self::rule_from_input(id, input)?;
        let mut state = self.state();
        let rule = state
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| rule_not_found(id))?;

        rule.name = replacement.name;
        rule.trigger = replacement.trigger;
        rule.conditions = replacement.conditions;
        rule.actions = replacement.actions;
        rule.enabled = replacement.enabled;
        rule.updated_at = Some(Utc::now());
        Ok(rule.clone())
    }

    async fn delete_rule(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state();
        let before = state.rules.len();
        state.rules.retain(|r| r.id != id);
        if state.rules.len() == before {
            return Err(rule_not_found(id));
        }
        Ok(())
    }

    async fn increment_execution_count(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state();
        let rule = state
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| rule_not_found(id))?;
        rule.execution_count += 1;
        Ok(())
    }

    async fn insert_notification(&self, notification: &NewNotification) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.state().notifications.push(Notification {
            id,
            recipient: notification.recipient.clone(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            notification_type: notification.notification_type.clone(),
            link: notification.link.clone(),
            read: false,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_project_status(&self, project_id: &str, status: &str) -> StoreResult<()> {
        let mut state = self.state();
        let project = state
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Project",
                id: project_id.to_string(),
            })?;

        project.status = status.to_string();
        project.updated_at = Some(Utc::now());
        state.project_updates += 1;
        Ok(())
    }

    async fn insert_activity(&self, entry: &NewActivity) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.state().activities.push(ActivityLog {
            id,
            username: entry.username.clone(),
            display_name: entry.display_name.clone(),
            action_type: entry.action_type.clone(),
            message: entry.message.clone(),
            target_path: entry.target_path.clone(),
            details: entry.details.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn insert_execution_log(&self, entry: &ExecutionLogEntry) -> StoreResult<()> {
        let mut state = self.state();
        if state.fail_execution_log_writes {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        state.execution_logs.push(entry.clone());
        Ok(())
    }

    async fn list_execution_logs(&self, query: &ExecutionLogQuery) -> StoreResult<Vec<ExecutionLogEntry>> {
        let limit = usize::try_from(query.clamped_limit()).unwrap_or(usize::MAX);
        Ok(self
            .state()
            .execution_logs
            .iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .take(limit)
            .cloned()
            .collect())
    }
}
