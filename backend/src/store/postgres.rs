use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use automation_shared::{
    ActionOutcome, AutomationRule, ExecutionLogEntry, ExecutionStatus, NewActivity,
    NewNotification, RuleInput, TriggerType,
};

use super::{AutomationStore, ExecutionLogQuery, StoreError, StoreResult};

const RULE_COLUMNS: &str = "id, name, trigger_type, conditions, actions, enabled, \
                            execution_count, created_at, updated_at";

#[derive(Debug, FromRow)]
struct RuleRow {
    id: Uuid,
    name: String,
    trigger_type: String,
    conditions: serde_json::Value,
    actions: serde_json::Value,
    enabled: bool,
    execution_count: i64,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<RuleRow> for AutomationRule {
    type Error = StoreError;

    fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
        let trigger = row
            .trigger_type
            .parse::<TriggerType>()
            .map_err(|e| StoreError::CorruptRow(format!("rule {}: {}", row.id, e)))?;

        Ok(AutomationRule {
            id: row.id,
            name: row.name,
            trigger,
            conditions: row.conditions,
            actions: row.actions,
            enabled: row.enabled,
            execution_count: row.execution_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// One unreadable row fails the whole read with `CorruptRow`.
fn rules_from_rows(rows: Vec<RuleRow>) -> StoreResult<Vec<AutomationRule>> {
    rows.into_iter().map(AutomationRule::try_from).collect()
}

#[derive(Debug, FromRow)]
struct ExecutionLogRow {
    id: Uuid,
    rule_id: Uuid,
    rule_name: String,
    trigger_type: String,
    event_data: serde_json::Value,
    actions_executed: Json<Vec<ActionOutcome>>,
    status: String,
    error_message: Option<String>,
    executed_at: DateTime<Utc>,
}

impl TryFrom<ExecutionLogRow> for ExecutionLogEntry {
    type Error = StoreError;

    fn try_from(row: ExecutionLogRow) -> Result<Self, Self::Error> {
        let status: ExecutionStatus = row.status.parse().map_err(StoreError::CorruptRow)?;

        Ok(ExecutionLogEntry {
            id: row.id,
            rule_id: row.rule_id,
            rule_name: row.rule_name,
            trigger_type: row.trigger_type,
            event_data: row.event_data,
            actions_executed: row.actions_executed.0,
            status,
            error_message: row.error_message,
            executed_at: row.executed_at,
        })
    }
}

/// PostgreSQL-backed store. Every call is a single statement.
#[derive(Clone)]
pub struct PgAutomationStore {
    pool: PgPool,
}

impl PgAutomationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AutomationStore for PgAutomationStore {
    async fn enabled_rules_for_trigger(&self, trigger: TriggerType) -> StoreResult<Vec<AutomationRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {} FROM automation_rules WHERE enabled = true AND trigger_type = $1",
            RULE_COLUMNS
        ))
        .bind(trigger.as_str())
        .fetch_all(&self.pool)
        .await?;

        rules_from_rows(rows)
    }

    async fn list_rules(&self, trigger: Option<TriggerType>) -> StoreResult<Vec<AutomationRule>> {
        let rows = match trigger {
            Some(trigger) => {
                sqlx::query_as::<_, RuleRow>(&format!(
                    "SELECT {} FROM automation_rules WHERE trigger_type = $1 ORDER BY created_at ASC",
                    RULE_COLUMNS
                ))
                .bind(trigger.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RuleRow>(&format!(
                    "SELECT {} FROM automation_rules ORDER BY created_at ASC",
                    RULE_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rules_from_rows(rows)
    }

    async fn get_rule(&self, id: Uuid) -> StoreResult<AutomationRule> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {} FROM automation_rules WHERE id = $1",
            RULE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            entity: "Rule",
            id: id.to_string(),
        })?;

        row.try_into()
    }

    async fn create_rule(&self, input: &RuleInput) -> StoreResult<AutomationRule> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            r#"
            INSERT INTO automation_rules (id, name, trigger_type, conditions, actions, enabled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {}
            "#,
            RULE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.trigger.as_str())
        .bind(serde_json::to_value(&input.conditions)?)
        .bind(serde_json::to_value(&input.actions)?)
        .bind(input.enabled)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update_rule(&self, id: Uuid, input: &RuleInput) -> StoreResult<AutomationRule> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            r#"
            UPDATE automation_rules
            SET name = $2, trigger_type = $3, conditions = $4, actions = $5,
                enabled = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RULE_COLUMNS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.trigger.as_str())
        .bind(serde_json::to_value(&input.conditions)?)
        .bind(serde_json::to_value(&input.actions)?)
        .bind(input.enabled)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            entity: "Rule",
            id: id.to_string(),
        })?;

        row.try_into()
    }

    async fn delete_rule(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM automation_rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "Rule",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn increment_execution_count(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE automation_rules SET execution_count = execution_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_notification(&self, notification: &NewNotification) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO notifications (id, recipient, title, message, notification_type, link, read, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, false, NOW())",
        )
        .bind(id)
        .bind(&notification.recipient)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.notification_type)
        .bind(&notification.link)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_project_status(&self, project_id: &str, status: &str) -> StoreResult<()> {
        let id: Uuid = project_id
            .parse()
            .map_err(|_| StoreError::InvalidId(project_id.to_string()))?;

        let result = sqlx::query("UPDATE projects SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "Project",
                id: project_id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_activity(&self, entry: &NewActivity) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO activity_logs (id, username, display_name, action_type, message, target_path, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            "#,
        )
        .bind(id)
        .bind(&entry.username)
        .bind(&entry.display_name)
        .bind(&entry.action_type)
        .bind(&entry.message)
        .bind(&entry.target_path)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_execution_log(&self, entry: &ExecutionLogEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO automation_execution_logs
            (id, rule_id, rule_name, trigger_type, event_data, actions_executed, status, error_message, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.rule_id)
        .bind(&entry.rule_name)
        .bind(&entry.trigger_type)
        .bind(&entry.event_data)
        .bind(Json(&entry.actions_executed))
        .bind(entry.status.as_str())
        .bind(&entry.error_message)
        .bind(entry.executed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_execution_logs(&self, query: &ExecutionLogQuery) -> StoreResult<Vec<ExecutionLogEntry>> {
        let mut sql = String::from(
            r#"
            SELECT id, rule_id, rule_name, trigger_type, event_data, actions_executed,
                   status, error_message, executed_at
            FROM automation_execution_logs
            WHERE 1=1
            "#,
        );

        let mut params_count = 0;

        if query.rule_id.is_some() {
            params_count += 1;
            sql.push_str(&format!(" AND rule_id = ${}", params_count));
        }
        if query.status.is_some() {
            params_count += 1;
            sql.push_str(&format!(" AND status = ${}", params_count));
        }

        sql.push_str(&format!(" ORDER BY executed_at DESC LIMIT ${}", params_count + 1));

        let mut db_query = sqlx::query_as::<_, ExecutionLogRow>(&sql);

        if let Some(rule_id) = query.rule_id {
            db_query = db_query.bind(rule_id);
        }
        if let Some(status) = query.status {
            db_query = db_query.bind(status.as_str());
        }

        let rows = db_query
            .bind(query.clamped_limit())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ExecutionLogEntry::try_from).collect()
    }
}
