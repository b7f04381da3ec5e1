use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Business occurrences an automation rule can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    FileUploaded,
    ProjectStatusChanged,
    QuoteSigned,
    InvoiceOverdue,
    ClientComment,
    ApprovalStatusChanged,
    InvoicePaid,
    ProjectCreated,
    ClientCreated,
}

impl TriggerType {
    pub const ALL: [TriggerType; 9] = [
        Self::FileUploaded,
        Self::ProjectStatusChanged,
        Self::QuoteSigned,
        Self::InvoiceOverdue,
        Self::ClientComment,
        Self::ApprovalStatusChanged,
        Self::InvoicePaid,
        Self::ProjectCreated,
        Self::ClientCreated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileUploaded => "file_uploaded",
            Self::ProjectStatusChanged => "project_status_changed",
            Self::QuoteSigned => "quote_signed",
            Self::InvoiceOverdue => "invoice_overdue",
            Self::ClientComment => "client_comment",
            Self::ApprovalStatusChanged => "approval_status_changed",
            Self::InvoicePaid => "invoice_paid",
            Self::ProjectCreated => "project_created",
            Self::ClientCreated => "client_created",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTrigger(pub String);

impl fmt::Display for UnknownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown trigger type '{}'", self.0)
    }
}

impl std::error::Error for UnknownTrigger {}

impl FromStr for TriggerType {
    type Err = UnknownTrigger;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTrigger(s.to_string()))
    }
}

/// Predicate operators. Names outside the known set are kept verbatim in
/// `Other` so stored rules still load and round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
    Other(String),
}

impl ConditionOperator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for ConditionOperator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "equals" => Self::Equals,
            "not_equals" => Self::NotEquals,
            "contains" => Self::Contains,
            "starts_with" => Self::StartsWith,
            "greater_than" => Self::GreaterThan,
            "less_than" => Self::LessThan,
            "is_empty" => Self::IsEmpty,
            "is_not_empty" => Self::IsNotEmpty,
            _ => Self::Other(s),
        }
    }
}

impl From<ConditionOperator> for String {
    fn from(op: ConditionOperator) -> Self {
        match op {
            ConditionOperator::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// Side effects a rule can run. Unrecognized names land in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    CreateNotification,
    ChangeProjectStatus,
    CreateInvoice,
    LogActivity,
    SendEmail,
    FireWebhook,
    Other(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateNotification => "create_notification",
            Self::ChangeProjectStatus => "change_project_status",
            Self::CreateInvoice => "create_invoice",
            Self::LogActivity => "log_activity",
            Self::SendEmail => "send_email",
            Self::FireWebhook => "fire_webhook",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for ActionType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "create_notification" => Self::CreateNotification,
            "change_project_status" => Self::ChangeProjectStatus,
            "create_invoice" => Self::CreateInvoice,
            "log_activity" => Self::LogActivity,
            "send_email" => Self::SendEmail,
            "fire_webhook" => Self::FireWebhook,
            _ => Self::Other(s),
        }
    }
}

impl From<ActionType> for String {
    fn from(action_type: ActionType) -> Self {
        match action_type {
            ActionType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field/operator/value predicate. `field` is a dot path into the event data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Condition {
    pub fn new(field: &str, operator: ConditionOperator, value: serde_json::Value) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl Action {
    pub fn new(action_type: ActionType, config: serde_json::Value) -> Self {
        let config = match config {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self { action_type, config }
    }
}

/// Rule as persisted. Conditions and actions stay raw JSON until the engine
/// prepares them, so a malformed row still loads and can be reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: Uuid,
    pub name: String,
    pub trigger: TriggerType,
    pub conditions: serde_json::Value,
    pub actions: serde_json::Value,
    pub enabled: bool,
    pub execution_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AutomationRule {
    pub fn parsed_conditions(&self) -> Result<Vec<Condition>, serde_json::Error> {
        match &self.conditions {
            serde_json::Value::Null => Ok(Vec::new()),
            raw => serde_json::from_value(raw.clone()),
        }
    }

    pub fn parsed_actions(&self) -> Result<Vec<Action>, serde_json::Error> {
        match &self.actions {
            serde_json::Value::Null => Ok(Vec::new()),
            raw => serde_json::from_value(raw.clone()),
        }
    }
}

/// Payload for creating or replacing a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleInput {
    pub name: String,
    pub trigger: TriggerType,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: String,
    pub title: String,
    pub message: String,
    pub notification_type: String, // automation, info, warning
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient: String,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub link: Option<String>,
}

/// Generic audit-log row shared by several action handlers.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: Uuid,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub action_type: String,
    pub message: Option<String>,
    pub target_path: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub action_type: String,
    pub message: Option<String>,
    pub target_path: Option<String>,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    PartialFailure,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "partial_failure" => Ok(Self::PartialFailure),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown execution status '{}'", other)),
        }
    }
}

/// Outcome of one attempted action, in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Audit record of one rule evaluated true for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub rule_name: String,
    pub trigger_type: String,
    pub event_data: serde_json::Value,
    pub actions_executed: Vec<ActionOutcome>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
}
