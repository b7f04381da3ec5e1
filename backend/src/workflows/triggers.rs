// Workflow Triggers - the event envelope handed to the dispatcher

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use automation_shared::TriggerType;

/// Who caused the event. Written into the payload under `username` / `display_name`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    pub username: String,
    pub display_name: Option<String>,
}

impl Actor {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = Some(display_name.to_string());
        self
    }
}

/// An incoming business event. `event_type` is free text; only values naming a
/// known trigger can match rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default = "empty_object", deserialize_with = "object_or_empty")]
    pub data: Value,
    #[serde(default = "Uuid::new_v4")]
    pub event_id: Uuid,
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_data(value))
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn normalize_data(data: Value) -> Value {
    match data {
        Value::Null => empty_object(),
        other => other,
    }
}

impl AutomationEvent {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data: normalize_data(data),
            event_id: Uuid::new_v4(),
        }
    }

    pub fn for_trigger(trigger: TriggerType, data: Value) -> Self {
        Self::new(trigger.as_str(), data)
    }

    pub fn trigger(&self) -> Option<TriggerType> {
        self.event_type.parse().ok()
    }

    /// Set a top-level payload field. No-op if the payload is not an object.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.data {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    fn with_actor(trigger: TriggerType, actor: &Actor, mut data: Value) -> Self {
        if let Value::Object(map) = &mut data {
            map.insert("username".to_string(), json!(actor.username));
            if let Some(display_name) = &actor.display_name {
                map.insert("display_name".to_string(), json!(display_name));
            }
        }
        Self::for_trigger(trigger, data)
    }

    pub fn file_uploaded(actor: &Actor, target_path: &str, project_id: Option<&str>, file_name: &str) -> Self {
        Self::with_actor(
            TriggerType::FileUploaded,
            actor,
            json!({
                "target_path": target_path,
                "project_id": project_id,
                "file_name": file_name
            }),
        )
    }

    pub fn project_created(actor: &Actor, project_id: &str, name: &str, client_id: Option<&str>) -> Self {
        Self::with_actor(
            TriggerType::ProjectCreated,
            actor,
            json!({
                "project_id": project_id,
                "id": project_id,
                "name": name,
                "client_id": client_id
            }),
        )
    }

    pub fn project_status_changed(actor: &Actor, project_id: &str, old_status: &str, new_status: &str) -> Self {
        Self::with_actor(
            TriggerType::ProjectStatusChanged,
            actor,
            json!({
                "project_id": project_id,
                "old_status": old_status,
                "new_status": new_status
            }),
        )
    }

    pub fn quote_signed(actor: &Actor, quote_id: &str, project_id: Option<&str>, total: f64) -> Self {
        Self::with_actor(
            TriggerType::QuoteSigned,
            actor,
            json!({
                "quote_id": quote_id,
                "project_id": project_id,
                "total": total
            }),
        )
    }

    pub fn invoice_overdue(invoice_id: &str, client_id: &str, amount: f64, days_overdue: i64) -> Self {
        // Raised by the platform, not a user
        Self::for_trigger(
            TriggerType::InvoiceOverdue,
            json!({
                "invoice_id": invoice_id,
                "client_id": client_id,
                "amount": amount,
                "days_overdue": days_overdue
            }),
        )
    }

    pub fn invoice_paid(actor: &Actor, invoice_id: &str, client_id: &str, amount: f64) -> Self {
        Self::with_actor(
            TriggerType::InvoicePaid,
            actor,
            json!({
                "invoice_id": invoice_id,
                "client_id": client_id,
                "amount": amount
            }),
        )
    }

    pub fn client_comment(actor: &Actor, project_id: &str, target_path: Option<&str>, comment: &str) -> Self {
        Self::with_actor(
            TriggerType::ClientComment,
            actor,
            json!({
                "project_id": project_id,
                "target_path": target_path,
                "comment": comment
            }),
        )
    }

    pub fn approval_status_changed(actor: &Actor, target_path: &str, project_id: Option<&str>, status: &str) -> Self {
        Self::with_actor(
            TriggerType::ApprovalStatusChanged,
            actor,
            json!({
                "target_path": target_path,
                "project_id": project_id,
                "status": status
            }),
        )
    }

    pub fn client_created(actor: &Actor, client_id: &str, name: &str, email: Option<&str>) -> Self {
        Self::with_actor(
            TriggerType::ClientCreated,
            actor,
            json!({
                "client_id": client_id,
                "name": name,
                "email": email
            }),
        )
    }
}
