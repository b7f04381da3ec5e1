// Workflow Actions - handler registry and the built-in action handlers

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::templates::{interpolate, resolve_path, value_to_string};
use crate::services::ActivityEntryBuilder;
use crate::store::{AutomationStore, StoreError};
use automation_shared::{Action, ActionType, NewNotification};

pub type ActionConfig = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unknown action type '{0}'")]
    UnknownActionType(String),
    #[error("invalid action config: {0}")]
    InvalidConfig(String),
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(
        &self,
        store: &dyn AutomationStore,
        config: &ActionConfig,
        data: &Value,
    ) -> Result<(), ActionError>;
}

/// Maps each action type to its handler. Types without a handler are skipped
/// with a warning and count as successful, unless the registry is strict.
#[derive(Clone)]
pub struct ActionRegistry {
    handlers: HashMap<ActionType, Arc<dyn ActionHandler>>,
    strict: bool,
}

impl ActionRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            strict: false,
        }
    }

    pub fn with_defaults() -> Self {
        Self::empty()
            .with_handler(ActionType::CreateNotification, CreateNotificationHandler)
            .with_handler(ActionType::ChangeProjectStatus, ChangeProjectStatusHandler)
            .with_handler(ActionType::CreateInvoice, CreateInvoiceHandler)
            .with_handler(ActionType::LogActivity, LogActivityHandler)
            .with_handler(ActionType::SendEmail, SendEmailHandler)
            .with_handler(ActionType::FireWebhook, FireWebhookHandler)
    }

    pub fn with_handler<H>(mut self, action_type: ActionType, handler: H) -> Self
    where
        H: ActionHandler + 'static,
    {
        self.register(action_type, Arc::new(handler));
        self
    }

    pub fn register(&mut self, action_type: ActionType, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(action_type, handler);
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn handles(&self, action_type: &ActionType) -> bool {
        self.handlers.contains_key(action_type)
    }

    pub async fn execute(
        &self,
        action: &Action,
        data: &Value,
        store: &dyn AutomationStore,
    ) -> Result<(), ActionError> {
        match self.handlers.get(&action.action_type) {
            Some(handler) => {
                debug!("Executing automation action: {}", action.action_type);
                handler.handle(store, &action.config, data).await
            }
            None if self.strict => Err(ActionError::UnknownActionType(
                action.action_type.as_str().to_string(),
            )),
            None => {
                // Recorded as a successful action even though nothing ran
                warn!("Unknown automation action type '{}', skipping", action.action_type);
                Ok(())
            }
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Non-empty string or number at `key`, as text.
fn config_text(config: &ActionConfig, key: &str) -> Option<String> {
    config.get(key).and_then(scalar_text)
}

fn data_text(data: &Value, path: &str) -> Option<String> {
    resolve_path(data, path).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(_) => Some(value_to_string(value)),
        _ => None,
    }
}

fn interpolated(config: &ActionConfig, key: &str, data: &Value) -> Option<String> {
    config_text(config, key).map(|template| interpolate(&template, data))
}

pub struct CreateNotificationHandler;

#[async_trait]
impl ActionHandler for CreateNotificationHandler {
    async fn handle(&self, store: &dyn AutomationStore, config: &ActionConfig, data: &Value) -> Result<(), ActionError> {
        let Some(recipient) = config_text(config, "recipient").or_else(|| data_text(data, "username")) else {
            debug!("create_notification: no recipient resolved, skipping");
            return Ok(());
        };

        let notification = NewNotification {
            recipient,
            title: interpolated(config, "title", data).unwrap_or_default(),
            message: interpolated(config, "message", data).unwrap_or_default(),
            notification_type: config_text(config, "notification_type")
                .unwrap_or_else(|| "automation".to_string()),
            link: interpolated(config, "link", data),
        };

        store.insert_notification(&notification).await?;
        Ok(())
    }
}

pub struct ChangeProjectStatusHandler;

#[async_trait]
impl ActionHandler for ChangeProjectStatusHandler {
    async fn handle(&self, store: &dyn AutomationStore, config: &ActionConfig, data: &Value) -> Result<(), ActionError> {
        let project_id = config_text(config, "project_id").or_else(|| data_text(data, "project_id"));
        let status = config_text(config, "status");

        // The new status is not checked against the platform's project states
        let (Some(project_id), Some(status)) = (project_id, status) else {
            debug!("change_project_status: missing project id or status, skipping");
            return Ok(());
        };

        store.update_project_status(&project_id, &status).await?;
        Ok(())
    }
}

/// Placeholder: records the intent to invoice, creates nothing.
pub struct CreateInvoiceHandler;

#[async_trait]
impl ActionHandler for CreateInvoiceHandler {
    async fn handle(&self, store: &dyn AutomationStore, config: &ActionConfig, data: &Value) -> Result<(), ActionError> {
        let entry = ActivityEntryBuilder::new("automation_create_invoice")
            .actor_from(data)
            .message(Some("Invoice creation requested by automation".to_string()))
            .details_json(json!({ "config": config, "event": data }))
            .build();

        store.insert_activity(&entry).await?;
        Ok(())
    }
}

pub struct LogActivityHandler;

#[async_trait]
impl ActionHandler for LogActivityHandler {
    async fn handle(&self, store: &dyn AutomationStore, config: &ActionConfig, data: &Value) -> Result<(), ActionError> {
        let action_type = config_text(config, "action_type").unwrap_or_else(|| "automation".to_string());
        let message = interpolated(config, "message", data);
        log_activity(store, &action_type, message, data, None).await
    }
}

async fn log_activity(
    store: &dyn AutomationStore,
    action_type: &str,
    message: Option<String>,
    data: &Value,
    details: Option<Value>,
) -> Result<(), ActionError> {
    let mut builder = ActivityEntryBuilder::new(action_type)
        .actor_from(data)
        .message(message);
    if let Some(details) = details {
        builder = builder.details_json(details);
    }

    store.insert_activity(&builder.build()).await?;
    Ok(())
}

/// No transport: the intended email is written to the activity log.
pub struct SendEmailHandler;

#[async_trait]
impl ActionHandler for SendEmailHandler {
    async fn handle(&self, store: &dyn AutomationStore, config: &ActionConfig, data: &Value) -> Result<(), ActionError> {
        let to = interpolated(config, "to", data)
            .or_else(|| data_text(data, "email"))
            .unwrap_or_else(|| "(no recipient)".to_string());
        let subject = interpolated(config, "subject", data).unwrap_or_default();
        let body = interpolated(config, "body", data).unwrap_or_default();

        let message = format!("Email to {}: {}", to, subject);
        let details = json!({ "to": to, "subject": subject, "body": body });
        log_activity(store, "automation_send_email", Some(message), data, Some(details)).await
    }
}

/// Not implemented yet: no outbound request is made.
pub struct FireWebhookHandler;

#[async_trait]
impl ActionHandler for FireWebhookHandler {
    async fn handle(&self, _store: &dyn AutomationStore, config: &ActionConfig, data: &Value) -> Result<(), ActionError> {
        let url = interpolated(config, "url", data).unwrap_or_default();
        info!(url = %url, "fire_webhook is not implemented yet, no request sent");
        Ok(())
    }
}
