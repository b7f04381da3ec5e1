use serde_json::Value as JsonValue;

use automation_shared::NewActivity;

use crate::workflows::templates::{resolve_path, value_to_string};

/// Builder for generic activity-log rows written by automation actions
#[derive(Debug, Clone)]
pub struct ActivityEntryBuilder {
    username: Option<String>,
    display_name: Option<String>,
    action_type: String,
    message: Option<String>,
    target_path: Option<String>,
    details: Option<JsonValue>,
}

impl ActivityEntryBuilder {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            username: None,
            display_name: None,
            action_type: action_type.into(),
            message: None,
            target_path: None,
            details: None,
        }
    }

    pub fn user(mut self, username: Option<String>, display_name: Option<String>) -> Self {
        self.username = username;
        self.display_name = display_name;
        self
    }

    /// Pull actor and target fields from event data by convention.
    pub fn actor_from(self, data: &JsonValue) -> Self {
        let username = text_field(data, "username");
        let display_name = text_field(data, "display_name");
        let target = text_field(data, "target_path");
        self.user(username, display_name).target(target)
    }

    pub fn message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn target(mut self, target_path: Option<String>) -> Self {
        self.target_path = target_path;
        self
    }

    pub fn details_json(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    pub fn build(self) -> NewActivity {
        NewActivity {
            username: self.username,
            display_name: self.display_name,
            action_type: self.action_type,
            message: self.message,
            target_path: self.target_path,
            details: self.details,
        }
    }
}

fn text_field(data: &JsonValue, path: &str) -> Option<String> {
    match resolve_path(data, path)? {
        JsonValue::Null => None,
        JsonValue::String(s) if s.is_empty() => None,
        value => Some(value_to_string(value)),
    }
}
