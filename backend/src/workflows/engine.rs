// Workflow Engine - rule matching, per-rule execution and the execution log
//
// For each event: load enabled rules for the trigger, then for each rule in
// turn evaluate its conditions, run its actions in declared order and write
// one execution-log entry. Rules never affect each other.

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::actions::ActionRegistry;
use super::conditions::{ConditionEvaluator, UnknownOperator};
use super::triggers::AutomationEvent;
use crate::store::{AutomationStore, StoreError};
use automation_shared::{ActionOutcome, AutomationRule, ExecutionLogEntry, ExecutionStatus};

/// Failures that abort a whole rule (or, for `Store`, the whole event).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid conditions: {0}")]
    InvalidConditions(#[source] serde_json::Error),
    #[error("invalid actions: {0}")]
    InvalidActions(#[source] serde_json::Error),
    #[error(transparent)]
    UnknownOperator(#[from] UnknownOperator),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one event did. Never returned to the code that raised the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub rules_matched: usize,
    pub rules_skipped: usize,
    pub entries_logged: usize,
    pub log_write_failures: usize,
}

enum RuleOutcome {
    /// Conditions false: nothing written.
    Skipped,
    Executed(ExecutionLogEntry),
}

pub struct AutomationEngine {
    store: Arc<dyn AutomationStore>,
    actions: ActionRegistry,
    conditions: ConditionEvaluator,
}

impl AutomationEngine {
    pub fn new(store: Arc<dyn AutomationStore>) -> Self {
        Self {
            store,
            actions: ActionRegistry::with_defaults(),
            conditions: ConditionEvaluator::default(),
        }
    }

    pub fn with_registry(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    /// Fail on unknown operators and action types instead of passing them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.conditions = ConditionEvaluator::new(strict);
        self.actions = self.actions.strict(strict);
        self
    }

    pub fn store(&self) -> &Arc<dyn AutomationStore> {
        &self.store
    }

    pub async fn process_event(&self, event: &AutomationEvent) -> Result<DispatchReport, EngineError> {
        let mut report = DispatchReport::default();

        let Some(trigger) = event.trigger() else {
            debug!("Ignoring event with unrecognised type '{}'", event.event_type);
            return Ok(report);
        };

        let rules = self.store.enabled_rules_for_trigger(trigger).await?;
        report.rules_matched = rules.len();
        if rules.is_empty() {
            debug!("No enabled automation rules for trigger {}", trigger);
            return Ok(report);
        }

        for rule in &rules {
            match self.run_rule(rule, event).await {
                RuleOutcome::Skipped => report.rules_skipped += 1,
                RuleOutcome::Executed(entry) => self.record(rule, entry, &mut report).await,
            }
        }

        info!(
            trigger = %trigger,
            event_id = %event.event_id,
            "Automation event processed: {} rules matched, {} skipped, {} logged",
            report.rules_matched,
            report.rules_skipped,
            report.entries_logged
        );

        Ok(report)
    }

    async fn run_rule(&self, rule: &AutomationRule, event: &AutomationEvent) -> RuleOutcome {
        let mut outcomes = Vec::new();

        let (status, error_message) = match self.attempt_rule(rule, &event.data, &mut outcomes).await {
            Ok(false) => return RuleOutcome::Skipped,
            Ok(true) => {
                let failures: Vec<&str> = outcomes
                    .iter()
                    .filter_map(|outcome| outcome.error.as_deref())
                    .collect();
                if failures.is_empty() {
                    (ExecutionStatus::Success, None)
                } else {
                    (ExecutionStatus::PartialFailure, Some(failures.join("; ")))
                }
            }
            Err(e) => {
                warn!("Automation rule '{}' ({}) failed: {}", rule.name, rule.id, e);
                (ExecutionStatus::Failed, Some(e.to_string()))
            }
        };

        RuleOutcome::Executed(ExecutionLogEntry {
            id: Uuid::new_v4(),
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            trigger_type: event.event_type.clone(),
            event_data: event.data.clone(),
            actions_executed: outcomes,
            status,
            error_message,
            executed_at: Utc::now(),
        })
    }

    /// `Ok(false)` when conditions do not hold. Action failures are recorded in
    /// `outcomes`; any `Err` aborts the rule with the actions attempted so far.
    async fn attempt_rule(
        &self,
        rule: &AutomationRule,
        data: &Value,
        outcomes: &mut Vec<ActionOutcome>,
    ) -> Result<bool, EngineError> {
        let conditions = rule.parsed_conditions().map_err(EngineError::InvalidConditions)?;
        if !self.conditions.evaluate(&conditions, data)? {
            debug!("Conditions not met for automation rule '{}'", rule.name);
            return Ok(false);
        }

        let actions = rule.parsed_actions().map_err(EngineError::InvalidActions)?;
        for action in &actions {
            // A panicking handler fails its action, not the rest of the event
            let run = AssertUnwindSafe(self.actions.execute(action, data, self.store.as_ref())).catch_unwind();
            let result = match run.await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(panic) => {
                    error!("Action {} in rule '{}' panicked", action.action_type, rule.name);
                    Err(format!("action panicked: {}", panic_message(&*panic)))
                }
            };

            let outcome = match result {
                Ok(()) => ActionOutcome {
                    action_type: action.action_type.as_str().to_string(),
                    success: true,
                    error: None,
                },
                Err(message) => {
                    warn!("Action {} in rule '{}' failed: {}", action.action_type, rule.name, message);
                    ActionOutcome {
                        action_type: action.action_type.as_str().to_string(),
                        success: false,
                        error: Some(message),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(true)
    }

    async fn record(&self, rule: &AutomationRule, entry: ExecutionLogEntry, report: &mut DispatchReport) {
        match self.store.insert_execution_log(&entry).await {
            Ok(()) => report.entries_logged += 1,
            Err(e) => {
                report.log_write_failures += 1;
                error!(
                    rule_id = %rule.id,
                    status = entry.status.as_str(),
                    "Failed to write automation execution log: {}",
                    e
                );
            }
        }

        if let Err(e) = self.store.increment_execution_count(rule.id).await {
            warn!(rule_id = %rule.id, "Failed to bump automation rule execution count: {}", e);
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
