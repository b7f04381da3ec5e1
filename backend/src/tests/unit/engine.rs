use serde_json::json;

use crate::store::AutomationStore;
use crate::tests::fixtures::{fake_username, FailingHandler, PanickingHandler, RecordingHandler, RuleFixture};
use crate::tests::TestContext;
use crate::workflows::{ActionRegistry, AutomationEvent, DispatchReport};
use automation_shared::{ActionType, ExecutionStatus, TriggerType};

fn custom(name: &str) -> ActionType {
    ActionType::Other(name.to_string())
}

#[tokio::test]
async fn test_project_created_sends_notification() {
    let ctx = TestContext::new();
    let rule = ctx.add_rule(RuleFixture::on(TriggerType::ProjectCreated).actions(json!([{
        "type": "create_notification",
        "config": { "recipient": "alice", "title": "Hi {{name}}", "message": "Created {{id}}" }
    }])));

    let event = AutomationEvent::new("project_created", json!({ "name": "Acme", "id": "p1" }));
    let report = ctx.engine().process_event(&event).await.unwrap();

    assert_eq!(
        report,
        DispatchReport {
            rules_matched: 1,
            rules_skipped: 0,
            entries_logged: 1,
            log_write_failures: 0
        }
    );

    let notifications = ctx.store.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].recipient, "alice");
    assert_eq!(notifications[0].title, "Hi Acme");
    assert_eq!(notifications[0].message, "Created p1");
    assert!(!notifications[0].read);

    let logs = ctx.store.execution_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].rule_id, rule.id);
    assert_eq!(logs[0].rule_name, rule.name);
    assert_eq!(logs[0].trigger_type, "project_created");
    assert_eq!(logs[0].event_data, json!({ "name": "Acme", "id": "p1" }));
    assert_eq!(logs[0].status, ExecutionStatus::Success);
    assert_eq!(logs[0].error_message, None);
    assert_eq!(logs[0].actions_executed.len(), 1);
    assert_eq!(logs[0].actions_executed[0].action_type, "create_notification");
    assert!(logs[0].actions_executed[0].success);
}

#[tokio::test]
async fn test_failed_action_does_not_stop_the_next_one() {
    let ctx = TestContext::new();
    ctx.add_rule(RuleFixture::on(TriggerType::InvoicePaid).actions(json!([
        { "type": "explode", "config": {} },
        { "type": "log_activity", "config": { "message": "Paid {{invoice_id}}" } }
    ])));
    let registry = ActionRegistry::with_defaults().with_handler(custom("explode"), FailingHandler("boom"));

    let event = AutomationEvent::new("invoice_paid", json!({ "invoice_id": "inv-3" }));
    ctx.engine_with(registry).process_event(&event).await.unwrap();

    let logs = ctx.store.execution_logs();
    assert_eq!(logs.len(), 1);
    let actions = &logs[0].actions_executed;
    assert_eq!(actions.len(), 2);
    assert!(!actions[0].success);
    assert!(!actions[0].error.as_deref().unwrap_or_default().is_empty());
    assert!(actions[1].success);
    assert_eq!(logs[0].status, ExecutionStatus::PartialFailure);
    assert_eq!(logs[0].error_message.as_deref(), Some("invalid action config: boom"));

    assert_eq!(ctx.store.activities()[0].message.as_deref(), Some("Paid inv-3"));
}

#[tokio::test]
async fn test_panicking_action_is_recorded_and_the_next_action_runs() {
    let ctx = TestContext::new();
    ctx.add_rule(RuleFixture::on(TriggerType::InvoicePaid).actions(json!([
        { "type": "explode", "config": {} },
        { "type": "log_activity", "config": { "message": "Paid" } }
    ])));
    let engine = ctx.engine_with(ActionRegistry::with_defaults().with_handler(custom("explode"), PanickingHandler));

    let report = engine
        .process_event(&AutomationEvent::new("invoice_paid", json!({})))
        .await
        .unwrap();
    assert_eq!(report.entries_logged, 1);

    let logs = ctx.store.execution_logs();
    assert_eq!(logs[0].status, ExecutionStatus::PartialFailure);
    assert_eq!(logs[0].actions_executed.len(), 2);
    assert_eq!(logs[0].actions_executed[0].action_type, "explode");
    assert!(!logs[0].actions_executed[0].success);
    assert!(logs[0].actions_executed[1].success);
    assert_eq!(ctx.store.activities().len(), 1);
}

#[tokio::test]
async fn test_failure_messages_are_joined() {
    let ctx = TestContext::new();
    ctx.add_rule(RuleFixture::on(TriggerType::QuoteSigned).actions(json!([
        { "type": "first", "config": {} },
        { "type": "second", "config": {} }
    ])));
    let registry = ActionRegistry::with_defaults()
        .with_handler(custom("first"), FailingHandler("one"))
        .with_handler(custom("second"), FailingHandler("two"));

    ctx.engine_with(registry)
        .process_event(&AutomationEvent::new("quote_signed", json!({})))
        .await
        .unwrap();

    let logs = ctx.store.execution_logs();
    assert_eq!(logs[0].status, ExecutionStatus::PartialFailure);
    assert_eq!(
        logs[0].error_message.as_deref(),
        Some("invalid action config: one; invalid action config: two")
    );
}

#[tokio::test]
async fn test_false_conditions_write_nothing() {
    let ctx = TestContext::new();
    ctx.add_rule(
        RuleFixture::on(TriggerType::InvoiceOverdue)
            .conditions(json!([{ "field": "days_overdue", "operator": "greater_than", "value": 30 }]))
            .actions(json!([{ "type": "log_activity", "config": { "message": "Escalate" } }])),
    );

    let event = AutomationEvent::invoice_overdue("inv-1", "c1", 99.0, 10);
    let report = ctx.engine().process_event(&event).await.unwrap();

    assert_eq!(report.rules_matched, 1);
    assert_eq!(report.rules_skipped, 1);
    assert_eq!(report.entries_logged, 0);
    assert_eq!(ctx.store.write_count(), 0);
}

#[tokio::test]
async fn test_no_matching_rules_writes_nothing() {
    let ctx = TestContext::new();
    ctx.add_rule(RuleFixture::on(TriggerType::ClientCreated).disabled().actions(json!([
        { "type": "log_activity", "config": {} }
    ])));
    ctx.add_rule(RuleFixture::on(TriggerType::ProjectCreated).actions(json!([
        { "type": "log_activity", "config": {} }
    ])));

    let event = AutomationEvent::new("client_created", json!({ "username": fake_username() }));
    let report = ctx.engine().process_event(&event).await.unwrap();

    assert_eq!(report, DispatchReport::default());
    assert_eq!(ctx.store.write_count(), 0);
}

#[tokio::test]
async fn test_unrecognised_event_type_is_ignored() {
    let ctx = TestContext::new();
    ctx.add_rule(RuleFixture::on(TriggerType::ProjectCreated).actions(json!([
        { "type": "log_activity", "config": {} }
    ])));

    let report = ctx
        .engine()
        .process_event(&AutomationEvent::new("ticket_created", json!({})))
        .await
        .unwrap();

    assert_eq!(report, DispatchReport::default());
    assert_eq!(ctx.store.write_count(), 0);
}

#[tokio::test]
async fn test_malformed_rule_fails_without_affecting_others() {
    let ctx = TestContext::new();
    let broken = ctx.add_rule(
        RuleFixture::on(TriggerType::ClientComment)
            .named("broken")
            .conditions(json!({ "not": "a list" }))
            .actions(json!([{ "type": "log_activity", "config": {} }])),
    );
    let healthy = ctx.add_rule(
        RuleFixture::on(TriggerType::ClientComment)
            .named("healthy")
            .actions(json!([{ "type": "log_activity", "config": { "message": "Comment" } }])),
    );

    let report = ctx
        .engine()
        .process_event(&AutomationEvent::new("client_comment", json!({ "comment": "hi" })))
        .await
        .unwrap();
    assert_eq!(report.entries_logged, 2);

    let logs = ctx.store.execution_logs();
    let broken_log = logs.iter().find(|l| l.rule_id == broken.id).unwrap();
    assert_eq!(broken_log.status, ExecutionStatus::Failed);
    assert!(broken_log.actions_executed.is_empty());
    assert!(broken_log.error_message.as_deref().unwrap().starts_with("invalid conditions"));

    let healthy_log = logs.iter().find(|l| l.rule_id == healthy.id).unwrap();
    assert_eq!(healthy_log.status, ExecutionStatus::Success);
    assert_eq!(ctx.store.activities().len(), 1);
}

#[tokio::test]
async fn test_malformed_actions_fail_the_rule() {
    let ctx = TestContext::new();
    ctx.add_rule(RuleFixture::on(TriggerType::ApprovalStatusChanged).actions(json!([{ "config": {} }])));

    ctx.engine()
        .process_event(&AutomationEvent::new("approval_status_changed", json!({})))
        .await
        .unwrap();

    let logs = ctx.store.execution_logs();
    assert_eq!(logs[0].status, ExecutionStatus::Failed);
    assert!(logs[0].error_message.as_deref().unwrap().starts_with("invalid actions"));
}

#[tokio::test]
async fn test_unknown_operator_permissive_and_strict() {
    let fixture = RuleFixture::on(TriggerType::FileUploaded)
        .conditions(json!([{ "field": "file_name", "operator": "matches", "value": "*.pdf" }]))
        .actions(json!([{ "type": "log_activity", "config": {} }]));

    let ctx = TestContext::new();
    ctx.add_rule(fixture.clone());
    ctx.engine()
        .process_event(&AutomationEvent::new("file_uploaded", json!({ "file_name": "a.pdf" })))
        .await
        .unwrap();
    assert_eq!(ctx.store.execution_logs()[0].status, ExecutionStatus::Success);
    assert_eq!(ctx.store.activities().len(), 1);

    let ctx = TestContext::new();
    ctx.add_rule(fixture);
    ctx.engine()
        .strict(true)
        .process_event(&AutomationEvent::new("file_uploaded", json!({ "file_name": "a.pdf" })))
        .await
        .unwrap();
    let logs = ctx.store.execution_logs();
    assert_eq!(logs[0].status, ExecutionStatus::Failed);
    assert_eq!(logs[0].error_message.as_deref(), Some("unknown condition operator 'matches'"));
    assert!(ctx.store.activities().is_empty());
}

#[tokio::test]
async fn test_unknown_action_type_recorded_as_success_unless_strict() {
    let fixture = RuleFixture::on(TriggerType::InvoicePaid)
        .actions(json!([{ "type": "unknown_action", "config": {} }]));

    let ctx = TestContext::new();
    ctx.add_rule(fixture.clone());
    ctx.engine()
        .process_event(&AutomationEvent::new("invoice_paid", json!({})))
        .await
        .unwrap();
    let logs = ctx.store.execution_logs();
    assert_eq!(logs[0].status, ExecutionStatus::Success);
    assert!(logs[0].actions_executed[0].success);
    assert_eq!(logs[0].actions_executed[0].action_type, "unknown_action");

    let ctx = TestContext::new();
    ctx.add_rule(fixture);
    ctx.engine()
        .strict(true)
        .process_event(&AutomationEvent::new("invoice_paid", json!({})))
        .await
        .unwrap();
    let logs = ctx.store.execution_logs();
    assert_eq!(logs[0].status, ExecutionStatus::PartialFailure);
    assert_eq!(logs[0].error_message.as_deref(), Some("unknown action type 'unknown_action'"));
}

#[tokio::test]
async fn test_missing_project_is_an_action_failure() {
    let ctx = TestContext::new();
    ctx.store.add_project("p1", "active");
    ctx.add_rule(RuleFixture::on(TriggerType::ProjectStatusChanged).actions(json!([
        { "type": "change_project_status", "config": { "status": "archived" } }
    ])));

    let engine = ctx.engine();
    engine
        .process_event(&AutomationEvent::new("project_status_changed", json!({ "project_id": "p1" })))
        .await
        .unwrap();
    engine
        .process_event(&AutomationEvent::new("project_status_changed", json!({ "project_id": "p2" })))
        .await
        .unwrap();

    assert_eq!(ctx.store.project("p1").unwrap().status, "archived");
    let logs = ctx.store.execution_logs();
    assert_eq!(logs[0].status, ExecutionStatus::Success);
    assert_eq!(logs[1].status, ExecutionStatus::PartialFailure);
    assert_eq!(logs[1].error_message.as_deref(), Some("Project 'p2' not found"));
}

#[tokio::test]
async fn test_log_write_failure_is_counted_and_actions_still_run() {
    let ctx = TestContext::new();
    ctx.store.fail_execution_log_writes(true);
    ctx.add_rule(RuleFixture::on(TriggerType::ProjectCreated).actions(json!([
        { "type": "create_notification", "config": { "recipient": "ops", "title": "New project" } }
    ])));
    ctx.add_rule(RuleFixture::on(TriggerType::ProjectCreated).actions(json!([
        { "type": "log_activity", "config": {} }
    ])));

    let report = ctx
        .engine()
        .process_event(&AutomationEvent::new("project_created", json!({})))
        .await
        .unwrap();

    assert_eq!(report.rules_matched, 2);
    assert_eq!(report.entries_logged, 0);
    assert_eq!(report.log_write_failures, 2);
    assert_eq!(ctx.store.notifications().len(), 1);
    assert_eq!(ctx.store.activities().len(), 1);
    assert!(ctx.store.execution_logs().is_empty());
}

#[tokio::test]
async fn test_execution_count_increments_only_when_run() {
    let ctx = TestContext::new();
    let rule = ctx.add_rule(
        RuleFixture::on(TriggerType::InvoicePaid)
            .conditions(json!([{ "field": "amount", "operator": "greater_than", "value": 100 }]))
            .actions(json!([{ "type": "fire_webhook", "config": { "url": "https://example.com" } }])),
    );

    let engine = ctx.engine();
    for amount in [50, 150, 250] {
        engine
            .process_event(&AutomationEvent::new("invoice_paid", json!({ "amount": amount })))
            .await
            .unwrap();
    }

    assert_eq!(ctx.store.get_rule(rule.id).await.unwrap().execution_count, 2);
    assert_eq!(ctx.store.execution_logs().len(), 2);
}

#[tokio::test]
async fn test_actions_run_in_declared_order() {
    let ctx = TestContext::new();
    let recorder = RecordingHandler::default();
    ctx.add_rule(RuleFixture::on(TriggerType::QuoteSigned).actions(json!([
        { "type": "record", "config": { "label": "first" } },
        { "type": "record", "config": { "label": "second" } },
        { "type": "record", "config": { "label": "third" } }
    ])));
    let registry = ActionRegistry::with_defaults().with_handler(custom("record"), recorder.clone());

    ctx.engine_with(registry)
        .process_event(&AutomationEvent::new("quote_signed", json!({})))
        .await
        .unwrap();

    assert_eq!(recorder.calls(), vec!["first", "second", "third"]);
    let logged: Vec<_> = ctx.store.execution_logs()[0]
        .actions_executed
        .iter()
        .map(|a| a.action_type.clone())
        .collect();
    assert_eq!(logged, vec!["record", "record", "record"]);
}

#[tokio::test]
async fn test_stub_actions_only_write_audit_rows() {
    let ctx = TestContext::new();
    let username = fake_username();
    ctx.add_rule(RuleFixture::on(TriggerType::QuoteSigned).actions(json!([
        { "type": "create_invoice", "config": { "template": "deposit" } },
        { "type": "send_email", "config": { "to": "{{email}}", "subject": "Quote {{quote_id}} signed" } },
        { "type": "fire_webhook", "config": { "url": "https://hooks.example.com" } }
    ])));

    let event = AutomationEvent::new(
        "quote_signed",
        json!({ "username": username, "quote_id": "q-9", "email": "client@example.com" }),
    );
    ctx.engine().process_event(&event).await.unwrap();

    let activities = ctx.store.activities();
    assert_eq!(activities.len(), 2);
    assert_eq!(activities[0].action_type, "automation_create_invoice");
    assert_eq!(activities[1].action_type, "automation_send_email");
    assert_eq!(activities[1].username.as_deref(), Some(username.as_str()));
    assert!(ctx.store.notifications().is_empty());
    assert_eq!(ctx.store.execution_logs()[0].status, ExecutionStatus::Success);
    assert_eq!(ctx.store.execution_logs()[0].actions_executed.len(), 3);
}
