use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, AppError, ValidationBuilder};
use crate::store::{ExecutionLogQuery, DEFAULT_LOG_LIMIT};
use crate::workflows::AutomationEvent;
use crate::AppState;
use automation_shared::{AutomationRule, ExecutionLogEntry, ExecutionStatus, RuleInput, TriggerType};

const MAX_RULE_NAME_LEN: usize = 200;

pub fn automation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", post(dispatch_event))
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/:id", get(get_rule).put(update_rule).delete(delete_rule))
        .route("/executions", get(list_executions))
}

/// Accept a business event and return before any rule runs.
async fn dispatch_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<AutomationEvent>,
) -> (StatusCode, Json<Value>) {
    let body = json!({
        "accepted": true,
        "type": event.event_type,
        "event_id": event.event_id
    });

    state.dispatcher.dispatch(event);

    (StatusCode::ACCEPTED, Json(body))
}

#[derive(Debug, Deserialize)]
pub struct RuleListQuery {
    pub trigger: Option<String>,
}

async fn list_rules(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RuleListQuery>,
) -> ApiResult<Json<Vec<AutomationRule>>> {
    let trigger = params
        .trigger
        .as_deref()
        .map(str::parse::<TriggerType>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(state.store.list_rules(trigger).await?))
}

async fn get_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AutomationRule>> {
    Ok(Json(state.store.get_rule(id).await?))
}

async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RuleInput>,
) -> ApiResult<(StatusCode, Json<AutomationRule>)> {
    validate_rule(&input)?;

    let rule = state.store.create_rule(&input).await?;
    tracing::info!("Created automation rule '{}' ({}) on {}", rule.name, rule.id, rule.trigger);

    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(input): Json<RuleInput>,
) -> ApiResult<Json<AutomationRule>> {
    validate_rule(&input)?;
    Ok(Json(state.store.update_rule(id, &input).await?))
}

async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete_rule(id).await?;
    tracing::info!("Deleted automation rule {}", id);
    Ok(StatusCode::NO_CONTENT)
}

fn validate_rule(input: &RuleInput) -> Result<(), AppError> {
    let name = input.name.trim();
    let mut validation = ValidationBuilder::new()
        .check(name.is_empty(), "name", "Name is required")
        .check(
            name.chars().count() > MAX_RULE_NAME_LEN,
            "name",
            "Name must be at most 200 characters",
        );

    for (index, condition) in input.conditions.iter().enumerate() {
        validation = validation.check(
            condition.field.trim().is_empty(),
            &format!("conditions[{}].field", index),
            "Field path is required",
        );
    }

    match validation.build() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecutionListQuery {
    pub rule_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

async fn list_executions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExecutionListQuery>,
) -> ApiResult<Json<Vec<ExecutionLogEntry>>> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<ExecutionStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let query = ExecutionLogQuery {
        rule_id: params.rule_id,
        status,
        limit: params.limit.unwrap_or(DEFAULT_LOG_LIMIT),
    };

    Ok(Json(state.store.list_execution_logs(&query).await?))
}
