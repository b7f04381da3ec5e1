// Workflow Conditions - field/operator/value predicates over event data
//
// A condition list is a logical AND; an empty list always matches.

use serde_json::Value;
use tracing::warn;

use super::templates::{is_falsy, loose_number, loose_string, resolve_path, value_to_string};
use automation_shared::{Condition, ConditionOperator};

#[derive(Debug, thiserror::Error)]
#[error("unknown condition operator '{0}'")]
pub struct UnknownOperator(pub String);

/// Evaluate one condition. `None` means the operator is not recognised.
pub fn evaluate_condition(condition: &Condition, data: &Value) -> Option<bool> {
    let actual = resolve_path(data, &condition.field);
    let expected = &condition.value;

    let matched = match &condition.operator {
        ConditionOperator::Equals => loose_string(actual) == value_to_string(expected),
        ConditionOperator::NotEquals => loose_string(actual) != value_to_string(expected),
        ConditionOperator::Contains => loose_string(actual)
            .to_lowercase()
            .contains(&value_to_string(expected).to_lowercase()),
        ConditionOperator::StartsWith => loose_string(actual)
            .to_lowercase()
            .starts_with(&value_to_string(expected).to_lowercase()),
        // NaN compares false both ways
        ConditionOperator::GreaterThan => loose_number(actual) > loose_number(Some(expected)),
        ConditionOperator::LessThan => loose_number(actual) < loose_number(Some(expected)),
        ConditionOperator::IsEmpty => is_empty(actual),
        ConditionOperator::IsNotEmpty => !is_empty(actual),
        ConditionOperator::Other(_) => return None,
    };

    Some(matched)
}

fn is_empty(value: Option<&Value>) -> bool {
    is_falsy(value) || matches!(value, Some(Value::String(s)) if s.trim().is_empty())
}

/// Evaluates condition lists. Permissive by default: an unknown operator is
/// logged and treated as matching. Strict mode turns it into an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator {
    strict: bool,
}

impl ConditionEvaluator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn evaluate(&self, conditions: &[Condition], data: &Value) -> Result<bool, UnknownOperator> {
        for condition in conditions {
            match evaluate_condition(condition, data) {
                Some(true) => {}
                Some(false) => return Ok(false),
                None if self.strict => {
                    return Err(UnknownOperator(condition.operator.as_str().to_string()));
                }
                None => warn!(
                    field = %condition.field,
                    "Unknown condition operator '{}', treating condition as matched",
                    condition.operator.as_str()
                ),
            }
        }

        Ok(true)
    }
}

/// Permissive evaluation of a condition list.
pub fn evaluate(conditions: &[Condition], data: &Value) -> bool {
    ConditionEvaluator::default()
        .evaluate(conditions, data)
        .unwrap_or(true)
}
