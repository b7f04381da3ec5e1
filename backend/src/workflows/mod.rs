// Workflow Automation Engine
//
// Event-driven rule engine: business events are matched against admin-defined
// rules, whose conditions gate a list of side-effecting actions.

pub mod actions;
pub mod conditions;
pub mod dispatcher;
pub mod engine;
pub mod templates;
pub mod triggers;

pub use actions::{ActionConfig, ActionError, ActionHandler, ActionRegistry};
pub use conditions::{ConditionEvaluator, UnknownOperator};
pub use dispatcher::{DispatchHandle, EventDispatcher};
pub use engine::{AutomationEngine, DispatchReport, EngineError};
pub use triggers::{Actor, AutomationEvent};
