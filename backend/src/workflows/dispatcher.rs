// Event Dispatcher - fire-and-forget entry point for business events

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info_span, Instrument};

use super::engine::{panic_message, AutomationEngine};
use super::triggers::AutomationEvent;

/// Hands events to the engine on a background task. Cheap to clone.
#[derive(Clone)]
pub struct EventDispatcher {
    engine: Arc<AutomationEngine>,
}

impl EventDispatcher {
    pub fn new(engine: AutomationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &Arc<AutomationEngine> {
        &self.engine
    }

    /// Start processing `event` and return immediately. Errors and panics in
    /// the pipeline are logged once and never reach the caller.
    pub fn dispatch(&self, event: AutomationEvent) -> DispatchHandle {
        let engine = Arc::clone(&self.engine);
        let span = info_span!(
            "automation_dispatch",
            event_type = %event.event_type,
            event_id = %event.event_id
        );

        let handle = tokio::spawn(
            async move {
                let run = AssertUnwindSafe(engine.process_event(&event)).catch_unwind();
                match run.await {
                    Ok(Ok(_report)) => {}
                    Ok(Err(e)) => error!("Automation processing failed: {}", e),
                    Err(panic) => error!("Automation processing panicked: {}", panic_message(&*panic)),
                }
            }
            .instrument(span),
        );

        DispatchHandle { handle }
    }
}

/// Handle to one dispatched event. Dropping it does not cancel processing.
#[derive(Debug)]
pub struct DispatchHandle {
    handle: JoinHandle<()>,
}

impl DispatchHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for processing to finish.
    pub async fn join(self) {
        // Panics are caught inside the task, so only runtime cancellation lands here
        if let Err(e) = self.handle.await {
            error!("Automation dispatch task did not complete: {}", e);
        }
    }
}
