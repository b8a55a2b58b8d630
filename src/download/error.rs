use super::task::{PendingIntent, TaskId, TaskState};
use thiserror::Error;

/// Errors raised by the task registry and state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("task {0} already exists")]
    DuplicateTask(TaskId),

    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("cannot {action} task {id} while {state:?}")]
    InvalidTransition {
        id: TaskId,
        action: &'static str,
        state: TaskState,
    },

    #[error("task {id} already has a pending {intent:?} request")]
    IntentInFlight { id: TaskId, intent: PendingIntent },
}

impl ControllerError {
    pub fn invalid(id: &TaskId, action: &'static str, state: TaskState) -> Self {
        Self::InvalidTransition {
            id: id.clone(),
            action,
            state,
        }
    }
}
