use super::context::{ControllerContext, SharedContext};
use super::task::{TaskId, TaskState};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Lifecycle phase carried by a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Queued,
    Downloading,
    Paused,
}

impl Phase {
    pub fn state(self) -> TaskState {
        match self {
            Self::Queued => TaskState::Queued,
            Self::Downloading => TaskState::Downloading,
            Self::Paused => TaskState::Paused,
        }
    }

    /// Status label used when the event carries none
    fn status_key(self) -> &'static str {
        match self {
            Self::Queued => "status-waiting",
            Self::Downloading => "status-downloading",
            Self::Paused => "status-paused",
        }
    }
}

fn default_phase() -> Phase {
    Phase::Downloading
}

/// Out-of-band notification pushed by the backend.
///
/// ```json
/// {"type":"progress","task_id":"t1","percent":45,"phase":"downloading","status":"Downloading"}
/// {"type":"complete","task_id":"t1"}
/// {"type":"error","task_id":"t1","message":"HTTP 403"}
/// {"type":"cancelled","task_id":"t1"}
/// ```
///
/// A missing or negative `percent` leaves the bar unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress {
        task_id: TaskId,
        #[serde(default)]
        percent: Option<f64>,
        #[serde(default = "default_phase")]
        phase: Phase,
        #[serde(default)]
        status: String,
    },
    Complete {
        task_id: TaskId,
    },
    Error {
        task_id: TaskId,
        #[serde(default)]
        message: String,
    },
    Cancelled {
        task_id: TaskId,
    },
}

impl ProgressEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Progress { task_id, .. }
            | Self::Complete { task_id }
            | Self::Error { task_id, .. }
            | Self::Cancelled { task_id } => task_id,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn progress(task_id: &TaskId, percent: f64, phase: Phase, status: impl Into<String>) -> Self {
        Self::Progress {
            task_id: task_id.clone(),
            percent: Some(percent),
            phase,
            status: status.into(),
        }
    }
}

/// Feeds push events into the registry
#[derive(Clone)]
pub struct ProgressIngestor {
    context: SharedContext,
}

impl ProgressIngestor {
    pub fn new(context: SharedContext) -> Self {
        Self { context }
    }

    /// Apply one event; returns whether it changed anything
    pub async fn apply(&self, event: ProgressEvent) -> bool {
        let mut ctx = self.context.lock().await;
        apply_event(&mut ctx, event)
    }

    pub async fn run(self, mut events: mpsc::Receiver<ProgressEvent>) {
        while let Some(event) = events.recv().await {
            self.apply(event).await;
        }
        tracing::debug!("Progress channel closed");
    }

    pub fn spawn(self, events: mpsc::Receiver<ProgressEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}

/// Events for unknown or terminal tasks are dropped
pub fn apply_event(ctx: &mut ControllerContext, event: ProgressEvent) -> bool {
    let id = event.task_id().clone();
    if !ctx.registry.contains(&id) {
        tracing::debug!("Event for unknown task {} ignored", id);
        return false;
    }
    tracing::trace!("Event: {:?}", event);

    let applied = match event {
        ProgressEvent::Progress {
            percent,
            phase,
            status,
            ..
        } => {
            let status = if status.trim().is_empty() {
                ctx.t(phase.status_key())
            } else {
                status
            };
            let percent = percent.filter(|p| p.is_finite()).map(|p| p.floor() as i64);
            ctx.registry
                .update(&id, |t| t.apply_progress(percent, phase.state(), status))
        }
        ProgressEvent::Complete { .. } => {
            let label = ctx.t("status-completed");
            ctx.registry.update(&id, |t| t.complete(label))
        }
        ProgressEvent::Error { message, .. } => {
            let message = if message.trim().is_empty() {
                ctx.t("status-failed")
            } else {
                message
            };
            let cancelled = ctx.t("status-cancelled");
            ctx.registry.update(&id, |t| t.fail(message, cancelled))
        }
        ProgressEvent::Cancelled { .. } => {
            let label = ctx.t("status-cancelled");
            ctx.registry.update(&id, |t| t.confirm_cancelled(label))
        }
    }
    .unwrap_or(false);

    if applied {
        if let Some(task) = ctx.registry.get(&id) {
            if task.is_terminal() {
                tracing::info!("Task {} finished: {:?}", id, task.state());
            }
        }
        ctx.commit(&id);
    } else {
        tracing::debug!("Event for task {} ignored in its current state", id);
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_progress() {
        let event = ProgressEvent::from_json(
            r#"{"type":"progress","task_id":"t1","percent":45,"phase":"downloading","status":"Downloading"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ProgressEvent::Progress {
                task_id: TaskId::new("t1"),
                percent: Some(45.0),
                phase: Phase::Downloading,
                status: "Downloading".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_progress_defaults() {
        let event = ProgressEvent::from_json(r#"{"type":"progress","task_id":"t1"}"#).unwrap();
        match event {
            ProgressEvent::Progress {
                percent,
                phase,
                status,
                ..
            } => {
                assert!(percent.is_none());
                assert_eq!(phase, Phase::Downloading);
                assert!(status.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_terminal_events() {
        let complete = ProgressEvent::from_json(r#"{"type":"complete","task_id":"a"}"#).unwrap();
        assert_eq!(complete.task_id().as_str(), "a");

        let error =
            ProgressEvent::from_json(r#"{"type":"error","task_id":"b","message":"HTTP 403"}"#).unwrap();
        assert!(matches!(error, ProgressEvent::Error { ref message, .. } if message == "HTTP 403"));

        let cancelled = ProgressEvent::from_json(r#"{"type":"cancelled","task_id":"c"}"#).unwrap();
        assert_eq!(cancelled, ProgressEvent::Cancelled { task_id: TaskId::new("c") });
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(ProgressEvent::from_json(r#"{"type":"speed","task_id":"a"}"#).is_err());
        assert!(ProgressEvent::from_json(r#"{"type":"progress","task_id":"a","phase":"done"}"#).is_err());
    }

    #[test]
    fn test_serialize_shape() {
        let json = serde_json::to_value(ProgressEvent::Complete {
            task_id: TaskId::new("t1"),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "complete", "task_id": "t1"}));
    }
}
