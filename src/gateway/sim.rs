//! In-process backend used by `--sim` and the tests.
//!
//! Each task gets a worker that advances progress on a fixed tick and pushes
//! [`ProgressEvent`]s down the channel returned by [`SimGateway::new`].
//! Links containing `fail` break partway through until retried; links
//! containing `invalid` are refused by analyze and start.

use super::{GatewayError, TaskGateway};
use crate::download::ingest::{Phase, ProgressEvent};
use crate::download::task::{TaskId, TaskState};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Delay between progress steps
    pub tick: Duration,
    /// Percent added per step
    pub step: u8,
    /// Percent at which a failing link breaks
    pub fail_at: u8,
    /// Whether the backend reports ready from the start
    pub ready: bool,
    pub channel_capacity: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(250),
            step: 5,
            fail_at: 40,
            ready: true,
            channel_capacity: 256,
        }
    }
}

struct SimTask {
    progress: u8,
    state: TaskState,
    fail_at: Option<u8>,
    worker: Option<JoinHandle<()>>,
}

type SimTasks = Arc<Mutex<HashMap<TaskId, SimTask>>>;

pub struct SimGateway {
    options: SimOptions,
    ready: AtomicBool,
    tasks: SimTasks,
    events: mpsc::Sender<ProgressEvent>,
}

impl SimGateway {
    pub fn new(options: SimOptions) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (events, rx) = mpsc::channel(options.channel_capacity.max(1));
        let gateway = Self {
            ready: AtomicBool::new(options.ready),
            options,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            events,
        };
        (gateway, rx)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Backend-side state of a task, if it exists
    pub async fn task_state(&self, id: &TaskId) -> Option<TaskState> {
        self.tasks.lock().await.get(id).map(|t| t.state)
    }

    fn check_ready(&self) -> Result<(), GatewayError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(GatewayError::Unavailable)
        }
    }

    fn spawn_worker(&self, id: TaskId) -> JoinHandle<()> {
        tokio::spawn(run_worker(
            Arc::clone(&self.tasks),
            self.events.clone(),
            id,
            self.options.tick,
            self.options.step.max(1),
        ))
    }

    async fn emit(&self, event: ProgressEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("Sim event dropped, receiver closed");
        }
    }

    /// Register a task and start its worker
    async fn create_task(&self, url: &str) -> TaskId {
        let id = TaskId::new(Uuid::new_v4().to_string());
        let fail_at = url.contains("fail").then_some(self.options.fail_at);
        {
            let mut tasks = self.tasks.lock().await;
            let worker = self.spawn_worker(id.clone());
            tasks.insert(
                id.clone(),
                SimTask {
                    progress: 0,
                    state: TaskState::Queued,
                    fail_at,
                    worker: Some(worker),
                },
            );
        }
        tracing::debug!("Sim task {} created for {}", id, url);
        self.emit(ProgressEvent::progress(&id, 0.0, Phase::Queued, "")).await;
        id
    }
}

async fn run_worker(
    tasks: SimTasks,
    events: mpsc::Sender<ProgressEvent>,
    id: TaskId,
    tick: Duration,
    step: u8,
) {
    loop {
        tokio::time::sleep(tick).await;
        let event = {
            let mut tasks = tasks.lock().await;
            let Some(task) = tasks.get_mut(&id) else {
                return;
            };
            if task.state.is_terminal() || task.state == TaskState::Paused {
                return;
            }
            task.progress = task.progress.saturating_add(step).min(100);
            if task.fail_at.is_some_and(|at| task.progress >= at) {
                task.state = TaskState::Failed;
                task.worker = None;
                ProgressEvent::Error {
                    task_id: id.clone(),
                    message: "Simulated network failure".to_string(),
                }
            } else if task.progress >= 100 {
                task.state = TaskState::Completed;
                task.worker = None;
                ProgressEvent::Complete {
                    task_id: id.clone(),
                }
            } else {
                task.state = TaskState::Downloading;
                ProgressEvent::progress(&id, f64::from(task.progress), Phase::Downloading, "")
            }
        };
        let finished = !matches!(event, ProgressEvent::Progress { .. });
        if events.send(event).await.is_err() || finished {
            return;
        }
    }
}

fn accepted(id: &TaskId) -> Value {
    json!({"success": true, "task_id": id})
}

fn refused(message: impl Into<String>) -> Value {
    json!({"success": false, "error": message.into()})
}

fn title_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()?
                .filter(|s| !s.is_empty())
                .last()
                .map(str::to_string)
        })
        .unwrap_or_else(|| url.to_string())
}

#[async_trait]
impl TaskGateway for SimGateway {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn analyze(&self, url: &str) -> Result<Value, GatewayError> {
        self.check_ready()?;
        if url.contains("invalid") {
            return Ok(refused("Unsupported URL"));
        }
        tokio::time::sleep(self.options.tick).await;
        Ok(json!({
            "success": true,
            "data": {
                "url": url,
                "title": title_from_url(url),
                "duration": 212,
                "duration_str": "3:32",
                "uploader": "sim",
                "site": "sim",
                "formats": [
                    {"id": "best", "label": "Best Quality", "ext": "MP4"},
                    {"id": "1080p", "label": "1080p", "ext": "MP4", "size": "120 MB"},
                    {"id": "720p", "label": "720p", "ext": "MP4", "size": "64 MB"},
                    {"id": "audio", "label": "Audio only", "ext": "M4A", "size": "4 MB"},
                ],
            },
        }))
    }

    async fn start_download(&self, url: &str, format_id: &str) -> Result<Value, GatewayError> {
        self.check_ready()?;
        if url.contains("invalid") {
            return Ok(refused("Unsupported URL"));
        }
        tracing::debug!("Sim start {} ({})", url, format_id);
        let id = self.create_task(url).await;
        Ok(accepted(&id))
    }

    async fn start_batch_download(
        &self,
        urls: &[String],
        format_id: &str,
    ) -> Result<Value, GatewayError> {
        self.check_ready()?;
        if urls.is_empty() {
            return Ok(refused("No URLs given"));
        }
        tracing::debug!("Sim batch of {} ({})", urls.len(), format_id);
        let mut created = Vec::with_capacity(urls.len());
        for url in urls {
            let id = self.create_task(url).await;
            created.push(json!({"task_id": id, "url": url, "title": title_from_url(url)}));
        }
        Ok(json!({"success": true, "tasks": created}))
    }

    async fn pause_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.check_ready()?;
        let progress = {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.get_mut(task_id) else {
                return Ok(refused("Task not found"));
            };
            if !matches!(task.state, TaskState::Queued | TaskState::Downloading) {
                return Ok(refused(format!("Cannot pause a {:?} task", task.state)));
            }
            if let Some(worker) = task.worker.take() {
                worker.abort();
            }
            task.state = TaskState::Paused;
            task.progress
        };
        self.emit(ProgressEvent::progress(task_id, f64::from(progress), Phase::Paused, ""))
            .await;
        Ok(accepted(task_id))
    }

    async fn resume_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.check_ready()?;
        let progress = {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.get_mut(task_id) else {
                return Ok(refused("Task not found"));
            };
            if task.state != TaskState::Paused {
                return Ok(refused(format!("Cannot resume a {:?} task", task.state)));
            }
            task.state = TaskState::Downloading;
            task.worker = Some(self.spawn_worker(task_id.clone()));
            task.progress
        };
        self.emit(ProgressEvent::progress(
            task_id,
            f64::from(progress),
            Phase::Downloading,
            "",
        ))
        .await;
        Ok(accepted(task_id))
    }

    async fn retry_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.check_ready()?;
        {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.get_mut(task_id) else {
                return Ok(refused("Task not found"));
            };
            if task.state != TaskState::Failed {
                return Ok(refused(format!("Cannot retry a {:?} task", task.state)));
            }
            task.progress = 0;
            task.fail_at = None;
            task.state = TaskState::Queued;
            task.worker = Some(self.spawn_worker(task_id.clone()));
        }
        self.emit(ProgressEvent::progress(task_id, 0.0, Phase::Queued, ""))
            .await;
        Ok(accepted(task_id))
    }

    async fn cancel_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.check_ready()?;
        {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.get_mut(task_id) else {
                return Ok(refused("Task not found"));
            };
            if task.state.is_terminal() {
                return Ok(refused("Task already finished"));
            }
            if let Some(worker) = task.worker.take() {
                worker.abort();
            }
            task.state = TaskState::Cancelled;
        }
        self.emit(ProgressEvent::Cancelled {
            task_id: task_id.clone(),
        })
        .await;
        Ok(accepted(task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::reply::{ActionReply, AnalyzeReply, BatchReply, WireReply};

    fn fast() -> SimOptions {
        SimOptions {
            tick: Duration::from_millis(10),
            step: 25,
            fail_at: 50,
            ..SimOptions::default()
        }
    }

    async fn start(gateway: &SimGateway, url: &str) -> TaskId {
        let reply = ActionReply::from_wire(gateway.start_download(url, "best").await.unwrap());
        assert!(reply.success);
        reply.task_id.unwrap()
    }

    async fn drain_until_terminal(rx: &mut mpsc::Receiver<ProgressEvent>) -> ProgressEvent {
        loop {
            let event = rx.recv().await.unwrap();
            if !matches!(event, ProgressEvent::Progress { .. }) {
                return event;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_runs_to_completion() {
        let (gateway, mut rx) = SimGateway::new(fast());
        let id = start(&gateway, "https://example.com/v/clip").await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first, ProgressEvent::progress(&id, 0.0, Phase::Queued, ""));

        let last = drain_until_terminal(&mut rx).await;
        assert_eq!(last, ProgressEvent::Complete { task_id: id.clone() });
        assert_eq!(gateway.task_state(&id).await, Some(TaskState::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_link_then_retry() {
        let (gateway, mut rx) = SimGateway::new(fast());
        let id = start(&gateway, "https://example.com/fail").await;

        let last = drain_until_terminal(&mut rx).await;
        assert!(matches!(last, ProgressEvent::Error { .. }));

        let reply = ActionReply::from_wire(gateway.retry_download(&id).await.unwrap());
        assert!(reply.success);
        let last = drain_until_terminal(&mut rx).await;
        assert_eq!(last, ProgressEvent::Complete { task_id: id });
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume() {
        let (gateway, mut rx) = SimGateway::new(fast());
        let id = start(&gateway, "https://example.com/a").await;
        rx.recv().await.unwrap();

        let reply = ActionReply::from_wire(gateway.pause_download(&id).await.unwrap());
        assert!(reply.success);
        let paused = rx.recv().await.unwrap();
        assert!(matches!(paused, ProgressEvent::Progress { phase: Phase::Paused, .. }));
        assert_eq!(gateway.task_state(&id).await, Some(TaskState::Paused));

        // Pausing twice is refused
        let reply = ActionReply::from_wire(gateway.pause_download(&id).await.unwrap());
        assert!(!reply.success);

        let reply = ActionReply::from_wire(gateway.resume_download(&id).await.unwrap());
        assert!(reply.success);
        let last = drain_until_terminal(&mut rx).await;
        assert_eq!(last, ProgressEvent::Complete { task_id: id });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_emits_cancelled() {
        let (gateway, mut rx) = SimGateway::new(fast());
        let id = start(&gateway, "https://example.com/a").await;
        rx.recv().await.unwrap();

        gateway.cancel_download(&id).await.unwrap();
        let last = drain_until_terminal(&mut rx).await;
        assert_eq!(last, ProgressEvent::Cancelled { task_id: id.clone() });

        let reply = ActionReply::from_wire(gateway.cancel_download(&id).await.unwrap());
        assert!(!reply.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_creates_tasks() {
        let (gateway, _rx) = SimGateway::new(fast());
        let urls = vec!["https://a/one".to_string(), "https://a/two".to_string()];
        let reply = BatchReply::from_wire(gateway.start_batch_download(&urls, "best").await.unwrap());
        assert!(reply.success);
        assert_eq!(reply.tasks.len(), 2);
        assert_eq!(reply.tasks[1].title.as_deref(), Some("two"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyze() {
        let (gateway, _rx) = SimGateway::new(fast());
        let reply = AnalyzeReply::from_wire(gateway.analyze("https://a/video").await.unwrap());
        let info = reply.data.unwrap();
        assert_eq!(info.title, "video");
        assert_eq!(info.formats.len(), 4);

        let reply = AnalyzeReply::from_wire(gateway.analyze("https://a/invalid").await.unwrap());
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("Unsupported URL"));
    }

    #[tokio::test]
    async fn test_not_ready() {
        let (gateway, _rx) = SimGateway::new(SimOptions {
            ready: false,
            ..fast()
        });
        assert!(matches!(
            gateway.start_download("https://a", "best").await,
            Err(GatewayError::Unavailable)
        ));
        gateway.set_ready(true);
        assert!(gateway.is_ready());
    }
}
