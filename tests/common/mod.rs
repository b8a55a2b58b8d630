use async_trait::async_trait;
use mediaq::download::Controller;
use mediaq::download::media::{DownloadRequest, FormatOption};
use mediaq::download::task::TaskId;
use mediaq::gateway::{GatewayError, TaskGateway};
use mediaq::util::i18n::LocalizationManager;
use mediaq::view::ProjectorOptions;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// Initialize logging once for all tests
#[allow(dead_code)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// One recorded gateway call: operation name and its main argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub arg: String,
}

/// Gateway that answers from per-operation reply queues.
///
/// An operation with an empty queue answers `{"success": true}`. A held
/// operation waits for its [`Notify`] before answering.
#[derive(Default)]
pub struct ScriptedGateway {
    ready: AtomicBool,
    replies: Mutex<HashMap<&'static str, VecDeque<Result<Value, GatewayError>>>>,
    calls: Mutex<Vec<Call>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

#[allow(dead_code)]
impl ScriptedGateway {
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.set_ready(true);
        gateway
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn reply(&self, op: &'static str, value: Value) -> &Self {
        self.push(op, Ok(value))
    }

    pub fn fail(&self, op: &'static str, error: GatewayError) -> &Self {
        self.push(op, Err(error))
    }

    fn push(&self, op: &'static str, reply: Result<Value, GatewayError>) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(reply);
        self
    }

    /// Make `op` wait until the returned handle is notified
    pub fn hold(&self, op: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(op, Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.op == op)
            .map(|c| c.arg)
            .collect()
    }

    async fn answer(&self, op: &'static str, arg: String) -> Result<Value, GatewayError> {
        self.calls.lock().unwrap().push(Call { op, arg });
        let gate = self.gates.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .get_mut(op)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(json!({"success": true})))
    }
}

#[async_trait]
impl TaskGateway for ScriptedGateway {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn analyze(&self, url: &str) -> Result<Value, GatewayError> {
        self.answer("analyze", url.to_string()).await
    }

    async fn start_download(&self, url: &str, format_id: &str) -> Result<Value, GatewayError> {
        self.answer("start_download", format!("{} {}", url, format_id))
            .await
    }

    async fn start_batch_download(
        &self,
        urls: &[String],
        format_id: &str,
    ) -> Result<Value, GatewayError> {
        self.answer("start_batch_download", format!("{} {}", urls.join(","), format_id))
            .await
    }

    async fn pause_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.answer("pause_download", task_id.to_string()).await
    }

    async fn resume_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.answer("resume_download", task_id.to_string()).await
    }

    async fn retry_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.answer("retry_download", task_id.to_string()).await
    }

    async fn cancel_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.answer("cancel_download", task_id.to_string()).await
    }
}

#[allow(dead_code)]
pub fn i18n() -> Arc<LocalizationManager> {
    Arc::new(LocalizationManager::new("en").unwrap())
}

/// Controller over a scripted gateway with default view options
#[allow(dead_code)]
pub fn create_test_controller(gateway: ScriptedGateway) -> Controller<ScriptedGateway> {
    Controller::new(Arc::new(gateway), i18n(), ProjectorOptions::default())
}

#[allow(dead_code)]
pub fn request(url: &str, format_id: &str) -> DownloadRequest {
    DownloadRequest {
        url: url.to_string(),
        title: "Clip".to_string(),
        format: FormatOption {
            id: format_id.to_string(),
            label: format_id.to_string(),
            ext: "MP4".to_string(),
            size: Some("12.3 MB".to_string()),
        },
    }
}

#[allow(dead_code)]
pub fn accepted(task_id: &str) -> Value {
    json!({"success": true, "task_id": task_id})
}

#[allow(dead_code)]
pub fn refused(error: &str) -> Value {
    json!({"success": false, "error": error})
}

/// Start one download that the gateway accepts as `task_id`
#[allow(dead_code)]
pub async fn start_task(controller: &Controller<ScriptedGateway>, url: &str, task_id: &str) -> TaskId {
    controller.gateway().reply("start_download", accepted(task_id));
    controller
        .dispatcher()
        .start_download(request(url, "720p"))
        .await
        .expect("start accepted")
}

/// Yield until the gateway has seen `count` calls to `op`
#[allow(dead_code)]
pub async fn wait_for_calls(gateway: &ScriptedGateway, op: &str, count: usize) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while gateway.calls_to(op).len() < count {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {} call(s) to {}", count, op));
}
