use super::binding::{ButtonKey, ButtonMode};
use super::context::SharedContext;
use super::media::{DEFAULT_FORMAT_ID, DownloadRequest, batch_format_label};
use super::task::{PendingIntent, Task, TaskId, TaskMeta, TaskState};
use crate::gateway::TaskGateway;
use crate::gateway::reply::{ActionReply, BatchReply, WireReply};
use crate::ui::dialog::DialogKind;
use crate::util::url_list::parse_url_list;
use fluent::fluent_args;
use std::sync::Arc;

/// Result of pressing a task's close control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// First press on a live task: cancellation was sent
    CancelRequested,
    /// The task was removed from the registry and both surfaces
    Dismissed,
    /// Unknown task, or the backend was not ready
    Ignored,
}

/// What a format button press resolves to
enum FormatAction {
    Start(DownloadRequest),
    Pause(TaskId),
    Resume(TaskId),
}

/// Turns user actions into gateway calls.
///
/// Every action follows the same shape: resolve the task, fail fast with a
/// warning if the gateway is not ready, apply the optimistic change, await
/// the gateway without holding the context lock, then reconcile.
pub struct ActionDispatcher<G: ?Sized> {
    gateway: Arc<G>,
    context: SharedContext,
}

impl<G: ?Sized> Clone for ActionDispatcher<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            context: Arc::clone(&self.context),
        }
    }
}

impl<G: TaskGateway + ?Sized> ActionDispatcher<G> {
    pub fn new(gateway: Arc<G>, context: SharedContext) -> Self {
        Self { gateway, context }
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    async fn ensure_ready(&self) -> bool {
        if self.gateway.is_ready() {
            return true;
        }
        tracing::warn!("Backend not ready, action ignored");
        let mut ctx = self.context.lock().await;
        let message = ctx.t("msg-backend-not-ready");
        ctx.raise(DialogKind::Warning, "dialog-title-not-ready", message);
        false
    }

    // ========== Start ==========

    /// Start one download from a resolved format. The format button is
    /// disabled while the call is in flight and bound to the new task on
    /// success.
    pub async fn start_download(&self, request: DownloadRequest) -> Option<TaskId> {
        let url = request.url.trim().to_string();
        if url.is_empty() {
            let mut ctx = self.context.lock().await;
            let message = ctx.t("msg-analyze-first");
            ctx.raise(DialogKind::Warning, "dialog-title-notice", message);
            return None;
        }
        if !self.ensure_ready().await {
            return None;
        }

        let key = {
            let mut ctx = self.context.lock().await;
            let key = ctx.buttons.register(request.clone());
            if ctx.buttons.get(&key).is_some_and(|b| !b.enabled || b.task.is_some()) {
                tracing::debug!("Format button {:?} busy, start ignored", key);
                return None;
            }
            ctx.buttons.set_enabled(&key, false);
            key
        };

        let format_id = request.format.normalized_id().to_string();
        tracing::info!("Starting download: {} ({})", url, format_id);
        let result = self.gateway.start_download(&url, &format_id).await;

        let mut ctx = self.context.lock().await;
        let reply = match result {
            Ok(raw) => ActionReply::from_wire(raw),
            Err(e) => {
                tracing::error!("start_download failed for {}: {}", url, e);
                ctx.buttons.set_enabled(&key, true);
                ctx.raise(DialogKind::Error, "dialog-title-system-error", e.to_string());
                return None;
            }
        };

        let Some(id) = reply.task_id.clone().filter(|_| reply.success) else {
            tracing::warn!("start_download rejected for {}: {:?}", url, reply.error);
            ctx.buttons.set_enabled(&key, true);
            let message = reply.error_or(&ctx.t("msg-start-failed"));
            ctx.raise(DialogKind::Error, "dialog-title-download-failed", message);
            return None;
        };

        let task = Task::new(id.clone(), request.meta(), ctx.t("status-waiting"));
        if let Err(e) = ctx.registry.create(task) {
            tracing::error!("Backend returned an id already in use: {}", e);
            ctx.buttons.set_enabled(&key, true);
            ctx.raise(DialogKind::Error, "dialog-title-system-error", e.to_string());
            return None;
        }
        ctx.buttons.bind(&key, id.clone());
        ctx.commit(&id);
        tracing::info!("Task {} created for {}", id, url);
        Some(id)
    }

    /// Start every link in `raw_urls` with one format. Returns the created
    /// ids in input order; the first link ends up on top of the queue.
    pub async fn start_batch(&self, raw_urls: &str, format_id: &str) -> Vec<TaskId> {
        let urls = parse_url_list(raw_urls);
        if urls.is_empty() {
            let mut ctx = self.context.lock().await;
            let message = ctx.t("msg-enter-urls");
            ctx.raise(DialogKind::Warning, "dialog-title-notice", message);
            return Vec::new();
        }
        if !self.ensure_ready().await {
            return Vec::new();
        }

        let format_id = match format_id.trim() {
            "" => DEFAULT_FORMAT_ID,
            id => id,
        };
        tracing::info!("Starting batch of {} link(s) ({})", urls.len(), format_id);
        let result = self.gateway.start_batch_download(&urls, format_id).await;

        let mut ctx = self.context.lock().await;
        let reply = match result {
            Ok(raw) => BatchReply::from_wire(raw),
            Err(e) => {
                tracing::error!("start_batch_download failed: {}", e);
                ctx.raise(DialogKind::Error, "dialog-title-system-error", e.to_string());
                return Vec::new();
            }
        };
        if !reply.success {
            let message = reply
                .error
                .clone()
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| ctx.t("msg-batch-failed"));
            ctx.raise(DialogKind::Error, "dialog-title-batch-failed", message);
            return Vec::new();
        }

        let label = batch_format_label(format_id);
        let status = ctx.t("status-waiting");
        let mut created = Vec::new();
        // Registry prepends, so walk backwards to keep the first link on top
        for entry in reply.tasks.iter().rev() {
            let title = entry
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| entry.url.clone());
            let meta = TaskMeta {
                title,
                format_label: label.clone(),
                file_extension: "mp4".to_string(),
                estimated_size: None,
            };
            match ctx.registry.create(Task::new(entry.task_id.clone(), meta, status.clone())) {
                Ok(()) => {
                    ctx.commit(&entry.task_id);
                    created.push(entry.task_id.clone());
                }
                Err(e) => tracing::warn!("Skipping batch task: {}", e),
            }
        }
        created.reverse();

        let args = fluent_args!["count" => created.len()];
        let message = ctx.t_args("msg-batch-started", &args);
        ctx.raise(DialogKind::Info, "dialog-title-notice", message);
        tracing::info!("Batch created {} task(s)", created.len());
        created
    }

    // ========== Format button ==========

    /// Press a format button: download, pause or resume by its mode
    pub async fn handle_format_action(&self, key: &ButtonKey) {
        let action = {
            let ctx = self.context.lock().await;
            let Some(button) = ctx.buttons.get(key) else {
                tracing::debug!("Unknown format button {:?}", key);
                return;
            };
            if !button.enabled {
                tracing::debug!("Format button {:?} disabled", key);
                return;
            }
            match (button.mode, button.task.clone()) {
                (ButtonMode::Pause, Some(id)) => FormatAction::Pause(id),
                (ButtonMode::Resume, Some(id)) => FormatAction::Resume(id),
                _ => FormatAction::Start(button.request.clone()),
            }
        };

        match action {
            FormatAction::Start(request) => {
                self.start_download(request).await;
            }
            FormatAction::Pause(id) => {
                self.pause(&id).await;
            }
            FormatAction::Resume(id) => {
                self.resume(&id).await;
            }
        }
    }

    // ========== Pause / resume ==========

    /// Pause or resume depending on what the task currently shows
    pub async fn toggle_pause(&self, id: &TaskId) -> bool {
        let state = {
            let ctx = self.context.lock().await;
            ctx.registry.get(id).map(Task::state)
        };
        match state {
            Some(TaskState::Paused) => self.resume(id).await,
            Some(_) => self.pause(id).await,
            None => false,
        }
    }

    pub async fn pause(&self, id: &TaskId) -> bool {
        self.run_intent(id, PendingIntent::Pause).await
    }

    pub async fn resume(&self, id: &TaskId) -> bool {
        self.run_intent(id, PendingIntent::Resume).await
    }

    /// Show the intended state at once, then confirm or roll it back
    async fn run_intent(&self, id: &TaskId, intent: PendingIntent) -> bool {
        {
            let ctx = self.context.lock().await;
            if !ctx.registry.contains(id) {
                tracing::debug!("{} for unknown task {}", intent.action(), id);
                return false;
            }
        }
        if !self.ensure_ready().await {
            return false;
        }

        {
            let mut ctx = self.context.lock().await;
            let begun = ctx.registry.update(id, |t| t.begin_intent(intent));
            match begun {
                Some(Ok(())) => ctx.commit(id),
                Some(Err(e)) => {
                    tracing::debug!("Ignored: {}", e);
                    return false;
                }
                None => return false,
            }
        }

        tracing::info!("Requesting {} for task {}", intent.action(), id);
        let result = match intent {
            PendingIntent::Pause => self.gateway.pause_download(id).await,
            PendingIntent::Resume => self.gateway.resume_download(id).await,
        };

        let (title_key, fallback_key, confirmed_key, reverted_key) = match intent {
            PendingIntent::Pause => (
                "dialog-title-pause-failed",
                "msg-pause-failed",
                "status-paused",
                "status-pause-reverted",
            ),
            PendingIntent::Resume => (
                "dialog-title-resume-failed",
                "msg-resume-failed",
                "status-waiting",
                "status-resume-reverted",
            ),
        };

        let mut ctx = self.context.lock().await;
        let (title_key, message) = match result {
            Ok(raw) => {
                let reply = ActionReply::from_wire(raw);
                if reply.success {
                    let status = ctx.t(confirmed_key);
                    ctx.registry.update(id, |t| t.confirm_intent(intent, status));
                    ctx.commit(id);
                    tracing::info!("Task {} {} confirmed", id, intent.action());
                    return true;
                }
                (title_key, reply.error_or(&ctx.t(fallback_key)))
            }
            Err(e) => ("dialog-title-system-error", e.to_string()),
        };

        tracing::warn!("Task {} {} rejected: {}", id, intent.action(), message);
        let notice = ctx.t(reverted_key);
        ctx.registry.update(id, |t| t.reject_intent(intent, notice));
        ctx.commit(id);
        ctx.raise(DialogKind::Error, title_key, message);
        false
    }

    // ========== Retry ==========

    /// Retry a failed task. The retry control stays disabled until the
    /// backend answers.
    pub async fn retry(&self, id: &TaskId) -> bool {
        {
            let ctx = self.context.lock().await;
            if !ctx.registry.contains(id) {
                return false;
            }
        }
        if !self.ensure_ready().await {
            return false;
        }

        {
            let mut ctx = self.context.lock().await;
            match ctx.registry.update(id, Task::begin_retry) {
                Some(Ok(())) => ctx.commit(id),
                Some(Err(e)) => {
                    tracing::debug!("Ignored: {}", e);
                    return false;
                }
                None => return false,
            }
        }

        tracing::info!("Requesting retry for task {}", id);
        let result = self.gateway.retry_download(id).await;

        let mut ctx = self.context.lock().await;
        let (title_key, message) = match result {
            Ok(raw) => {
                let reply = ActionReply::from_wire(raw);
                if reply.success {
                    let status = ctx.t("status-waiting");
                    ctx.registry.update(id, |t| t.finish_retry(true, status));
                    ctx.commit(id);
                    tracing::info!("Task {} requeued", id);
                    return true;
                }
                ("dialog-title-retry-failed", reply.error_or(&ctx.t("msg-retry-failed")))
            }
            Err(e) => ("dialog-title-system-error", e.to_string()),
        };

        tracing::warn!("Retry of task {} rejected: {}", id, message);
        ctx.registry.update(id, |t| t.finish_retry(false, ""));
        ctx.commit(id);
        ctx.raise(DialogKind::Error, title_key, message);
        false
    }

    // ========== Cancel / close ==========

    /// First press on a live task requests cancellation; a press on a
    /// terminal task, or a second press, dismisses it.
    ///
    /// The cancel call is fire-and-forget: its outcome is logged and, when
    /// the backend answers at all, the task is marked cancelled. Nothing is
    /// shown to the user either way.
    pub async fn cancel_or_close(&self, id: &TaskId) -> CloseOutcome {
        {
            let mut ctx = self.context.lock().await;
            let Some(task) = ctx.registry.get(id) else {
                return CloseOutcome::Ignored;
            };
            if task.is_terminal() || task.cancel_requested {
                ctx.dismiss(id);
                return CloseOutcome::Dismissed;
            }
        }
        if !self.ensure_ready().await {
            return CloseOutcome::Ignored;
        }

        {
            let mut ctx = self.context.lock().await;
            match ctx.registry.update(id, Task::request_cancel) {
                Some(Ok(())) => ctx.commit(id),
                // Finished or dismissed while we checked readiness
                _ => return CloseOutcome::Ignored,
            }
        }

        tracing::info!("Requesting cancel for task {}", id);
        match self.gateway.cancel_download(id).await {
            Ok(raw) => {
                let reply = ActionReply::from_wire(raw);
                if !reply.success {
                    tracing::debug!("Cancel of {} not acknowledged: {:?}", id, reply.error);
                }
                let mut ctx = self.context.lock().await;
                let label = ctx.t("status-cancelled");
                if ctx.registry.update(id, |t| t.confirm_cancelled(label)) == Some(true) {
                    ctx.commit(id);
                }
            }
            Err(e) => tracing::warn!("Cancel of task {} failed: {}", id, e),
        }
        CloseOutcome::CancelRequested
    }
}
