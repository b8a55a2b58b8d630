use super::binding::{ButtonBindings, ButtonMode};
use super::registry::TaskRegistry;
use super::task::{TaskId, TaskState};
use crate::ui::dialog::{Dialog, DialogKind};
use crate::util::i18n::LocalizationManager;
use crate::view::projector::{Projector, ProjectorOptions};
use fluent_bundle::FluentArgs;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Older dialogs are dropped past this many
const MAX_DIALOGS: usize = 32;

pub type SharedContext = Arc<Mutex<ControllerContext>>;

/// Everything the dispatcher and ingestor mutate, behind one lock.
///
/// Callers take the lock for short synchronous sections only and never hold
/// it across a gateway call. Every write to a task is followed by
/// [`commit`](Self::commit), which re-projects it and syncs its button.
pub struct ControllerContext {
    pub registry: TaskRegistry,
    pub buttons: ButtonBindings,
    pub projector: Projector,
    dialogs: VecDeque<Dialog>,
    i18n: Arc<LocalizationManager>,
}

impl ControllerContext {
    pub fn new(i18n: Arc<LocalizationManager>, options: ProjectorOptions) -> Self {
        Self {
            registry: TaskRegistry::new(),
            buttons: ButtonBindings::new(),
            projector: Projector::new(options),
            dialogs: VecDeque::new(),
            i18n,
        }
    }

    pub fn into_shared(self) -> SharedContext {
        Arc::new(Mutex::new(self))
    }

    /// Push the current registry state of `id` to both surfaces and its button
    pub fn commit(&mut self, id: &TaskId) {
        match self.registry.get(id) {
            Some(task) => {
                self.projector.render(task);
                if task.is_terminal() {
                    self.buttons.release(id);
                } else {
                    let mode = if task.state() == TaskState::Paused {
                        ButtonMode::Resume
                    } else {
                        ButtonMode::Pause
                    };
                    let enabled = task.pending.is_none() && !task.cancel_requested;
                    self.buttons.sync_task(id, mode, enabled);
                }
            }
            None => {
                self.projector.remove(id);
                self.buttons.release(id);
            }
        }
        debug_assert_eq!(self.projector.badge_count(), self.registry.len());
    }

    /// Remove a task everywhere. No backend call is involved.
    pub fn dismiss(&mut self, id: &TaskId) -> bool {
        let removed = self.registry.remove(id).is_some();
        self.commit(id);
        if removed {
            tracing::info!("Task {} dismissed", id);
        }
        removed
    }

    // ========== Dialogs ==========

    pub fn notify(&mut self, dialog: Dialog) {
        match dialog.kind {
            DialogKind::Error => tracing::warn!("Dialog: {}", dialog),
            _ => tracing::info!("Dialog: {}", dialog),
        }
        self.dialogs.push_back(dialog);
        while self.dialogs.len() > MAX_DIALOGS {
            self.dialogs.pop_front();
        }
    }

    /// Raise a dialog whose title is a localization key
    pub fn raise(&mut self, kind: DialogKind, title_key: &str, message: impl Into<String>) {
        let dialog = Dialog::new(kind, self.t(title_key), message);
        self.notify(dialog);
    }

    pub fn dialogs(&self) -> impl Iterator<Item = &Dialog> {
        self.dialogs.iter()
    }

    pub fn last_dialog(&self) -> Option<&Dialog> {
        self.dialogs.back()
    }

    /// Close the newest dialog
    pub fn pop_dialog(&mut self) -> Option<Dialog> {
        self.dialogs.pop_back()
    }

    pub fn take_dialogs(&mut self) -> Vec<Dialog> {
        self.dialogs.drain(..).collect()
    }

    // ========== Localization ==========

    pub fn t(&self, key: &str) -> String {
        self.i18n.get(key)
    }

    pub fn t_args(&self, key: &str, args: &FluentArgs) -> String {
        self.i18n.get_with_args(key, Some(args))
    }

    pub fn i18n(&self) -> &Arc<LocalizationManager> {
        &self.i18n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::media::{DownloadRequest, FormatOption};
    use crate::download::task::{PendingIntent, Task};
    use crate::view::fragment::SurfaceKind;

    fn context() -> ControllerContext {
        let i18n = Arc::new(LocalizationManager::new("en").unwrap());
        ControllerContext::new(i18n, ProjectorOptions::default())
    }

    fn bound_task(ctx: &mut ControllerContext, id: &str) -> TaskId {
        let request = DownloadRequest {
            url: format!("https://example.com/{}", id),
            title: "Clip".to_string(),
            format: FormatOption {
                id: "best".to_string(),
                label: "Best".to_string(),
                ext: "mp4".to_string(),
                size: None,
            },
        };
        let key = ctx.buttons.register(request.clone());
        let id = TaskId::new(id);
        ctx.registry
            .create(Task::new(id.clone(), request.meta(), "Waiting..."))
            .unwrap();
        ctx.buttons.bind(&key, id.clone());
        ctx.commit(&id);
        id
    }

    #[test]
    fn test_commit_syncs_button_with_state() {
        let mut ctx = context();
        let id = bound_task(&mut ctx, "t1");
        let key = ctx.buttons.key_for(&id).unwrap().clone();

        ctx.registry
            .update(&id, |t| t.begin_intent(PendingIntent::Pause))
            .unwrap()
            .unwrap();
        ctx.commit(&id);
        let button = ctx.buttons.get(&key).unwrap();
        assert_eq!(button.mode, ButtonMode::Resume);
        assert!(!button.enabled);

        ctx.registry.update(&id, |t| t.confirm_intent(PendingIntent::Pause, "Paused"));
        ctx.commit(&id);
        assert!(ctx.buttons.get(&key).unwrap().enabled);

        ctx.registry.update(&id, |t| t.complete("done"));
        ctx.commit(&id);
        let button = ctx.buttons.get(&key).unwrap();
        assert_eq!(button.mode, ButtonMode::Download);
        assert!(button.task.is_none());
    }

    #[test]
    fn test_dismiss_removes_everywhere() {
        let mut ctx = context();
        let id = bound_task(&mut ctx, "t1");
        let key = ctx.buttons.key_for(&id).unwrap().clone();

        assert!(ctx.dismiss(&id));
        assert!(!ctx.dismiss(&id));
        assert_eq!(ctx.projector.badge_count(), 0);
        assert!(ctx.projector.fragment(SurfaceKind::Compact, &id).is_none());
        assert_eq!(ctx.buttons.get(&key).unwrap().mode, ButtonMode::Download);
    }

    #[test]
    fn test_dialog_queue_is_bounded() {
        let mut ctx = context();
        for i in 0..(MAX_DIALOGS + 3) {
            ctx.raise(DialogKind::Info, "dialog-title-notice", format!("message {}", i));
        }
        assert_eq!(ctx.dialogs().count(), MAX_DIALOGS);
        let last = ctx.last_dialog().unwrap();
        assert_eq!(last.title, "Notice");
        assert_eq!(last.message, format!("message {}", MAX_DIALOGS + 2));
        assert_eq!(ctx.take_dialogs().len(), MAX_DIALOGS);
        assert!(ctx.last_dialog().is_none());
    }
}
