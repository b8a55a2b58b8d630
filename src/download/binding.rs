use super::media::DownloadRequest;
use super::task::TaskId;
use std::collections::HashMap;

/// Identifies a format button: one per (link, format) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ButtonKey {
    pub url: String,
    pub format_id: String,
}

impl ButtonKey {
    pub fn new(url: impl Into<String>, format_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format_id: format_id.into(),
        }
    }
}

/// What pressing the button does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonMode {
    Download,
    Pause,
    Resume,
}

#[derive(Debug, Clone)]
pub struct FormatButton {
    pub request: DownloadRequest,
    pub mode: ButtonMode,
    pub enabled: bool,
    pub task: Option<TaskId>,
}

/// Format buttons and the task each one currently drives.
///
/// A button is bound when its download starts and released as soon as the
/// task reaches any terminal state or is dismissed.
#[derive(Debug, Default)]
pub struct ButtonBindings {
    buttons: HashMap<ButtonKey, FormatButton>,
    by_task: HashMap<TaskId, ButtonKey>,
}

impl ButtonBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the button for a resolved format. Existing buttons keep
    /// their mode and binding.
    pub fn register(&mut self, request: DownloadRequest) -> ButtonKey {
        let key = request.button_key();
        self.buttons.entry(key.clone()).or_insert(FormatButton {
            request,
            mode: ButtonMode::Download,
            enabled: true,
            task: None,
        });
        key
    }

    pub fn get(&self, key: &ButtonKey) -> Option<&FormatButton> {
        self.buttons.get(key)
    }

    pub fn set_enabled(&mut self, key: &ButtonKey, enabled: bool) {
        if let Some(button) = self.buttons.get_mut(key) {
            button.enabled = enabled;
        }
    }

    pub fn bind(&mut self, key: &ButtonKey, task: TaskId) {
        if let Some(button) = self.buttons.get_mut(key) {
            if let Some(previous) = button.task.replace(task.clone()) {
                self.by_task.remove(&previous);
            }
            button.mode = ButtonMode::Pause;
            button.enabled = true;
            self.by_task.insert(task, key.clone());
        }
    }

    /// Mirror a live task onto its button; unbound tasks are ignored
    pub fn sync_task(&mut self, task: &TaskId, mode: ButtonMode, enabled: bool) {
        if let Some(button) = self
            .by_task
            .get(task)
            .and_then(|key| self.buttons.get_mut(key))
        {
            button.mode = mode;
            button.enabled = enabled;
        }
    }

    /// Unbind the task and put its button back into download mode
    pub fn release(&mut self, task: &TaskId) -> Option<ButtonKey> {
        let key = self.by_task.remove(task)?;
        if let Some(button) = self.buttons.get_mut(&key) {
            button.task = None;
            button.mode = ButtonMode::Download;
            button.enabled = true;
        }
        Some(key)
    }

    pub fn key_for(&self, task: &TaskId) -> Option<&ButtonKey> {
        self.by_task.get(task)
    }

    /// Drop every button that is not driving a task
    pub fn clear_idle(&mut self) {
        self.buttons.retain(|_, button| button.task.is_some());
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}
