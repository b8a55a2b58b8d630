use crate::download::task::{TaskId, TaskState};
use std::fmt;

/// The two places a task is shown at the same time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Narrow side list
    Compact,
    /// Full queue page
    Detailed,
}

impl SurfaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Detailed => "detailed",
        }
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `"{surface}-task-{id}"`
pub fn fragment_key(surface: SurfaceKind, id: &TaskId) -> String {
    format!("{}-task-{}", surface.as_str(), id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarStyle {
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Hidden,
    Disabled,
    Enabled,
}

impl ControlState {
    pub fn is_visible(self) -> bool {
        self != Self::Hidden
    }
}

/// Glyph on the pause control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseIcon {
    Pause,
    Play,
}

/// What the close control does when pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    Cancel,
    Dismiss,
}

/// Rendered view of one task on one surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub key: String,
    pub surface: SurfaceKind,
    pub task_id: TaskId,
    pub title: String,
    pub state: TaskState,
    pub status_text: String,
    pub status_is_error: bool,
    /// Number shown next to the bar
    pub percent: u8,
    /// Filled share of the bar, 0..=100
    pub bar_width: u8,
    pub bar_style: BarStyle,
    pub epoch: u32,
    pub pause: ControlState,
    pub pause_icon: PauseIcon,
    pub retry: ControlState,
    pub close: CloseAction,
    pub reverted: bool,
    // Detailed surface only
    pub size_label: Option<String>,
    pub error: Option<String>,
    pub log_lines: Vec<String>,
}

impl Fragment {
    pub fn new(surface: SurfaceKind, task_id: &TaskId) -> Self {
        Self {
            key: fragment_key(surface, task_id),
            surface,
            task_id: task_id.clone(),
            title: String::new(),
            state: TaskState::Queued,
            status_text: String::new(),
            status_is_error: false,
            percent: 0,
            bar_width: 0,
            bar_style: BarStyle::Active,
            epoch: 0,
            pause: ControlState::Enabled,
            pause_icon: PauseIcon::Pause,
            retry: ControlState::Hidden,
            close: CloseAction::Cancel,
            reverted: false,
            size_label: None,
            error: None,
            log_lines: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_key() {
        let id = TaskId::new("abc123");
        assert_eq!(fragment_key(SurfaceKind::Compact, &id), "compact-task-abc123");
        assert_eq!(fragment_key(SurfaceKind::Detailed, &id), "detailed-task-abc123");
    }

    #[test]
    fn test_new_fragment_defaults() {
        let fragment = Fragment::new(SurfaceKind::Detailed, &TaskId::new("t1"));
        assert_eq!(fragment.key, "detailed-task-t1");
        assert_eq!(fragment.bar_width, 0);
        assert!(!fragment.retry.is_visible());
        assert_eq!(fragment.close, CloseAction::Cancel);
    }
}
