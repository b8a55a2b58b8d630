use crate::download::binding::{ButtonKey, ButtonMode};
use crate::download::context::ControllerContext;
use crate::download::media::{DownloadRequest, MediaInfo};
use crate::download::task::TaskId;
use crate::ui::dialog::Dialog;
use crate::util::i18n::LocalizationManager;
use crate::view::{Fragment, SurfaceKind};
use ratatui::widgets::ListState;
use std::cell::RefCell;
use std::sync::Arc;

/// Maximum input buffer length; several pasted links fit comfortably
pub const MAX_INPUT_LENGTH: usize = 16 * 1024;

/// What the text input is collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Analyze,
    Batch,
}

/// UI mode determines what the TUI is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiMode {
    /// Normal navigation and commands
    #[default]
    Normal,
    /// Collecting links
    Input(InputKind),
    /// Help screen overlay
    Help,
}

impl UiMode {
    pub fn is_text_input(&self) -> bool {
        matches!(self, UiMode::Input(_))
    }
}

/// Active pane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusPane {
    /// Analyzed formats on the left
    #[default]
    Formats,
    /// Compact task list
    Queue,
}

/// One format button as shown in the formats pane
#[derive(Debug, Clone)]
pub struct FormatRow {
    pub key: ButtonKey,
    pub request: DownloadRequest,
    pub mode: ButtonMode,
    pub enabled: bool,
}

pub struct TuiState {
    i18n: Arc<LocalizationManager>,
    pub ui_mode: UiMode,
    pub focus_pane: FocusPane,
    pub input_buffer: String,
    pub format_rows: Vec<FormatRow>,
    pub format_index: usize,
    /// Snapshot of the compact surface, newest first
    pub compact: Vec<Fragment>,
    /// Snapshot of the detailed surface, newest first
    pub detailed: Vec<Fragment>,
    pub badge_count: usize,
    pub dialog: Option<Dialog>,
    pub task_index: usize,
    /// Number of links being analyzed, while an analyze runs
    pub analyzing: Option<usize>,
    /// Short non-blocking note for the status bar
    pub notice: Option<String>,
    format_list_state: RefCell<ListState>,
    task_list_state: RefCell<ListState>,
    dirty: bool,
}

impl TuiState {
    pub fn new(i18n: Arc<LocalizationManager>) -> Self {
        Self {
            i18n,
            ui_mode: UiMode::Normal,
            focus_pane: FocusPane::Formats,
            input_buffer: String::new(),
            format_rows: Vec::new(),
            format_index: 0,
            compact: Vec::new(),
            detailed: Vec::new(),
            badge_count: 0,
            dialog: None,
            task_index: 0,
            analyzing: None,
            notice: None,
            format_list_state: RefCell::new(ListState::default()),
            task_list_state: RefCell::new(ListState::default()),
            dirty: true,
        }
    }

    /// Replace the formats pane with freshly analyzed items
    pub fn set_results(&mut self, items: &[MediaInfo]) -> Vec<DownloadRequest> {
        let requests: Vec<DownloadRequest> = items
            .iter()
            .flat_map(|info| info.formats.iter().map(|format| info.request_for(format)))
            .collect();

        self.format_rows = requests
            .iter()
            .map(|request| FormatRow {
                key: request.button_key(),
                request: request.clone(),
                mode: ButtonMode::Download,
                enabled: true,
            })
            .collect();
        self.format_index = 0;
        self.sync_list_states();
        requests
    }

    /// Copy what the controller currently shows
    pub fn sync(&mut self, ctx: &ControllerContext) {
        self.compact = ctx.projector.surface(SurfaceKind::Compact).fragments().to_vec();
        self.detailed = ctx.projector.surface(SurfaceKind::Detailed).fragments().to_vec();
        self.badge_count = ctx.projector.badge_count();
        self.dialog = ctx.last_dialog().cloned();

        for row in &mut self.format_rows {
            if let Some(button) = ctx.buttons.get(&row.key) {
                row.mode = button.mode;
                row.enabled = button.enabled;
            }
        }

        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        self.task_index = self.task_index.min(self.compact.len().saturating_sub(1));
        self.format_index = self.format_index.min(self.format_rows.len().saturating_sub(1));
        self.sync_list_states();
    }

    fn sync_list_states(&self) {
        let formats = (!self.format_rows.is_empty()).then_some(self.format_index);
        self.format_list_state.borrow_mut().select(formats);
        let tasks = (!self.compact.is_empty()).then_some(self.task_index);
        self.task_list_state.borrow_mut().select(tasks);
    }

    pub fn select_next(&mut self) {
        match self.focus_pane {
            FocusPane::Formats => {
                if self.format_index + 1 < self.format_rows.len() {
                    self.format_index += 1;
                }
            }
            FocusPane::Queue => {
                if self.task_index + 1 < self.compact.len() {
                    self.task_index += 1;
                }
            }
        }
        self.sync_list_states();
    }

    pub fn select_previous(&mut self) {
        match self.focus_pane {
            FocusPane::Formats => self.format_index = self.format_index.saturating_sub(1),
            FocusPane::Queue => self.task_index = self.task_index.saturating_sub(1),
        }
        self.sync_list_states();
    }

    pub fn toggle_focus(&mut self) {
        self.focus_pane = match self.focus_pane {
            FocusPane::Formats => FocusPane::Queue,
            FocusPane::Queue => FocusPane::Formats,
        };
    }

    pub fn selected_format(&self) -> Option<&FormatRow> {
        self.format_rows.get(self.format_index)
    }

    pub fn selected_task_id(&self) -> Option<&TaskId> {
        self.compact.get(self.task_index).map(|f| &f.task_id)
    }

    /// Detailed fragment of the selected task
    pub fn selected_detail(&self) -> Option<&Fragment> {
        let id = self.selected_task_id()?;
        self.detailed.iter().find(|f| &f.task_id == id)
    }

    pub fn format_list_state_mut(&self) -> std::cell::RefMut<'_, ListState> {
        self.format_list_state.borrow_mut()
    }

    pub fn task_list_state_mut(&self) -> std::cell::RefMut<'_, ListState> {
        self.task_list_state.borrow_mut()
    }

    /// Append pasted or typed text, respecting the buffer limit
    pub fn push_input(&mut self, text: &str) {
        let available = MAX_INPUT_LENGTH.saturating_sub(self.input_buffer.len());
        if available == 0 {
            return;
        }
        // Char-based so multi-byte input is never split
        let mut taken = 0;
        for c in text.chars() {
            taken += c.len_utf8();
            if taken > available {
                break;
            }
            self.input_buffer.push(c);
        }
    }

    /// Get translated string by key
    pub fn t(&self, key: &str) -> String {
        self.i18n.get(key)
    }

    /// Get translated string with arguments
    pub fn t_with_args(&self, key: &str, args: Option<&fluent_bundle::FluentArgs>) -> String {
        self.i18n.get_with_args(key, args)
    }

    pub fn i18n(&self) -> &Arc<LocalizationManager> {
        &self.i18n
    }

    /// Mark UI as needing redraw (dirty flag)
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn needs_redraw(&self) -> bool {
        self.dirty
    }

    /// Clear dirty flag after rendering
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
