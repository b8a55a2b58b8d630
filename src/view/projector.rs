use super::fragment::{
    BarStyle, CloseAction, ControlState, Fragment, PauseIcon, SurfaceKind,
};
use crate::download::task::{Task, TaskId, TaskState};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectorOptions {
    /// Display columns available for status text on the compact surface
    pub status_width: usize,
    /// Log lines kept on a detailed fragment
    pub log_lines: usize,
}

impl Default for ProjectorOptions {
    fn default() -> Self {
        Self {
            status_width: 28,
            log_lines: 5,
        }
    }
}

/// Ordered fragments of one surface, newest first
#[derive(Debug, Clone)]
pub struct Surface {
    kind: SurfaceKind,
    fragments: Vec<Fragment>,
}

impl Surface {
    fn new(kind: SurfaceKind) -> Self {
        Self {
            kind,
            fragments: Vec::new(),
        }
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn get(&self, id: &TaskId) -> Option<&Fragment> {
        self.fragments.iter().find(|f| &f.task_id == id)
    }

    fn get_mut(&mut self, id: &TaskId) -> Option<&mut Fragment> {
        self.fragments.iter_mut().find(|f| &f.task_id == id)
    }

    fn get_or_insert(&mut self, id: &TaskId) -> &mut Fragment {
        let pos = match self.fragments.iter().position(|f| &f.task_id == id) {
            Some(pos) => pos,
            None => {
                self.fragments.insert(0, Fragment::new(self.kind, id));
                0
            }
        };
        &mut self.fragments[pos]
    }

    fn remove(&mut self, id: &TaskId) -> bool {
        let before = self.fragments.len();
        self.fragments.retain(|f| &f.task_id != id);
        before != self.fragments.len()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Keeps the compact and detailed surfaces in step with the registry.
///
/// `render` is the one path the controller uses; the finer-grained
/// operations exist for callers that only hold an id.
#[derive(Debug, Clone)]
pub struct Projector {
    compact: Surface,
    detailed: Surface,
    options: ProjectorOptions,
}

impl Projector {
    pub fn new(options: ProjectorOptions) -> Self {
        Self {
            compact: Surface::new(SurfaceKind::Compact),
            detailed: Surface::new(SurfaceKind::Detailed),
            options,
        }
    }

    pub fn surface(&self, kind: SurfaceKind) -> &Surface {
        match kind {
            SurfaceKind::Compact => &self.compact,
            SurfaceKind::Detailed => &self.detailed,
        }
    }

    pub fn fragment(&self, kind: SurfaceKind, id: &TaskId) -> Option<&Fragment> {
        self.surface(kind).get(id)
    }

    /// Create or refresh both fragments of a task
    pub fn render(&mut self, task: &Task) {
        let options = self.options;
        for surface in [&mut self.compact, &mut self.detailed] {
            sync_fragment(surface.get_or_insert(&task.id), task, &options);
        }
    }

    pub fn update_progress(&mut self, id: &TaskId, percent: i64, status: &str) {
        let options = self.options;
        for surface in [&mut self.compact, &mut self.detailed] {
            if let Some(fragment) = surface.get_mut(id) {
                apply_progress(fragment, percent, status, &options);
            }
        }
    }

    pub fn mark_terminal(&mut self, id: &TaskId, state: TaskState) {
        for surface in [&mut self.compact, &mut self.detailed] {
            if let Some(fragment) = surface.get_mut(id) {
                fragment.state = state;
                apply_state_style(fragment, state);
            }
        }
    }

    pub fn remove(&mut self, id: &TaskId) {
        self.compact.remove(id);
        self.detailed.remove(id);
    }

    /// Live task count shown on the queue badge
    pub fn badge_count(&self) -> usize {
        debug_assert_eq!(self.compact.len(), self.detailed.len());
        self.compact.len()
    }
}

fn sync_fragment(fragment: &mut Fragment, task: &Task, options: &ProjectorOptions) {
    let state = task.state();
    fragment.title = task.meta.file_name();
    fragment.state = state;
    fragment.reverted = task.reverted.is_some();

    if fragment.epoch != task.progress_epoch {
        fragment.epoch = task.progress_epoch;
        fragment.percent = 0;
        fragment.bar_width = 0;
    }

    if fragment.surface == SurfaceKind::Detailed {
        fragment.size_label = task.meta.estimated_size.clone();
        fragment.error = task.error_message.clone();
        let skip = task.logs.len().saturating_sub(options.log_lines);
        fragment.log_lines = task.logs.iter().skip(skip).map(|l| l.display_line()).collect();
    }

    if state.is_terminal() {
        set_status(fragment, &task.status_text, options);
    } else {
        apply_progress(fragment, i64::from(task.progress_percent), &task.status_text, options);
    }
    apply_state_style(fragment, state);

    if !state.is_terminal() {
        if task.cancel_requested {
            fragment.pause = ControlState::Disabled;
            fragment.close = CloseAction::Dismiss;
        } else if task.pending.is_some() {
            fragment.pause = ControlState::Disabled;
        }
    }
    if state == TaskState::Failed && task.retry_in_flight && fragment.retry.is_visible() {
        fragment.retry = ControlState::Disabled;
    }
}

fn apply_progress(fragment: &mut Fragment, percent: i64, status: &str, options: &ProjectorOptions) {
    if percent >= 0 && !fragment.state.is_terminal() {
        let clamped = percent.min(100) as u8;
        fragment.percent = fragment.percent.max(clamped);
        fragment.bar_width = fragment.percent;
    }
    set_status(fragment, status, options);
}

fn set_status(fragment: &mut Fragment, status: &str, options: &ProjectorOptions) {
    fragment.status_text = match fragment.surface {
        SurfaceKind::Compact => truncate_to_width(status, options.status_width),
        SurfaceKind::Detailed => status.to_string(),
    };
}

fn apply_state_style(fragment: &mut Fragment, state: TaskState) {
    fragment.status_is_error = false;
    fragment.retry = ControlState::Hidden;
    fragment.close = CloseAction::Cancel;
    fragment.pause = ControlState::Enabled;
    fragment.pause_icon = PauseIcon::Pause;

    match state {
        TaskState::Queued | TaskState::Downloading => {
            fragment.bar_style = BarStyle::Active;
        }
        TaskState::Paused => {
            fragment.bar_style = BarStyle::Paused;
            fragment.pause_icon = PauseIcon::Play;
        }
        TaskState::Completed => {
            fragment.bar_style = BarStyle::Completed;
            fragment.percent = 100;
            fragment.bar_width = 100;
            fragment.pause = ControlState::Hidden;
            fragment.close = CloseAction::Dismiss;
        }
        TaskState::Failed => {
            // Full red bar, but the number reads 0
            fragment.bar_style = BarStyle::Failed;
            fragment.percent = 0;
            fragment.bar_width = 100;
            fragment.pause = ControlState::Disabled;
            fragment.close = CloseAction::Dismiss;
            fragment.status_is_error = true;
            if fragment.surface == SurfaceKind::Detailed {
                fragment.retry = ControlState::Enabled;
            }
        }
        TaskState::Cancelled => {
            fragment.bar_style = BarStyle::Cancelled;
            fragment.pause = ControlState::Hidden;
            fragment.close = CloseAction::Dismiss;
        }
    }
}

/// Cut `text` to at most `max_width` display columns, ending in "..."
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }

    let target_width = max_width - 3;
    let mut truncated = String::new();
    let mut current_width = 0;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(1);
        if current_width + ch_width > target_width {
            break;
        }
        truncated.push(ch);
        current_width += ch_width;
    }
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::task::{PendingIntent, TaskMeta};
    use pretty_assertions::assert_eq;

    fn task(id: &str) -> Task {
        Task::new(
            TaskId::new(id),
            TaskMeta {
                title: "Clip".to_string(),
                format_label: "720p".to_string(),
                file_extension: "mp4".to_string(),
                estimated_size: Some("10 MB".to_string()),
            },
            "Waiting...",
        )
    }

    fn projector() -> Projector {
        Projector::new(ProjectorOptions::default())
    }

    fn both<'a>(p: &'a Projector, id: &TaskId) -> (&'a Fragment, &'a Fragment) {
        (
            p.fragment(SurfaceKind::Compact, id).unwrap(),
            p.fragment(SurfaceKind::Detailed, id).unwrap(),
        )
    }

    fn assert_surfaces_agree(p: &Projector, id: &TaskId) {
        let (compact, detailed) = both(p, id);
        assert_eq!(compact.state, detailed.state);
        assert_eq!(compact.percent, detailed.percent);
        assert_eq!(compact.bar_width, detailed.bar_width);
        assert_eq!(compact.bar_style, detailed.bar_style);
    }

    #[test]
    fn test_render_creates_both_fragments_newest_first() {
        let mut p = projector();
        p.render(&task("a"));
        p.render(&task("b"));

        assert_eq!(p.badge_count(), 2);
        let keys: Vec<&str> = p
            .surface(SurfaceKind::Compact)
            .fragments()
            .iter()
            .map(|f| f.key.as_str())
            .collect();
        assert_eq!(keys, vec!["compact-task-b", "compact-task-a"]);
        assert_eq!(p.surface(SurfaceKind::Detailed).len(), 2);
    }

    #[test]
    fn test_rendering_twice_does_not_duplicate() {
        let mut p = projector();
        let t = task("a");
        p.render(&t);
        p.render(&t);
        assert_eq!(p.badge_count(), 1);
    }

    #[test]
    fn test_progress_never_regresses() {
        let mut p = projector();
        let id = TaskId::new("a");
        p.render(&task("a"));

        for (input, expected) in [(10, 10), (45, 45), (30, 45), (-1, 45), (150, 100), (60, 100)] {
            p.update_progress(&id, input, "Downloading");
            assert_eq!(both(&p, &id).0.percent, expected, "after {}", input);
            assert_surfaces_agree(&p, &id);
        }
    }

    #[test]
    fn test_completed_styling() {
        let mut p = projector();
        let mut t = task("a");
        t.apply_progress(Some(45), TaskState::Downloading, "Downloading");
        t.complete("Download complete");
        p.render(&t);

        let (compact, detailed) = both(&p, &t.id);
        for f in [compact, detailed] {
            assert_eq!(f.bar_style, BarStyle::Completed);
            assert_eq!(f.percent, 100);
            assert_eq!(f.pause, ControlState::Hidden);
            assert_eq!(f.close, CloseAction::Dismiss);
        }
    }

    #[test]
    fn test_failed_styling() {
        let mut p = projector();
        let mut t = task("a");
        t.apply_progress(Some(70), TaskState::Downloading, "Downloading");
        p.render(&t);
        t.fail("HTTP 403", "Cancelled");
        p.render(&t);

        let (compact, detailed) = both(&p, &t.id);
        assert_eq!(compact.bar_width, 100);
        assert_eq!(compact.percent, 0);
        assert_eq!(compact.bar_style, BarStyle::Failed);
        assert!(compact.status_is_error);
        assert_eq!(compact.retry, ControlState::Hidden);
        assert_eq!(detailed.retry, ControlState::Enabled);
        assert_eq!(detailed.pause, ControlState::Disabled);
        assert_eq!(detailed.error.as_deref(), Some("HTTP 403"));
        assert_surfaces_agree(&p, &t.id);
    }

    #[test]
    fn test_retry_success_resets_bar() {
        let mut p = projector();
        let mut t = task("a");
        t.apply_progress(Some(70), TaskState::Downloading, "Downloading");
        t.fail("HTTP 500", "Cancelled");
        p.render(&t);
        t.begin_retry().unwrap();
        p.render(&t);
        assert_eq!(both(&p, &t.id).1.retry, ControlState::Disabled);

        t.finish_retry(true, "Waiting...");
        p.render(&t);

        let (compact, detailed) = both(&p, &t.id);
        for f in [compact, detailed] {
            assert_eq!(f.percent, 0);
            assert_eq!(f.bar_width, 0);
            assert_eq!(f.bar_style, BarStyle::Active);
            assert_eq!(f.retry, ControlState::Hidden);
            assert_eq!(f.pause, ControlState::Enabled);
            assert!(!f.status_is_error);
            assert_eq!(f.status_text, "Waiting...");
        }
    }

    #[test]
    fn test_paused_overlay_styling() {
        let mut p = projector();
        let mut t = task("a");
        t.apply_progress(Some(20), TaskState::Downloading, "Downloading");
        t.begin_intent(PendingIntent::Pause).unwrap();
        p.render(&t);

        let (compact, _) = both(&p, &t.id);
        assert_eq!(compact.state, TaskState::Paused);
        assert_eq!(compact.bar_style, BarStyle::Paused);
        assert_eq!(compact.pause_icon, PauseIcon::Play);
        assert_eq!(compact.pause, ControlState::Disabled);

        t.reject_intent(PendingIntent::Pause, "Pause rejected");
        p.render(&t);
        let (compact, detailed) = both(&p, &t.id);
        assert_eq!(compact.state, TaskState::Downloading);
        assert!(compact.reverted && detailed.reverted);
        assert_eq!(compact.pause, ControlState::Enabled);
    }

    #[test]
    fn test_cancel_requested_turns_close_into_dismiss() {
        let mut p = projector();
        let mut t = task("a");
        t.request_cancel().unwrap();
        p.render(&t);

        let (compact, _) = both(&p, &t.id);
        assert_eq!(compact.close, CloseAction::Dismiss);
        assert_eq!(compact.pause, ControlState::Disabled);
    }

    #[test]
    fn test_mark_terminal_without_task() {
        let mut p = projector();
        let id = TaskId::new("a");
        p.render(&task("a"));
        p.update_progress(&id, 40, "Downloading");

        p.mark_terminal(&id, TaskState::Cancelled);
        let (compact, detailed) = both(&p, &id);
        assert_eq!(compact.bar_style, BarStyle::Cancelled);
        assert_eq!(detailed.pause, ControlState::Hidden);
        assert_eq!(compact.percent, 40);

        // Terminal fragments ignore further progress
        p.update_progress(&id, 90, "late");
        assert_eq!(both(&p, &id).0.percent, 40);
    }

    #[test]
    fn test_remove_drops_both() {
        let mut p = projector();
        p.render(&task("a"));
        p.render(&task("b"));
        p.remove(&TaskId::new("a"));

        assert_eq!(p.badge_count(), 1);
        assert!(p.fragment(SurfaceKind::Detailed, &TaskId::new("a")).is_none());
    }

    #[test]
    fn test_compact_status_truncated_detailed_full() {
        let mut p = Projector::new(ProjectorOptions {
            status_width: 10,
            log_lines: 2,
        });
        let mut t = task("a");
        t.apply_progress(Some(5), TaskState::Downloading, "Downloading fragment 3 of 12");
        p.render(&t);

        let (compact, detailed) = both(&p, &t.id);
        assert_eq!(compact.status_text, "Downloa...");
        assert_eq!(detailed.status_text, "Downloading fragment 3 of 12");
        assert_eq!(detailed.log_lines.len(), 2);
        assert!(compact.log_lines.is_empty());
    }

    #[test]
    fn test_truncate_to_width_wide_chars() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("下载中请稍候", 7), "下载...");
        assert_eq!(truncate_to_width("abcdef", 2), "..");
    }
}
