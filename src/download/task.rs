use super::error::ControllerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Oldest entries are dropped past this many log lines per task
const MAX_LOG_ENTRIES: usize = 50;

/// Log entry for task events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Log level for entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// `HH:MM:SS message`, as shown in the detailed surface
    pub fn display_line(&self) -> String {
        format!("{} {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Backend-assigned task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Downloading,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Localization key of the state name
    pub fn label_key(self) -> &'static str {
        match self {
            Self::Queued => "state-queued",
            Self::Downloading => "state-downloading",
            Self::Paused => "state-paused",
            Self::Completed => "state-completed",
            Self::Failed => "state-failed",
            Self::Cancelled => "state-cancelled",
        }
    }
}

/// A user request that has been sent to the backend but not yet answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingIntent {
    Pause,
    Resume,
}

impl PendingIntent {
    /// State shown while the request is in flight
    pub fn target(self) -> TaskState {
        match self {
            Self::Pause => TaskState::Paused,
            Self::Resume => TaskState::Downloading,
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
        }
    }
}

/// Immutable description of what is being downloaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub title: String,
    pub format_label: String,
    pub file_extension: String,
    pub estimated_size: Option<String>,
}

impl TaskMeta {
    /// Display name, e.g. `Song [1080p].mp4`
    pub fn file_name(&self) -> String {
        let ext = if self.file_extension.is_empty() {
            "mp4".to_string()
        } else {
            self.file_extension.to_lowercase()
        };
        format!("{} [{}].{}", self.title, self.format_label, ext)
    }
}

/// A download task as tracked by the controller.
///
/// `confirmed` is what the backend last told us. `pending` is an optimistic
/// overlay for a pause/resume request that is still in flight; `state()`
/// combines both. The transition methods return `false` (or an error) when
/// the task is in a state that does not accept them, and leave the task
/// untouched in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub meta: TaskMeta,
    pub confirmed: TaskState,
    pub pending: Option<PendingIntent>,
    pub progress_percent: u8,
    /// Bumped whenever progress is legitimately reset (retry)
    pub progress_epoch: u32,
    pub status_text: String,
    pub error_message: Option<String>,
    pub cancel_requested: bool,
    pub retry_in_flight: bool,
    /// Last intent that was rejected and rolled back
    pub reverted: Option<PendingIntent>,
    pub created_at: DateTime<Utc>,
    pub logs: Vec<LogEntry>,
}

impl Task {
    pub fn new(id: TaskId, meta: TaskMeta, status_text: impl Into<String>) -> Self {
        let mut task = Self {
            id,
            meta,
            confirmed: TaskState::Queued,
            pending: None,
            progress_percent: 0,
            progress_epoch: 0,
            status_text: status_text.into(),
            error_message: None,
            cancel_requested: false,
            retry_in_flight: false,
            reverted: None,
            created_at: Utc::now(),
            logs: Vec::new(),
        };
        task.log(LogEntry::info("Task created"));
        task
    }

    /// Displayed state
    pub fn state(&self) -> TaskState {
        match self.pending {
            Some(intent) if !self.confirmed.is_terminal() => intent.target(),
            _ => self.confirmed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.confirmed.is_terminal()
    }

    pub fn log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
        if self.logs.len() > MAX_LOG_ENTRIES {
            let overflow = self.logs.len() - MAX_LOG_ENTRIES;
            self.logs.drain(..overflow);
        }
    }

    // ========== Pause / resume ==========

    pub fn begin_intent(&mut self, intent: PendingIntent) -> Result<(), ControllerError> {
        if let Some(pending) = self.pending {
            return Err(ControllerError::IntentInFlight {
                id: self.id.clone(),
                intent: pending,
            });
        }

        let state = self.state();
        let allowed = match intent {
            PendingIntent::Pause => matches!(state, TaskState::Queued | TaskState::Downloading),
            PendingIntent::Resume => state == TaskState::Paused,
        };
        if !allowed || self.cancel_requested {
            return Err(ControllerError::invalid(&self.id, intent.action(), state));
        }

        self.pending = Some(intent);
        self.reverted = None;
        self.log(LogEntry::info(format!("{} requested", intent.action())));
        Ok(())
    }

    /// Backend accepted the request
    pub fn confirm_intent(&mut self, intent: PendingIntent, status: impl Into<String>) -> bool {
        if self.pending != Some(intent) {
            return false;
        }
        self.pending = None;
        if self.is_terminal() {
            return false;
        }

        self.confirmed = intent.target();
        self.status_text = status.into();
        self.log(LogEntry::info(format!("{} confirmed", intent.action())));
        true
    }

    /// Backend refused the request: drop the overlay and flag the rollback
    pub fn reject_intent(&mut self, intent: PendingIntent, notice: impl Into<String>) -> bool {
        if self.pending != Some(intent) {
            return false;
        }
        self.pending = None;
        self.reverted = Some(intent);
        self.status_text = notice.into();
        self.log(LogEntry::warn(format!("{} rejected", intent.action())));
        true
    }

    // ========== Push events ==========

    /// Apply a progress report. `percent` of `None` or below zero leaves the
    /// bar where it is; otherwise it only ever moves forward.
    pub fn apply_progress(
        &mut self,
        percent: Option<i64>,
        state: TaskState,
        status: impl Into<String>,
    ) -> bool {
        if self.is_terminal() || state.is_terminal() {
            return false;
        }

        if self.confirmed != state {
            self.reverted = None;
            self.log(LogEntry::info(format!("State: {:?} -> {:?}", self.confirmed, state)));
        }
        self.confirmed = state;
        if self.pending.map(PendingIntent::target) == Some(state) {
            self.pending = None;
        }

        // Frozen while paused
        if self.state() != TaskState::Paused {
            if let Some(p) = percent.filter(|p| *p >= 0) {
                let clamped = p.min(100) as u8;
                self.progress_percent = self.progress_percent.max(clamped);
            }
        }

        let status = status.into();
        if !status.is_empty() {
            self.status_text = status;
        }
        true
    }

    pub fn complete(&mut self, label: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.confirmed = TaskState::Completed;
        self.pending = None;
        self.reverted = None;
        self.progress_percent = 100;
        self.status_text = label.into();
        self.log(LogEntry::info("Download completed"));
        true
    }

    /// Task-reported failure. A failure that follows a cancel request is the
    /// cancellation itself.
    pub fn fail(&mut self, message: impl Into<String>, cancelled_label: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        if self.cancel_requested {
            return self.confirm_cancelled(cancelled_label);
        }

        let message = message.into();
        self.confirmed = TaskState::Failed;
        self.pending = None;
        self.reverted = None;
        self.error_message = Some(message.clone());
        self.log(LogEntry::error(format!("Download failed: {}", message)));
        self.status_text = message;
        true
    }

    // ========== Cancel ==========

    pub fn request_cancel(&mut self) -> Result<(), ControllerError> {
        if self.is_terminal() {
            return Err(ControllerError::invalid(&self.id, "cancel", self.confirmed));
        }
        self.cancel_requested = true;
        self.log(LogEntry::info("Cancel requested"));
        Ok(())
    }

    pub fn confirm_cancelled(&mut self, label: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.confirmed = TaskState::Cancelled;
        self.pending = None;
        self.reverted = None;
        self.status_text = label.into();
        self.log(LogEntry::info("Download cancelled"));
        true
    }

    // ========== Retry ==========

    pub fn begin_retry(&mut self) -> Result<(), ControllerError> {
        if self.confirmed != TaskState::Failed || self.retry_in_flight {
            return Err(ControllerError::invalid(&self.id, "retry", self.state()));
        }
        self.retry_in_flight = true;
        self.log(LogEntry::info("Retry requested"));
        Ok(())
    }

    /// Settle a retry call. On acceptance the task starts over from zero.
    pub fn finish_retry(&mut self, accepted: bool, status: impl Into<String>) -> bool {
        self.retry_in_flight = false;
        if !accepted {
            self.log(LogEntry::warn("Retry rejected"));
            return false;
        }
        if self.confirmed != TaskState::Failed {
            return false;
        }

        self.confirmed = TaskState::Queued;
        self.progress_percent = 0;
        self.progress_epoch = self.progress_epoch.wrapping_add(1);
        self.error_message = None;
        self.cancel_requested = false;
        self.reverted = None;
        self.status_text = status.into();
        self.log(LogEntry::info("Retry accepted"));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> TaskMeta {
        TaskMeta {
            title: "Clip".to_string(),
            format_label: "720p".to_string(),
            file_extension: "MP4".to_string(),
            estimated_size: Some("12.3 MB".to_string()),
        }
    }

    fn task() -> Task {
        Task::new(TaskId::new("t1"), meta(), "Waiting...")
    }

    fn downloading(percent: i64) -> Task {
        let mut t = task();
        t.apply_progress(Some(percent), TaskState::Downloading, "Downloading");
        t
    }

    #[test]
    fn test_new_task_is_queued() {
        let t = task();
        assert_eq!(t.state(), TaskState::Queued);
        assert_eq!(t.progress_percent, 0);
        assert_eq!(t.logs.len(), 1);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(meta().file_name(), "Clip [720p].mp4");
        let mut m = meta();
        m.file_extension.clear();
        assert_eq!(m.file_name(), "Clip [720p].mp4");
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let mut t = downloading(45);
        t.apply_progress(Some(30), TaskState::Downloading, "");
        assert_eq!(t.progress_percent, 45);
        t.apply_progress(Some(250), TaskState::Downloading, "");
        assert_eq!(t.progress_percent, 100);
        assert_eq!(t.status_text, "Downloading");
    }

    #[test]
    fn test_negative_percent_keeps_bar() {
        let mut t = downloading(45);
        t.apply_progress(Some(-1), TaskState::Downloading, "Merging");
        assert_eq!(t.progress_percent, 45);
        assert_eq!(t.status_text, "Merging");
        t.apply_progress(None, TaskState::Downloading, "");
        assert_eq!(t.progress_percent, 45);
    }

    #[test]
    fn test_pause_overlay_and_confirm() {
        let mut t = downloading(10);
        t.begin_intent(PendingIntent::Pause).unwrap();
        assert_eq!(t.state(), TaskState::Paused);
        assert_eq!(t.confirmed, TaskState::Downloading);

        assert!(t.confirm_intent(PendingIntent::Pause, "Paused"));
        assert_eq!(t.state(), TaskState::Paused);
        assert_eq!(t.confirmed, TaskState::Paused);
        assert!(t.pending.is_none());
    }

    #[test]
    fn test_pause_rejection_reverts_to_confirmed_state() {
        let mut t = downloading(10);
        t.begin_intent(PendingIntent::Pause).unwrap();
        assert!(t.reject_intent(PendingIntent::Pause, "Pause rejected"));
        assert_eq!(t.state(), TaskState::Downloading);
        assert_eq!(t.reverted, Some(PendingIntent::Pause));
        assert_eq!(t.status_text, "Pause rejected");
    }

    #[test]
    fn test_second_intent_while_pending_is_refused() {
        let mut t = downloading(10);
        t.begin_intent(PendingIntent::Pause).unwrap();
        let err = t.begin_intent(PendingIntent::Pause).unwrap_err();
        assert!(matches!(err, ControllerError::IntentInFlight { .. }));
    }

    #[test]
    fn test_resume_requires_paused() {
        let mut t = downloading(10);
        assert!(t.begin_intent(PendingIntent::Resume).is_err());
        t.apply_progress(None, TaskState::Paused, "Paused");
        t.begin_intent(PendingIntent::Resume).unwrap();
        assert_eq!(t.state(), TaskState::Downloading);
    }

    #[test]
    fn test_progress_event_matching_overlay_settles_it() {
        let mut t = downloading(10);
        t.begin_intent(PendingIntent::Pause).unwrap();
        t.apply_progress(None, TaskState::Paused, "Paused");
        assert!(t.pending.is_none());
        // The late reply no longer has anything to confirm
        assert!(!t.confirm_intent(PendingIntent::Pause, "Paused"));
        assert_eq!(t.state(), TaskState::Paused);
    }

    #[test]
    fn test_progress_frozen_while_displayed_paused() {
        let mut t = downloading(10);
        t.begin_intent(PendingIntent::Pause).unwrap();
        t.apply_progress(Some(20), TaskState::Downloading, "Downloading");
        assert_eq!(t.progress_percent, 10);
        assert_eq!(t.state(), TaskState::Paused);
    }

    #[test]
    fn test_terminal_ignores_late_events() {
        let mut t = downloading(50);
        assert!(t.complete("Download complete"));
        assert_eq!(t.progress_percent, 100);
        assert!(!t.apply_progress(Some(10), TaskState::Downloading, "x"));
        assert!(!t.fail("boom", "Cancelled"));
        assert!(!t.confirm_cancelled("Cancelled"));
        assert_eq!(t.state(), TaskState::Completed);
    }

    #[test]
    fn test_completion_wins_over_pending_pause() {
        let mut t = downloading(90);
        t.begin_intent(PendingIntent::Pause).unwrap();
        t.complete("Download complete");
        assert_eq!(t.state(), TaskState::Completed);
        assert!(!t.confirm_intent(PendingIntent::Pause, "Paused"));
        assert_eq!(t.state(), TaskState::Completed);
    }

    #[test]
    fn test_fail_after_cancel_request_is_cancellation() {
        let mut t = downloading(30);
        t.request_cancel().unwrap();
        assert!(t.fail("cancelled by user", "Cancelled"));
        assert_eq!(t.state(), TaskState::Cancelled);
        assert!(t.error_message.is_none());
    }

    #[test]
    fn test_fail_sets_error() {
        let mut t = downloading(30);
        assert!(t.fail("HTTP 403", "Cancelled"));
        assert_eq!(t.state(), TaskState::Failed);
        assert_eq!(t.error_message.as_deref(), Some("HTTP 403"));
        assert_eq!(t.status_text, "HTTP 403");
    }

    #[test]
    fn test_retry_resets_progress_and_bumps_epoch() {
        let mut t = downloading(70);
        t.fail("HTTP 500", "Cancelled");
        t.begin_retry().unwrap();
        assert!(t.begin_retry().is_err());
        assert!(t.finish_retry(true, "Waiting..."));
        assert_eq!(t.state(), TaskState::Queued);
        assert_eq!(t.progress_percent, 0);
        assert_eq!(t.progress_epoch, 1);
        assert!(t.error_message.is_none());
        assert!(!t.retry_in_flight);
    }

    #[test]
    fn test_rejected_retry_keeps_failed() {
        let mut t = downloading(70);
        t.fail("HTTP 500", "Cancelled");
        t.begin_retry().unwrap();
        assert!(!t.finish_retry(false, "Waiting..."));
        assert_eq!(t.state(), TaskState::Failed);
        assert!(!t.retry_in_flight);
        assert_eq!(t.progress_epoch, 0);
    }

    #[test]
    fn test_retry_only_from_failed() {
        let mut t = downloading(70);
        assert!(t.begin_retry().is_err());
    }

    #[test]
    fn test_cancel_on_terminal_is_refused() {
        let mut t = task();
        t.complete("done");
        assert!(t.request_cancel().is_err());
        assert!(!t.cancel_requested);
    }

    #[test]
    fn test_logs_are_bounded() {
        let mut t = task();
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            t.log(LogEntry::info(format!("line {}", i)));
        }
        assert_eq!(t.logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(t.logs.last().unwrap().message, format!("line {}", MAX_LOG_ENTRIES + 9));
    }

    #[test]
    fn test_task_state_serde() {
        let json = serde_json::to_string(&TaskState::Downloading).unwrap();
        assert_eq!(json, "\"downloading\"");
        let id: TaskId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
    }
}
