use crate::download::media::MediaInfo;
use crate::download::task::{Task, TaskState};
use crate::ui::dialog::{Dialog, DialogKind};
use crate::util::i18n::LocalizationManager;
use serde_json::json;

/// Format one analyzed item with its formats
pub fn format_media(info: &MediaInfo) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}\n", info.title));
    output.push_str(&format!("URL: {}\n", info.url));
    if let Some(uploader) = &info.uploader {
        output.push_str(&format!("Uploader: {}\n", uploader));
    }
    if let Some(duration) = &info.duration_str {
        output.push_str(&format!("Duration: {}\n", duration));
    } else if let Some(secs) = info.duration {
        output.push_str(&format!("Duration: {}:{:02}\n", secs / 60, secs % 60));
    }
    output.push_str("Formats:\n");
    for format in &info.formats {
        output.push_str(&format!(
            "  {:<10} {:<16} {:<5} {}\n",
            format.normalized_id(),
            format.display_label(),
            format.ext,
            format.size.as_deref().unwrap_or("-")
        ));
    }

    output
}

/// Format analyzed items for display
pub fn format_media_list(items: &[MediaInfo], json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
    }

    items
        .iter()
        .map(format_media)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One progress line: `[ 45%] Downloading  title [720p].mp4  status`
pub fn format_task(task: &Task, i18n: &LocalizationManager) -> String {
    let icon = match task.state() {
        TaskState::Queued => "…",
        TaskState::Downloading => "↓",
        TaskState::Paused => "⏸",
        TaskState::Completed => "✓",
        TaskState::Failed => "✗",
        TaskState::Cancelled => "-",
    };

    let mut line = format!(
        "{} [{:3}%] {:<12} {}",
        icon,
        task.progress_percent,
        i18n.get(task.state().label_key()),
        task.meta.file_name()
    );
    if !task.status_text.is_empty() {
        line.push_str(&format!("  {}", task.status_text));
    }
    line
}

pub fn task_json(task: &Task) -> serde_json::Value {
    json!({
        "task_id": task.id,
        "state": task.state(),
        "percent": task.progress_percent,
        "status": task.status_text,
        "file_name": task.meta.file_name(),
        "error": task.error_message,
    })
}

pub fn format_dialog(dialog: &Dialog) -> String {
    let prefix = match dialog.kind {
        DialogKind::Info => "Info",
        DialogKind::Warning => "Warning",
        DialogKind::Error => "Error",
    };
    format!("{}: {}", prefix, dialog)
}
