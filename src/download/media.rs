use super::binding::ButtonKey;
use super::task::TaskMeta;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FORMAT_ID: &str = "best";

fn default_format_id() -> String {
    DEFAULT_FORMAT_ID.to_string()
}

fn default_ext() -> String {
    "mp4".to_string()
}

/// One downloadable encoding of a media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOption {
    #[serde(default = "default_format_id")]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_ext")]
    pub ext: String,
    #[serde(default)]
    pub size: Option<String>,
}

impl FormatOption {
    /// Empty ids fall back to `best`
    pub fn normalized_id(&self) -> &str {
        let id = self.id.trim();
        if id.is_empty() { DEFAULT_FORMAT_ID } else { id }
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            self.normalized_id()
        } else {
            &self.label
        }
    }
}

/// Metadata returned by the analyze call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Seconds
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub duration_str: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub view_count: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatOption>,
}

impl MediaInfo {
    pub fn request_for(&self, format: &FormatOption) -> DownloadRequest {
        DownloadRequest {
            url: self.url.clone(),
            title: self.title.clone(),
            format: format.clone(),
        }
    }
}

/// Everything needed to start one download from a format button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub title: String,
    pub format: FormatOption,
}

impl DownloadRequest {
    pub fn button_key(&self) -> ButtonKey {
        ButtonKey::new(self.url.trim(), self.format.normalized_id())
    }

    pub fn meta(&self) -> TaskMeta {
        TaskMeta {
            title: self.title.clone(),
            format_label: self.format.display_label().to_string(),
            file_extension: self.format.ext.clone(),
            estimated_size: self.format.size.clone(),
        }
    }
}

/// Label shown for a batch task, which has no analyzed format list
pub fn batch_format_label(format_id: &str) -> String {
    match format_id {
        "audio" => "Audio Only".to_string(),
        "best" | "" => "Best Quality".to_string(),
        other => other.to_string(),
    }
}
