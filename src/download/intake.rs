//! Analyze intake
//!
//! Resolves pasted links into [`MediaInfo`] one at a time. Each link races a
//! timer; whichever finishes first wins and the loser is dropped. With a
//! single link the first failure is reported to the user. With several,
//! failures are skipped and only an all-failed run is an error.

use super::media::{DEFAULT_FORMAT_ID, FormatOption, MediaInfo};
use crate::gateway::reply::{AnalyzeReply, WireReply};
use crate::gateway::{GatewayError, TaskGateway};
use crate::ui::dialog::Dialog;
use crate::util::i18n::LocalizationManager;
use crate::util::url_list::parse_url_list;
use fluent::fluent_args;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ANALYZE_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("no links to analyze")]
    EmptyInput,

    #[error("backend is not ready")]
    Unavailable,

    #[error("analyzing {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("backend could not analyze {url}: {}", message.as_deref().unwrap_or("no reason given"))]
    Rejected { url: String, message: Option<String> },

    #[error("request for {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: GatewayError,
    },

    #[error("none of the links could be analyzed")]
    NoResults,
}

impl IntakeError {
    /// The blocking dialog shown for this failure
    pub fn to_dialog(&self, i18n: &LocalizationManager) -> Dialog {
        match self {
            Self::EmptyInput => {
                Dialog::warning(i18n.get("dialog-title-notice"), i18n.get("msg-enter-urls"))
            }
            Self::Unavailable => Dialog::warning(
                i18n.get("dialog-title-not-ready"),
                i18n.get("msg-backend-not-ready"),
            ),
            Self::Timeout { url, secs } => {
                let args = fluent_args!["url" => url.as_str(), "secs" => *secs];
                Dialog::error(
                    i18n.get("dialog-title-network-error"),
                    i18n.get_with_args("msg-analyze-timeout", Some(&args)),
                )
            }
            Self::Rejected { message, .. } => Dialog::error(
                i18n.get("dialog-title-analyze-failed"),
                message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| i18n.get("msg-analyze-rejected")),
            ),
            Self::Transport { source, .. } => {
                let title = if source.is_network() {
                    "dialog-title-network-error"
                } else {
                    "dialog-title-system-error"
                };
                Dialog::error(i18n.get(title), source.to_string())
            }
            Self::NoResults => {
                Dialog::error(i18n.get("dialog-title-analyze-failed"), i18n.get("msg-no-results"))
            }
        }
    }
}

/// Parse pasted text and analyze every distinct link in it
pub async fn analyze_input<G: TaskGateway + ?Sized>(
    gateway: &G,
    raw: &str,
    limit: Duration,
) -> Result<Vec<MediaInfo>, IntakeError> {
    analyze_urls(gateway, &parse_url_list(raw), limit).await
}

pub async fn analyze_urls<G: TaskGateway + ?Sized>(
    gateway: &G,
    urls: &[String],
    limit: Duration,
) -> Result<Vec<MediaInfo>, IntakeError> {
    if urls.is_empty() {
        return Err(IntakeError::EmptyInput);
    }
    if !gateway.is_ready() {
        return Err(IntakeError::Unavailable);
    }

    let single = urls.len() == 1;
    let mut items = Vec::with_capacity(urls.len());
    for (i, url) in urls.iter().enumerate() {
        tracing::info!("Analyzing {}/{}: {}", i + 1, urls.len(), url);
        match resolve_one(gateway, url, limit).await {
            Ok(info) => items.push(info),
            Err(e) if single => {
                tracing::warn!("Analyze failed: {}", e);
                return Err(e);
            }
            Err(e) => tracing::warn!("Skipping link: {}", e),
        }
    }

    if items.is_empty() {
        Err(IntakeError::NoResults)
    } else {
        tracing::info!("Resolved {} of {} link(s)", items.len(), urls.len());
        Ok(items)
    }
}

/// Resolve one link, giving up after `limit`
pub async fn resolve_one<G: TaskGateway + ?Sized>(
    gateway: &G,
    url: &str,
    limit: Duration,
) -> Result<MediaInfo, IntakeError> {
    let raw = match tokio::time::timeout(limit, gateway.analyze(url)).await {
        Err(_) => {
            return Err(IntakeError::Timeout {
                url: url.to_string(),
                secs: limit.as_secs(),
            });
        }
        Ok(Err(source)) => {
            return Err(IntakeError::Transport {
                url: url.to_string(),
                source,
            });
        }
        Ok(Ok(raw)) => raw,
    };

    let reply = AnalyzeReply::from_wire(raw);
    match reply.data.filter(|_| reply.success) {
        Some(mut info) => {
            if info.url.trim().is_empty() {
                info.url = url.to_string();
            }
            if info.formats.is_empty() {
                info.formats.push(FormatOption {
                    id: DEFAULT_FORMAT_ID.to_string(),
                    label: "Best Quality".to_string(),
                    ext: "MP4".to_string(),
                    size: None,
                });
            }
            Ok(info)
        }
        None => Err(IntakeError::Rejected {
            url: url.to_string(),
            message: reply.error,
        }),
    }
}
