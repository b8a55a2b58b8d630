use super::config::Config;
use crate::util::i18n::normalize_locale;

/// Validation errors for application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Language has no bundled translations
    UnknownLanguage(String),
    /// Gateway base URL does not parse as an http(s) URL
    InvalidBaseUrl(String),
    /// A timeout or interval that must be positive is zero
    ZeroDuration(&'static str),
    /// Compact status width too small to show anything
    ZeroStatusWidth,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::UnknownLanguage(language) => {
                write!(f, "Language '{}' is not supported (use en or zh-CN)", language)
            }
            ValidationError::InvalidBaseUrl(url) => {
                write!(f, "Gateway base URL '{}' is not a valid http(s) URL", url)
            }
            ValidationError::ZeroDuration(field) => {
                write!(f, "'{}' must be greater than zero", field)
            }
            ValidationError::ZeroStatusWidth => {
                write!(f, "'ui.status_width' must be greater than zero")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate the whole configuration, collecting every problem
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if normalize_locale(&config.general.language).is_none() {
        errors.push(ValidationError::UnknownLanguage(
            config.general.language.clone(),
        ));
    }

    let base_ok = url::Url::parse(&config.gateway.base_url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    if !base_ok {
        errors.push(ValidationError::InvalidBaseUrl(
            config.gateway.base_url.clone(),
        ));
    }

    if config.gateway.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("gateway.connect_timeout_secs"));
    }
    if config.intake.analyze_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("intake.analyze_timeout_secs"));
    }
    if config.ui.tick_ms == 0 {
        errors.push(ValidationError::ZeroDuration("ui.tick_ms"));
    }
    if config.ui.status_width == 0 {
        errors.push(ValidationError::ZeroStatusWidth);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub(crate) fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
