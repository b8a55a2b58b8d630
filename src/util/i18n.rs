use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::path::Path;
use unic_langid::LanguageIdentifier;

/// Translations compiled into the binary
const BUILTIN_LOCALES: &[(&str, &str)] = &[
    ("en-US", include_str!("../../locales/en-US/main.ftl")),
    ("zh-CN", include_str!("../../locales/zh-CN/main.ftl")),
];

pub const FALLBACK_LOCALE: &str = "en-US";

/// Map short or loosely-cased codes to a bundled locale id
pub fn normalize_locale(locale: &str) -> Option<&'static str> {
    let locale_lower = locale.trim().to_lowercase().replace('_', "-");
    match locale_lower.as_str() {
        "en" | "en-us" => Some("en-US"),
        "zh" | "zh-cn" | "zh-hans" => Some("zh-CN"),
        _ => None,
    }
}

/// Manages localization resources and provides translation API
pub struct LocalizationManager {
    bundle: FluentBundle<FluentResource>,
    fallback_bundle: Option<FluentBundle<FluentResource>>,
    current_locale: String,
}

impl std::fmt::Debug for LocalizationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizationManager")
            .field("current_locale", &self.current_locale)
            .finish_non_exhaustive()
    }
}

impl LocalizationManager {
    /// Create a new LocalizationManager for the specified locale
    ///
    /// # Arguments
    /// * `locale` - Language code ("en" or "zh-CN")
    ///
    /// # Returns
    /// * `Ok(LocalizationManager)` on success
    /// * `Err` if the locale is not bundled or its resources fail to parse
    pub fn new(locale: &str) -> anyhow::Result<Self> {
        let locale_id = normalize_locale(locale)
            .ok_or_else(|| anyhow::anyhow!("Unsupported locale: {}", locale))?;

        tracing::info!("Loading translations for locale: {}", locale_id);

        let mut bundle = Self::load_locale_bundle(locale_id)?;
        if let Ok(dir) = crate::util::paths::get_locale_data_dir() {
            Self::apply_overrides(&mut bundle, &dir.join(locale_id));
        }

        let fallback_bundle = if locale_id != FALLBACK_LOCALE {
            match Self::load_locale_bundle(FALLBACK_LOCALE) {
                Ok(fallback) => {
                    tracing::debug!("Loaded fallback locale: {}", FALLBACK_LOCALE);
                    Some(fallback)
                }
                Err(e) => {
                    tracing::warn!("Failed to load fallback locale {}: {}", FALLBACK_LOCALE, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            bundle,
            fallback_bundle,
            current_locale: locale_id.to_string(),
        })
    }

    /// English manager, used when the configured language cannot be loaded
    pub fn fallback() -> anyhow::Result<Self> {
        Self::new(FALLBACK_LOCALE)
    }

    fn load_locale_bundle(locale_id: &str) -> anyhow::Result<FluentBundle<FluentResource>> {
        let source = BUILTIN_LOCALES
            .iter()
            .find(|(id, _)| *id == locale_id)
            .map(|(_, source)| *source)
            .ok_or_else(|| anyhow::anyhow!("No bundled translations for {}", locale_id))?;

        let lang_id: LanguageIdentifier = locale_id
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid locale ID '{}': {:?}", locale_id, e))?;

        let mut bundle = FluentBundle::new_concurrent(vec![lang_id]);
        // Status text is measured in display columns; isolation marks would skew it
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow::anyhow!("Failed to parse {}: {:?}", locale_id, errors))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Failed to add resource for {}: {:?}", locale_id, errors))?;

        Ok(bundle)
    }

    /// Layer user-provided .ftl files over the bundled messages
    fn apply_overrides(bundle: &mut FluentBundle<FluentResource>, dir: &Path) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };

        for path in entries.flatten().map(|e| e.path()) {
            if path.extension().and_then(|s| s.to_str()) != Some("ftl") {
                continue;
            }
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Failed to read {:?}: {}", path, e);
                    continue;
                }
            };
            match FluentResource::try_new(content) {
                Ok(resource) => {
                    tracing::debug!("Applying translation overrides from {:?}", path);
                    bundle.add_resource_overriding(resource);
                }
                Err((_, errors)) => {
                    tracing::warn!("Failed to parse {:?}: {:?}", path, errors);
                }
            }
        }
    }

    /// Get a translated string by key
    pub fn get(&self, key: &str) -> String {
        self.get_with_args(key, None)
    }

    /// Get a translated string with arguments
    ///
    /// Falls back to en-US, then to `[missing: key]`.
    pub fn get_with_args(&self, key: &str, args: Option<&FluentArgs>) -> String {
        if let Some(value) = Self::format(&self.bundle, key, args) {
            return value;
        }

        if let Some(fallback) = &self.fallback_bundle {
            if let Some(value) = Self::format(fallback, key, args) {
                tracing::debug!("Using fallback translation for key: {}", key);
                return value;
            }
        }

        tracing::warn!("Missing translation key: {}", key);
        format!("[missing: {}]", key)
    }

    fn format(
        bundle: &FluentBundle<FluentResource>,
        key: &str,
        args: Option<&FluentArgs>,
    ) -> Option<String> {
        let pattern = bundle.get_message(key)?.value()?;
        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            tracing::warn!("Translation errors for key '{}': {:?}", key, errors);
        }
        Some(value.into_owned())
    }

    /// Get the current locale code
    pub fn current_locale(&self) -> &str {
        &self.current_locale
    }
}
