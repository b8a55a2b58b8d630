use super::config::Config;
use crate::util::i18n::LocalizationManager;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    /// Shared internationalization manager
    pub i18n: Arc<LocalizationManager>,
}

impl AppState {
    /// Create LocalizationManager with fallback to English
    fn create_i18n(language: &str) -> Result<Arc<LocalizationManager>> {
        match LocalizationManager::new(language) {
            Ok(manager) => Ok(Arc::new(manager)),
            Err(e) => {
                tracing::error!("Failed to load translations for '{}': {}", language, e);
                tracing::info!("Falling back to English");
                Ok(Arc::new(LocalizationManager::fallback()?))
            }
        }
    }

    pub fn new(config: Config) -> Result<Self> {
        let i18n = Self::create_i18n(&config.general.language)?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            i18n,
        })
    }

    /// Get translated string by key
    pub fn t(&self, key: &str) -> String {
        self.i18n.get(key)
    }

    /// Get translated string with arguments
    pub fn t_with_args(&self, key: &str, args: Option<&fluent_bundle::FluentArgs>) -> String {
        self.i18n.get_with_args(key, args)
    }
}
