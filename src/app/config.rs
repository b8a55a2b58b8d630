use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration (saved to config/settings.toml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    #[default]
    Http,
    Sim,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub kind: GatewayKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            kind: GatewayKind::Http,
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl GatewayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8765".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default = "default_analyze_timeout")]
    pub analyze_timeout_secs: u64,
    #[serde(default = "default_format")]
    pub default_format: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            analyze_timeout_secs: default_analyze_timeout(),
            default_format: default_format(),
        }
    }
}

impl IntakeConfig {
    pub fn analyze_timeout(&self) -> Duration {
        Duration::from_secs(self.analyze_timeout_secs)
    }
}

fn default_analyze_timeout() -> u64 {
    180
}

fn default_format() -> String {
    crate::download::media::DEFAULT_FORMAT_ID.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Compact status truncation width, in display columns
    #[serde(default = "default_status_width")]
    pub status_width: usize,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Log lines shown per detailed fragment
    #[serde(default = "default_log_lines")]
    pub log_lines: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            status_width: default_status_width(),
            tick_ms: default_tick_ms(),
            log_lines: default_log_lines(),
        }
    }
}

impl UiConfig {
    pub fn projector_options(&self) -> crate::view::ProjectorOptions {
        crate::view::ProjectorOptions {
            status_width: self.status_width,
            log_lines: self.log_lines,
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

fn default_status_width() -> usize {
    28
}

fn default_tick_ms() -> u64 {
    250
}

fn default_log_lines() -> usize {
    5
}

impl Config {
    /// Load configuration from the config directory; missing file means defaults
    pub fn load() -> anyhow::Result<Self> {
        let config_path = crate::util::paths::get_app_config_path()?;
        Self::load_from(&config_path)
    }

    /// Save configuration to the config directory
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = crate::util::paths::get_app_config_path()?;
        self.save_to(&config_path)
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            tracing::info!("Config not found at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .context(format!("Failed to read {:?}", config_path))?;
        let config: Config =
            toml::from_str(&content).context(format!("Failed to parse {:?}", config_path))?;

        if let Err(errors) = crate::app::settings::validate(&config) {
            return Err(anyhow::anyhow!(
                "Invalid configuration: {}",
                crate::app::settings::join_errors(&errors)
            ));
        }

        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Err(errors) = crate::app::settings::validate(self) {
            return Err(anyhow::anyhow!(
                "Cannot save invalid config: {}",
                crate::app::settings::join_errors(&errors)
            ));
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;

        // Atomic write using temp file + rename
        let temp_path = config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &content).context("Failed to write temp config file")?;
        std::fs::rename(&temp_path, config_path).context("Failed to rename temp config file")?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.general.language, "en");
        assert_eq!(config.gateway.kind, GatewayKind::Http);
        assert_eq!(config.intake.analyze_timeout(), Duration::from_secs(180));
        assert_eq!(config.intake.default_format, "best");
        assert_eq!(config.ui.status_width, 28);
        assert_eq!(config.ui.log_lines, 5);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[gateway]\nkind = \"sim\"\n\n[intake]\nanalyze_timeout_secs = 30\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.gateway.kind, GatewayKind::Sim);
        assert_eq!(config.gateway.base_url, "http://127.0.0.1:8765");
        assert_eq!(config.intake.analyze_timeout_secs, 30);
        assert_eq!(config.ui, UiConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut config = Config::default();
        config.general.language = "zh-CN".to_string();
        config.ui.status_width = 40;
        config.save_to(&path).unwrap();

        assert!(!path.with_extension("toml.tmp").exists());
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[intake]\nanalyze_timeout_secs = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_save_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let mut config = Config::default();
        config.gateway.base_url = "not a url".to_string();
        assert!(config.save_to(&path).is_err());
        assert!(!path.exists());
    }
}
