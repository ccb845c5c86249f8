//! Application settings management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// General settings
    #[serde(default)]
    pub general: GeneralSettings,

    /// LLM provider settings
    #[serde(default)]
    pub llm: LlmSettings,

    /// Prompt persona settings
    #[serde(default)]
    pub prompt: PromptSettings,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Data directory for the database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// LLM provider (ark, openai)
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key
    #[serde(default)]
    pub api_key: String,

    /// Model name or endpoint id
    #[serde(default)]
    pub model: String,

    /// API base URL (empty = provider default)
    #[serde(default)]
    pub endpoint: String,

    /// Timeout for non-streaming requests, in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Persona the model is asked to play
    #[serde(default = "default_role")]
    pub role: String,

    /// Language style of the answers
    #[serde(default = "default_style")]
    pub style: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Upper bound on one streamed chat turn, in seconds
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,
}

// Default value functions

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "meeting-agent", "meeting-agent")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.local/share/meeting-agent"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_llm_provider() -> String {
    "ark".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_role() -> String {
    "会议总结助手".to_string()
}

fn default_style() -> String {
    "专业".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1:8888".to_string()
}

fn default_chat_timeout() -> u64 {
    120
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: String::new(),
            model: String::new(),
            endpoint: String::new(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            role: default_role(),
            style: default_style(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            chat_timeout_secs: default_chat_timeout(),
        }
    }
}

impl Settings {
    /// Load settings from the configuration file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("No config file found, using defaults");
            let mut settings = Self::default();
            settings.apply_env_overrides();
            return Ok(settings);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        settings.apply_env_overrides();

        Ok(settings)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        override_if_empty(&mut self.llm.api_key, "MEETING_AGENT_API_KEY");
        override_if_empty(&mut self.llm.model, "MEETING_AGENT_MODEL");
        override_if_empty(&mut self.llm.endpoint, "MEETING_AGENT_ENDPOINT");
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "meeting-agent", "meeting-agent")
            .context("Could not determine config directory")?;

        let config_dir = dirs.config_dir();
        Ok(config_dir.join("config.toml"))
    }

    /// Write default configuration to a file
    pub fn write_default(path: &PathBuf) -> Result<()> {
        let settings = Self::default();
        let content = toml::to_string_pretty(&settings)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the database path
    pub fn database_path(&self) -> PathBuf {
        self.general.data_dir.join("meetings.db")
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.general.data_dir)?;
        Ok(())
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.server.chat_timeout_secs)
    }
}

fn override_if_empty(field: &mut String, var: &str) {
    if !field.trim().is_empty() {
        return;
    }
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            *field = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_ark_provider_and_chinese_persona() {
        let settings = Settings::default();
        assert_eq!(settings.llm.provider, "ark");
        assert_eq!(settings.prompt.role, "会议总结助手");
        assert_eq!(settings.prompt.style, "专业");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [llm]
            model = "doubao-pro"

            [server]
            chat_timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.llm.model, "doubao-pro");
        assert_eq!(settings.llm.timeout_secs, 30);
        assert_eq!(settings.chat_timeout(), Duration::from_secs(5));
        assert_eq!(settings.server.bind_address, "127.0.0.1:8888");
    }
}
