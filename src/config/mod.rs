//! Configuration module for meeting-agent
//!
//! Handles loading and managing application settings from TOML files.

mod settings;

pub use settings::{GeneralSettings, LlmSettings, PromptSettings, ServerSettings, Settings};
