//! Settings
//!
//! Application settings and the generation service configuration. Both are
//! stored as JSON under their own key; missing fields fall back to defaults
//! so payloads written by older releases still load.

use crate::config::{
    DEFAULT_GENERATION_API_BASE_URL, DEFAULT_HISTORY_CHAPTERS_MAX_CHARS,
    MAX_HISTORY_CHAPTERS_MAX_CHARS,
};
use serde::{Deserialize, Serialize};

/// Theme preference chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

/// Theme actually applied after resolving `ThemeMode::System`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTheme {
    Light,
    Dark,
}

impl ThemeMode {
    pub fn resolve(self, prefers_dark: bool) -> ResolvedTheme {
        match self {
            ThemeMode::Light => ResolvedTheme::Light,
            ThemeMode::Dark => ResolvedTheme::Dark,
            ThemeMode::System if prefers_dark => ResolvedTheme::Dark,
            ThemeMode::System => ResolvedTheme::Light,
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub theme_mode: ThemeMode,
    /// Character budget for prior chapters sent as generation context
    #[serde(default = "default_history_chapters_max_chars")]
    pub history_chapters_max_chars: usize,
}

fn default_history_chapters_max_chars() -> usize {
    DEFAULT_HISTORY_CHAPTERS_MAX_CHARS
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme_mode: ThemeMode::default(),
            history_chapters_max_chars: default_history_chapters_max_chars(),
        }
    }
}

/// Whether `max_chars` is an acceptable history budget
pub fn is_valid_history_budget(max_chars: usize) -> bool {
    (1..=MAX_HISTORY_CHAPTERS_MAX_CHARS).contains(&max_chars)
}

/// Connection settings for the generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationServiceConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: String,
}

fn default_api_base_url() -> String {
    DEFAULT_GENERATION_API_BASE_URL.to_string()
}

impl Default for GenerationServiceConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: String::new(),
        }
    }
}

impl GenerationServiceConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn apply(&mut self, patch: GenerationConfigPatch) {
        if let Some(api_base_url) = patch.api_base_url {
            self.api_base_url = api_base_url;
        }
        if let Some(api_key) = patch.api_key {
            self.api_key = api_key;
        }
    }
}

/// Partial update of the generation service configuration
#[derive(Debug, Clone, Default)]
pub struct GenerationConfigPatch {
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
}
