//! Compass configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompassConfig {
    /// Completion service parameters.
    pub completion: CompletionConfig,
    /// Stance learning parameters.
    pub stance: StanceConfig,
    /// Fact merge parameters.
    pub facts: FactConfig,
    /// Presence throttle parameters.
    pub presence: PresenceConfig,
    /// Completion output sanitation limits.
    pub sanitize: SanitizeConfig,
    /// Local state store.
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Model ID passed to the provider.
    pub model: String,
    /// Max output tokens per completion.
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StanceConfig {
    /// Amount a single feedback event moves a stance field.
    pub step: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactConfig {
    /// Superseded values kept per record.
    pub max_history: usize,
    /// Supporting observations kept per record.
    pub max_evidence: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Minimum seconds between two emitted events for one user, across topics.
    pub cooldown_secs: i64,
    /// How many of the most recent events the visibility scan looks at.
    pub scan_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Reply text is cut at this many chars.
    pub max_reply_chars: usize,
    /// Cap on actions, tasks and new facts each.
    pub max_items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot path for the file store.
    pub path: PathBuf,
}

// ============================================================
// Defaults
// ============================================================

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 2048,
            temperature: None,
        }
    }
}

impl Default for StanceConfig {
    fn default() -> Self {
        Self { step: 2 }
    }
}

impl Default for FactConfig {
    fn default() -> Self {
        Self { max_history: 8, max_evidence: 16 }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self { cooldown_secs: 1_800, scan_window: 50 }
    }
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self { max_reply_chars: 4_000, max_items: 8 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("compass-state.json") }
    }
}

// ============================================================
// Loading
// ============================================================

impl CompassConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
