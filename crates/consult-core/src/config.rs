use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConsultError, Result};

/// Top-level configuration for the consultation engine.
///
/// Loaded from `~/.consult/config.toml` by default. Every section falls back
/// to its defaults when missing, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsultConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub interview: InterviewConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub diagnosis: DiagnosisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl ConsultConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ConsultConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConsultError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.consult/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// The scripted interview: question sequence and closing line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
    /// Questions asked in order. The answer to the last one triggers extraction.
    pub questions: Vec<String>,
    /// Spoken once the diagnosis has been recorded.
    pub closing_message: String,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            questions: vec![
                "How are you feeling today?".to_string(),
                "What symptoms are you experiencing today?".to_string(),
                "How long have you been feeling this way?".to_string(),
                "How severe are the symptoms?".to_string(),
                "Have you experienced these symptoms before?".to_string(),
                "What else can you tell me about your condition?".to_string(),
                "Let me analyze your symptoms further, give me up to a minute.".to_string(),
            ],
            closing_message: "Thank you for sharing all this information. I've recorded your \
                              symptoms. This consultation is now complete."
                .to_string(),
        }
    }
}

/// Generative-language API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the `generateContent` endpoint family.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Environment variable holding the API key. The key itself is never stored.
    pub api_key_env: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Which diagnosis resolver backs the consultation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    /// Ask the language model.
    #[default]
    Llm,
    /// Score symptoms against a local disease catalog.
    Catalog,
}

/// Diagnosis resolver settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisConfig {
    pub resolver: ResolverKind,
    /// Disease catalog TOML. The built-in catalog is used when unset.
    pub catalog_path: Option<String>,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file name inside `general.data_dir`.
    pub database_file: String,
    /// Default number of consultations shown by the history view.
    pub history_limit: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: "consult.db".to_string(),
            history_limit: 20,
        }
    }
}
