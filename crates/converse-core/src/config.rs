use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConverseError, Result};
use crate::theme::ThemeConfig;

/// Top-level configuration for a Converse widget.
///
/// Loaded from `converse.toml`. Each section corresponds to one concern of
/// the conversation core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConverseConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
}

impl ConverseConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ConverseConfig = toml::from_str(&content)?;
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
            toml::to_string_pretty(self).map_err(|e| ConverseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Fill or replace backend credentials from `CONVERSE_<BACKEND>_API_KEY`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// injectable variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let slots = [
            ("CONVERSE_GEMINI_API_KEY", &mut self.providers.gemini),
            ("CONVERSE_OPENAI_API_KEY", &mut self.providers.openai),
            ("CONVERSE_ANTHROPIC_API_KEY", &mut self.providers.anthropic),
            ("CONVERSE_GROQ_API_KEY", &mut self.providers.groq),
        ];
        for (var, slot) in slots {
            let Some(key) = lookup(var).filter(|k| !k.trim().is_empty()) else {
                continue;
            };
            info!(variable = var, "Using backend credential from environment");
            slot.get_or_insert_with(ProviderSettings::default).api_key = key;
        }
    }
}

/// General settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Credentials and model choice for one backend.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Secret API key. Blank means "not configured".
    pub api_key: String,
    /// Model name; the backend default is used when absent.
    pub model: Option<String>,
    /// Persona instruction for this backend only.
    pub persona_instruction: Option<String>,
    /// Override of the API base URL (proxies, tests).
    pub base_url: Option<String>,
}

impl ProviderSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona_instruction = Some(persona.into());
        self
    }

    /// Whether a usable credential is present.
    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("persona_instruction", &self.persona_instruction)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// The four backend credential slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: Option<ProviderSettings>,
    pub openai: Option<ProviderSettings>,
    pub anthropic: Option<ProviderSettings>,
    pub groq: Option<ProviderSettings>,
}

/// Conversation behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Persona/system instruction shared by all backends.
    pub persona_instruction: Option<String>,
    /// Bot message seeded into an uncontrolled conversation.
    pub welcome_message: Option<String>,
    /// Block new sends.
    pub disabled: bool,
    /// Delay before the echo fallback replies, in milliseconds.
    pub echo_delay_ms: u64,
    /// Optional per-request timeout. No timeout when absent.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            persona_instruction: None,
            welcome_message: Some("Hi! How can I help you today?".to_string()),
            disabled: false,
            echo_delay_ms: 500,
            request_timeout_secs: None,
        }
    }
}

/// File upload gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Whether users may attach files at all.
    pub enabled: bool,
    /// Accepted types in HTML `accept` syntax (`image/*`, `application/pdf`, `.pdf`).
    /// Empty accepts everything.
    pub accepted_types: Vec<String>,
    /// Maximum file size in bytes.
    pub max_size_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            accepted_types: vec!["image/*".to_string()],
            max_size_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Voice input settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// BCP 47 language tag handed to the recognizer.
    pub language: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            language: "en-US".to_string(),
        }
    }
}
