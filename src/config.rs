//! Process-wide configuration, built once at startup and passed by reference

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::heuristics::RoleHeuristicsConfig;
use crate::llm::{CohereConfig, PromptTemplate};
use crate::models::Speaker;
use crate::stages::AnalyzerConfig;
use crate::transcription::{AssemblyAiConfig, TranscriptionConfig};

/// Case-insensitive mapping from speaker names to roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerAliases {
    aliases: HashMap<String, Speaker>,
}

impl SpeakerAliases {
    /// No aliases at all; every speaker resolves to `Unknown`
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Register an alias; later registrations win
    pub fn with_alias(mut self, alias: &str, speaker: Speaker) -> Self {
        self.insert(alias, speaker);
        self
    }

    pub fn insert(&mut self, alias: &str, speaker: Speaker) {
        let key = normalize_alias(alias);
        if !key.is_empty() {
            self.aliases.insert(key, speaker);
        }
    }

    /// Role for a speaker name, if it is a known alias
    pub fn resolve(&self, name: &str) -> Option<Speaker> {
        self.aliases.get(&normalize_alias(name)).copied()
    }

    /// Role for a speaker name, `Unknown` when unrecognized
    pub fn resolve_or_unknown(&self, name: &str) -> Speaker {
        self.resolve(name).unwrap_or(Speaker::Unknown)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl Default for SpeakerAliases {
    fn default() -> Self {
        let mut aliases = Self::empty();
        for alias in ["customer", "cliente", "client"] {
            aliases.insert(alias, Speaker::Customer);
        }
        for alias in ["agent", "agente", "operador", "gestor"] {
            aliases.insert(alias, Speaker::Agent);
        }
        aliases
    }
}

fn normalize_alias(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Chat model settings overridable from the config file
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Everything the pipeline needs apart from credentials
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub prompt: PromptTemplate,
    pub aliases: SpeakerAliases,
    pub analyzer: AnalyzerConfig,
    pub transcription: TranscriptionConfig,
    pub role_heuristics: RoleHeuristicsConfig,
    pub chat: ChatSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prompt: PromptTemplate::default(),
            aliases: SpeakerAliases::default(),
            analyzer: AnalyzerConfig::default(),
            transcription: TranscriptionConfig::default(),
            role_heuristics: RoleHeuristicsConfig::default(),
            chat: ChatSettings {
                model: None,
                temperature: None,
                max_tokens: None,
            },
        }
    }
}

impl AppConfig {
    /// Defaults, overridden by the JSON file at `path` when given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                let file: FileConfig =
                    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                        path: path.display().to_string(),
                        source,
                    })?;
                debug!("Loaded configuration from {:?}", path);
                Self::from_file_config(file)
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply file overrides on top of the defaults and validate the result
    pub fn from_file_config(file: FileConfig) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(preset) = &file.prompt_preset {
            config.prompt = PromptTemplate::preset(preset)?;
        }
        if let Some(template) = file.prompt_template {
            config.prompt = PromptTemplate::new(template)?;
        }

        for (role, names) in &file.speaker_aliases {
            let speaker = match role.trim().to_lowercase().as_str() {
                "customer" => Speaker::Customer,
                "agent" => Speaker::Agent,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "speaker_aliases",
                        reason: format!("unknown role '{}' (expected customer or agent)", other),
                    });
                }
            };
            for name in names {
                config.aliases.insert(name, speaker);
            }
        }

        if let Some(analyzer) = file.analyzer {
            analyzer.apply(&mut config.analyzer);
        }
        if let Some(transcription) = file.transcription {
            transcription.apply(&mut config.transcription);
        }
        if let Some(cues) = file.role_cues {
            config.role_heuristics = cues;
        }

        config.chat = ChatSettings {
            model: file.model,
            temperature: file.temperature,
            max_tokens: file.max_tokens,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.analyzer.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analyzer.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.analyzer.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analyzer.concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.analyzer.call_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "analyzer.call_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        if let Some(temperature) = self.chat.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(ConfigError::InvalidValue {
                    field: "temperature",
                    reason: format!("{} is outside 0.0..=1.0", temperature),
                });
            }
        }
        if self.transcription.speakers_expected == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transcription.speakers_expected",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Cohere settings: key from the environment, model overrides from file
    pub fn cohere_config(&self) -> Result<CohereConfig, ConfigError> {
        let mut cohere = CohereConfig::from_env()?;
        if let Some(model) = &self.chat.model {
            cohere.model = model.clone();
        }
        if let Some(temperature) = self.chat.temperature {
            cohere.temperature = temperature;
        }
        if let Some(max_tokens) = self.chat.max_tokens {
            cohere.max_tokens = max_tokens;
        }
        cohere.request_timeout = self.analyzer.call_timeout;
        Ok(cohere)
    }

    pub fn assemblyai_config(&self) -> Result<AssemblyAiConfig, ConfigError> {
        AssemblyAiConfig::from_env()
    }
}

/// On-disk configuration; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// `spanish_banking` or `general`
    pub prompt_preset: Option<String>,
    /// Custom template; takes precedence over `prompt_preset`
    pub prompt_template: Option<String>,
    /// Extra aliases keyed by role: `{"customer": ["socio"], "agent": ["asesor"]}`
    pub speaker_aliases: HashMap<String, Vec<String>>,
    pub analyzer: Option<AnalyzerOverrides>,
    pub transcription: Option<TranscriptionOverrides>,
    pub role_cues: Option<RoleHeuristicsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerOverrides {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub call_timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
}

impl AnalyzerOverrides {
    fn apply(&self, config: &mut AnalyzerConfig) {
        if let Some(v) = self.max_attempts {
            config.max_attempts = v;
        }
        if let Some(v) = self.initial_backoff_ms {
            config.initial_backoff = Duration::from_millis(v);
        }
        if let Some(v) = self.max_backoff_ms {
            config.max_backoff = Duration::from_millis(v);
        }
        if let Some(v) = self.call_timeout_secs {
            config.call_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranscriptionOverrides {
    pub language_code: Option<String>,
    pub speakers_expected: Option<u32>,
    pub dual_channel: Option<bool>,
    pub poll_interval_secs: Option<u64>,
    pub max_polls: Option<u32>,
}

impl TranscriptionOverrides {
    fn apply(&self, config: &mut TranscriptionConfig) {
        if let Some(v) = &self.language_code {
            config.language_code = v.clone();
        }
        if let Some(v) = self.speakers_expected {
            config.speakers_expected = v;
        }
        if let Some(v) = self.dual_channel {
            config.dual_channel = v;
        }
        if let Some(v) = self.poll_interval_secs {
            config.poll_interval = Duration::from_secs(v);
        }
        if let Some(v) = self.max_polls {
            config.max_polls = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_aliases_case_insensitive() {
        let aliases = SpeakerAliases::default();
        assert_eq!(aliases.resolve("CLIENTE"), Some(Speaker::Customer));
        assert_eq!(aliases.resolve(" Agent "), Some(Speaker::Agent));
        assert_eq!(aliases.resolve("Gestor"), Some(Speaker::Agent));
        assert_eq!(aliases.resolve("narrador"), None);
        assert_eq!(aliases.resolve_or_unknown("narrador"), Speaker::Unknown);
    }

    #[test]
    fn test_file_config_overrides() {
        let file: FileConfig = serde_json::from_str(
            r#"{
                "model": "command-r-plus",
                "prompt_preset": "general",
                "speaker_aliases": {"customer": ["Socio"], "agent": ["Asesor"]},
                "analyzer": {"concurrency": 2, "call_timeout_secs": 5},
                "transcription": {"language_code": "en", "dual_channel": true}
            }"#,
        )
        .unwrap();

        let config = AppConfig::from_file_config(file).unwrap();
        assert_eq!(config.aliases.resolve("socio"), Some(Speaker::Customer));
        assert_eq!(config.aliases.resolve("ASESOR"), Some(Speaker::Agent));
        assert_eq!(config.aliases.resolve("cliente"), Some(Speaker::Customer));
        assert_eq!(config.analyzer.concurrency, 2);
        assert_eq!(config.analyzer.call_timeout, Duration::from_secs(5));
        assert_eq!(config.analyzer.max_attempts, 3);
        assert_eq!(config.transcription.language_code, "en");
        assert!(config.transcription.dual_channel);
        assert_eq!(config.chat.model.as_deref(), Some("command-r-plus"));
        assert!(config.prompt.source().starts_with("Analyze this conversation"));
    }

    #[test]
    fn test_invalid_template_rejected_at_load() {
        let file = FileConfig {
            prompt_template: Some("{speaker}: {mensaje}".to_string()),
            ..Default::default()
        };
        let err = AppConfig::from_file_config(file).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTemplate(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file: FileConfig =
            serde_json::from_str(r#"{"analyzer": {"concurrency": 0}}"#).unwrap();
        assert!(AppConfig::from_file_config(file).is_err());

        let file: FileConfig =
            serde_json::from_str(r#"{"speaker_aliases": {"supervisor": ["jefe"]}}"#).unwrap();
        assert!(AppConfig::from_file_config(file).is_err());

        let file: FileConfig = serde_json::from_str(r#"{"temperature": 3.0}"#).unwrap();
        assert!(AppConfig::from_file_config(file).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_json::from_str::<FileConfig>(r#"{"modle": "x"}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_tokens": 120}}"#).unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.chat.max_tokens, Some(120));

        let missing = AppConfig::load(Some(Path::new("/nonexistent/callsentiment.json")));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
