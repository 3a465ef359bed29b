use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE_NAME: &str = "quill.json";

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout() -> u64 {
    600
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_synthesis_attempts() -> usize {
    3
}

fn default_min_word_ratio() -> f64 {
    0.9
}

fn default_previous_excerpt_chars() -> usize {
    1500
}

fn default_reference_k() -> usize {
    3
}

fn default_outline_chunk_size() -> u32 {
    20
}

fn default_chunk_chars() -> usize {
    1200
}

fn default_chunk_overlap() -> usize {
    150
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("config file `{0}` already exists")]
    AlreadyExists(PathBuf),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[serde(default)]
    pub interface_format: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Environment variable consulted when `api_key` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            interface_format: String::new(),
            base_url: String::new(),
            api_key: String::new(),
            api_key_env: None,
            model_name: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl LlmConfig {
    /// The key to send, falling back to `api_key_env` when the inline key is
    /// blank. `None` means the backend is called unauthenticated.
    pub fn resolved_api_key(&self) -> Option<String> {
        let inline = self.api_key.trim();
        if !inline.is_empty() {
            return Some(inline.to_string());
        }
        self.api_key_env
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .and_then(|name| env::var(name).ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NovelConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub premise: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub num_chapters: u32,
    #[serde(default)]
    pub word_number: u32,
    /// Manuscript directory.
    #[serde(default)]
    pub filepath: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_synthesis_attempts")]
    pub synthesis_attempts: usize,
    #[serde(default = "default_min_word_ratio")]
    pub min_word_ratio: f64,
    #[serde(default = "default_previous_excerpt_chars")]
    pub previous_excerpt_chars: usize,
    #[serde(default = "default_reference_k")]
    pub reference_k: usize,
    #[serde(default = "default_outline_chunk_size")]
    pub outline_chunk_size: u32,
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            synthesis_attempts: default_synthesis_attempts(),
            min_word_ratio: default_min_word_ratio(),
            previous_excerpt_chars: default_previous_excerpt_chars(),
            reference_k: default_reference_k(),
            outline_chunk_size: default_outline_chunk_size(),
            chunk_chars: default_chunk_chars(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PromptConfig {
    #[serde(default)]
    pub custom_directories: Vec<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RecentUsage {
    #[serde(default)]
    pub last_llm_interface: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub llm_profiles: BTreeMap<String, LlmConfig>,
    #[serde(default)]
    pub novel: NovelConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
    #[serde(default)]
    pub recent: RecentUsage,
}

impl Config {
    pub fn get_llm_profile(&self, name: &str) -> Option<&LlmConfig> {
        self.llm_profiles.get(name)
    }

    pub fn upsert_llm_profile<S: Into<String>>(&mut self, name: S, profile: LlmConfig) {
        self.llm_profiles.insert(name.into(), profile);
    }

    /// A config pointing at a local Ollama server, written by `config init`.
    pub fn starter() -> Self {
        let mut config = Self::default();
        config.upsert_llm_profile(
            "ollama",
            LlmConfig {
                interface_format: "ollama".into(),
                base_url: "http://localhost:11434".into(),
                model_name: "llama3.1".into(),
                ..LlmConfig::default()
            },
        );
        config.upsert_llm_profile(
            "openai",
            LlmConfig {
                interface_format: "openai".into(),
                base_url: "https://api.openai.com/v1".into(),
                api_key_env: Some("OPENAI_API_KEY".into()),
                model_name: "gpt-4o-mini".into(),
                ..LlmConfig::default()
            },
        );
        config.novel = NovelConfig {
            title: "Untitled".into(),
            premise: String::new(),
            genre: String::new(),
            num_chapters: 12,
            word_number: 3000,
            filepath: "manuscript".into(),
        };
        config.recent.last_llm_interface = Some("ollama".into());
        config
    }

    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(input)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, serialized).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// Opens the config at `path`, starting from defaults when it does not
    /// exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = if path.exists() {
            Config::from_path(&path)?
        } else {
            Config::default()
        };
        Ok(Self { path, config })
    }

    /// Writes `config` to `path`, refusing to clobber an existing file unless
    /// `overwrite` is set.
    pub fn create(
        path: impl Into<PathBuf>,
        config: Config,
        overwrite: bool,
    ) -> Result<Self, ConfigError> {
        let path = path.into();
        if path.exists() && !overwrite {
            return Err(ConfigError::AlreadyExists(path));
        }
        let store = Self { path, config };
        store.save()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.config.to_path(&self.path)
    }

    pub fn touch_llm_interface<S: Into<String>>(&mut self, name: S) {
        self.config.recent.last_llm_interface = Some(name.into());
    }

    pub fn last_llm_interface(&self) -> Option<&str> {
        self.config
            .recent
            .last_llm_interface
            .as_deref()
            .filter(|name| self.config.llm_profiles.contains_key(*name))
    }

    /// Points `recent` at an existing profile when the remembered one was
    /// removed from the file by hand.
    pub fn ensure_recent_defaults(&mut self) {
        if self.last_llm_interface().is_none() {
            self.config.recent.last_llm_interface = self.config.llm_profiles.keys().next().cloned();
        }
    }
}
