
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::search::SearchParams;
use crate::search::composite::MatchParams;

/// Environment variable that overrides `service.api_token`
pub const API_TOKEN_ENV: &str = "API_TOKEN";

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Remote LLM service shared by the embedding and chat completion endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            host: "llm.t1v.scibox.tech".to_string(),
            port: 443,
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "bge-m3".to_string(),
            batch_size: 10,
            embedding_dimension: 1024,
            timeout_seconds: 10,
            retry_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "Qwen2.5-72B-Instruct-AWQ".to_string(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 512,
            timeout_seconds: 30,
            retry_attempts: 1,
        }
    }
}

/// Which retrieval path grounds a chat reply
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    /// Top-K search over the question store only
    #[default]
    Questions,
    /// Weighted blend of the category store and the question store
    Composite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub strategy: RetrievalStrategy,
    pub top_k: usize,
    pub min_similarity: f32,
    pub top_categories: usize,
    pub top_questions: usize,
    pub min_category_similarity: f32,
    pub category_weight: f32,
    pub question_weight: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let params = MatchParams::default();
        Self {
            strategy: RetrievalStrategy::default(),
            top_k: 3,
            min_similarity: 0.5,
            top_categories: params.top_categories,
            top_questions: params.top_questions,
            min_category_similarity: params.min_category_similarity,
            category_weight: params.category_weight,
            question_weight: params.question_weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub questions_csv: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories_csv: Option<PathBuf>,
    pub question_snapshot: PathBuf,
    pub category_snapshot: PathBuf,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            questions_csv: PathBuf::from("kb.csv"),
            categories_csv: None,
            question_snapshot: PathBuf::from("vector_db.json"),
            category_snapshot: PathBuf::from("category_db.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_length: usize,
    pub directory: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_length: 20,
            directory: PathBuf::from("history"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    pub reply_timeout_seconds: u64,
    pub intent_threshold: f32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            reply_timeout_seconds: 90,
            intent_threshold: 0.7,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid temperature: {0} (must be between 0 and 2)")]
    InvalidTemperature(f32),
    #[error("Invalid top_p: {0} (must be greater than 0 and at most 1)")]
    InvalidTopP(f32),
    #[error("Invalid max tokens: {0} (must be between 1 and 32768)")]
    InvalidMaxTokens(u32),
    #[error("Invalid {name}: {value} (must be at least 1)")]
    InvalidCandidateCount { name: &'static str, value: usize },
    #[error("Invalid {name}: {value} (must be a finite number between -1 and 1)")]
    InvalidThreshold { name: &'static str, value: f32 },
    #[error("Invalid {name}: {value} (must be a finite non-negative number)")]
    InvalidWeight { name: &'static str, value: f32 },
    #[error("Invalid history length: {0} (must be between 1 and 1000)")]
    InvalidHistoryLength(usize),
    #[error("Invalid intent threshold: {0} (must be between 0 and 1)")]
    InvalidIntentThreshold(f32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `~/.smart-support`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".smart-support"))
            .or_else(|| dirs::data_dir().map(|data| data.join("smart-support")))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.service.validate()?;
        self.embedding.validate()?;
        self.generation.validate()?;
        self.retrieval.validate()?;

        if !(1..=1000).contains(&self.history.max_length) {
            return Err(ConfigError::InvalidHistoryLength(self.history.max_length));
        }

        validate_timeout(self.assistant.reply_timeout_seconds)?;

        let threshold = self.assistant.intent_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidIntentThreshold(threshold));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Resolve a configured path against the configuration directory
    #[inline]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.get_base_dir().join(path)
        }
    }

    #[inline]
    pub fn questions_csv_path(&self) -> PathBuf {
        self.resolve_path(&self.knowledge_base.questions_csv)
    }

    #[inline]
    pub fn categories_csv_path(&self) -> Option<PathBuf> {
        self.knowledge_base
            .categories_csv
            .as_deref()
            .map(|path| self.resolve_path(path))
    }

    #[inline]
    pub fn question_snapshot_path(&self) -> PathBuf {
        self.resolve_path(&self.knowledge_base.question_snapshot)
    }

    #[inline]
    pub fn category_snapshot_path(&self) -> PathBuf {
        self.resolve_path(&self.knowledge_base.category_snapshot)
    }

    #[inline]
    pub fn history_dir_path(&self) -> PathBuf {
        self.resolve_path(&self.history.directory)
    }

    #[inline]
    pub fn service_url(&self) -> Result<Url, ConfigError> {
        self.service.service_url()
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.service_url()?;

        Ok(())
    }

    pub fn service_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    /// Token used for Bearer authentication. `API_TOKEN` wins over the file value.
    pub fn api_token(&self) -> Option<String> {
        std::env::var(API_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| {
                self.api_token
                    .clone()
                    .filter(|token| !token.trim().is_empty())
            })
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = ServiceConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_model(&self.model)?;

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        validate_timeout(self.timeout_seconds)?;
        validate_retry_attempts(self.retry_attempts)
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model(&model)?;
        self.model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_model(&self.model)?;

        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if !self.top_p.is_finite() || self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(ConfigError::InvalidTopP(self.top_p));
        }

        if !(1..=32768).contains(&self.max_tokens) {
            return Err(ConfigError::InvalidMaxTokens(self.max_tokens));
        }

        validate_timeout(self.timeout_seconds)?;
        validate_retry_attempts(self.retry_attempts)
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model(&model)?;
        self.model = model;
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("top_k", self.top_k),
            ("top_categories", self.top_categories),
            ("top_questions", self.top_questions),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidCandidateCount { name, value });
            }
        }

        for (name, value) in [
            ("min_similarity", self.min_similarity),
            ("min_category_similarity", self.min_category_similarity),
        ] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        for (name, value) in [
            ("category_weight", self.category_weight),
            ("question_weight", self.question_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }

        Ok(())
    }

    #[inline]
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            top_k: self.top_k,
            min_similarity: self.min_similarity,
        }
    }

    #[inline]
    pub fn match_params(&self) -> MatchParams {
        MatchParams {
            top_categories: self.top_categories,
            top_questions: self.top_questions,
            min_category_similarity: self.min_category_similarity,
            category_weight: self.category_weight,
            question_weight: self.question_weight,
        }
    }
}

/// Masks all but the last four characters of a secret for display
pub fn mask_token(token: &str) -> String {
    let visible: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if token.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("****{}", visible)
    }
}

fn validate_model(model: &str) -> Result<(), ConfigError> {
    if model.trim().is_empty() {
        return Err(ConfigError::InvalidModel(model.to_string()));
    }
    Ok(())
}

fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if !(1..=600).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(seconds));
    }
    Ok(())
}

fn validate_retry_attempts(attempts: u32) -> Result<(), ConfigError> {
    if !(1..=10).contains(&attempts) {
        return Err(ConfigError::InvalidRetryAttempts(attempts));
    }
    Ok(())
}
