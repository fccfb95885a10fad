// Configuration management module
// TOML settings for the remote service, retrieval and chat assistant

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    API_TOKEN_ENV, AssistantConfig, Config, ConfigError, EmbeddingConfig, GenerationConfig,
    HistoryConfig, KnowledgeBaseConfig, RetrievalConfig, RetrievalStrategy, ServiceConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
