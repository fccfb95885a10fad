
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};

use super::settings::mask_token;
use super::{Config, ConfigError, EmbeddingConfig, GenerationConfig, ServiceConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Smart Support Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("LLM Service").bold().yellow());
    eprintln!("Configure the service providing embeddings and chat completions.");
    eprintln!();

    configure_service(&mut config.service)?;
    eprintln!();
    configure_embedding(&mut config.embedding)?;
    eprintln!();
    configure_generation(&mut config.generation)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_service_connection(&config.service) {
        eprintln!("{}", style("✓ Service connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to the LLM service").yellow()
        );
        eprintln!("You can continue, but the knowledge base cannot be built until it is reachable.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Service:").bold().yellow());
    match config.service_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    match config.service.api_token() {
        Some(token) => eprintln!("  API token: {}", style(mask_token(&token)).cyan()),
        None => eprintln!("  API token: {}", style("not set").red()),
    }

    eprintln!();
    eprintln!("{}", style("Embeddings:").bold().yellow());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    eprintln!(
        "  Timeout: {}s, attempts: {}",
        style(config.embedding.timeout_seconds).cyan(),
        style(config.embedding.retry_attempts).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!("  Model: {}", style(&config.generation.model).cyan());
    eprintln!(
        "  Temperature: {}, top_p: {}, max tokens: {}",
        style(config.generation.temperature).cyan(),
        style(config.generation.top_p).cyan(),
        style(config.generation.max_tokens).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    let retrieval = &config.retrieval;
    eprintln!("  Strategy: {}", style(format!("{:?}", retrieval.strategy)).cyan());
    eprintln!(
        "  Top K: {}, min similarity: {}",
        style(retrieval.top_k).cyan(),
        style(retrieval.min_similarity).cyan()
    );
    eprintln!(
        "  Categories: top {} (min {}), questions: top {}",
        style(retrieval.top_categories).cyan(),
        style(retrieval.min_category_similarity).cyan(),
        style(retrieval.top_questions).cyan()
    );
    eprintln!(
        "  Weights: category {}, question {}",
        style(retrieval.category_weight).cyan(),
        style(retrieval.question_weight).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Knowledge base:").bold().yellow());
    eprintln!(
        "  Questions CSV: {}",
        style(config.questions_csv_path().display()).cyan()
    );
    if let Some(path) = config.categories_csv_path() {
        eprintln!("  Categories CSV: {}", style(path.display()).cyan());
    }
    eprintln!(
        "  Snapshots: {}, {}",
        style(config.question_snapshot_path().display()).cyan(),
        style(config.category_snapshot_path().display()).cyan()
    );

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_service(service: &mut ServiceConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == service.protocol)
        .unwrap_or(1);

    let protocol_index = Select::new()
        .with_prompt("Service protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Service host")
        .default(service.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = ServiceConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..ServiceConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Service port")
        .default(service.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let token: String = Password::new()
        .with_prompt("API token (leave empty to keep current or use $API_TOKEN)")
        .allow_empty_password(true)
        .interact()?;

    service.set_protocol(protocol)?;
    service.set_host(host)?;
    service.set_port(port)?;
    if !token.trim().is_empty() {
        service.api_token = Some(token.trim().to_string());
    }

    Ok(())
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding requests")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.set_model(model)?;
    embedding.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_generation(generation: &mut GenerationConfig) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Chat completion model")
        .default(generation.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    generation.set_model(model)?;

    Ok(())
}

fn test_service_connection(service: &ServiceConfig) -> bool {
    let Ok(base) = service.service_url() else {
        return false;
    };
    let Ok(url) = base.join("/v1/models") else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    // Any HTTP answer, including 401 without a token, means the host is reachable
    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
