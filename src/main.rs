use clap::{Parser, Subcommand};
use smart_support::commands::{
    RetrievalOverrides, ask, build_knowledge_base, chat, match_knowledge_base,
    search_knowledge_base, show_status,
};
use smart_support::config::{get_config_dir, run_interactive_config, show_config};
use smart_support::{Result, SupportError};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smart-support")]
#[command(about = "Retrieval-augmented support assistant over a question/answer knowledge base")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.smart-support)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the LLM service and models
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Rebuild both vector stores from the knowledge base CSV
    Build,
    /// Search question templates similar to a query
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum cosine similarity of a result
        #[arg(long)]
        min_similarity: Option<f32>,
    },
    /// Find the best category/question pairing for a query
    Match {
        query: String,
        /// Weight of the category score
        #[arg(long)]
        alpha: Option<f32>,
        /// Weight of the question score
        #[arg(long)]
        beta: Option<f32>,
        /// Number of category candidates
        #[arg(long)]
        top_categories: Option<usize>,
        /// Number of question candidates
        #[arg(long)]
        top_questions: Option<usize>,
        /// Minimum similarity of a category candidate
        #[arg(long)]
        min_category_similarity: Option<f32>,
    },
    /// Ask the assistant a single question
    Ask {
        query: String,
        /// Conversation owner
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Chat with the assistant interactively
    Chat {
        /// Conversation owner
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Show knowledge base and service status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| SupportError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Build => {
            build_knowledge_base(&config_dir).await?;
        }
        Commands::Search {
            query,
            top_k,
            min_similarity,
        } => {
            let overrides = RetrievalOverrides {
                top_k,
                min_similarity,
                ..RetrievalOverrides::default()
            };
            search_knowledge_base(&config_dir, &query, overrides).await?;
        }
        Commands::Match {
            query,
            alpha,
            beta,
            top_categories,
            top_questions,
            min_category_similarity,
        } => {
            let overrides = RetrievalOverrides {
                top_categories,
                top_questions,
                min_category_similarity,
                category_weight: alpha,
                question_weight: beta,
                ..RetrievalOverrides::default()
            };
            match_knowledge_base(&config_dir, &query, overrides).await?;
        }
        Commands::Ask { query, user } => {
            ask(&config_dir, &user, &query).await?;
        }
        Commands::Chat { user } => {
            chat(&config_dir, &user).await?;
        }
        Commands::Status => {
            show_status(&config_dir).await?;
        }
    }

    Ok(())
}
