#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::SupportError;
use crate::assistant::{Assistant, ReplyKind, Retriever};
use crate::config::{Config, ConfigError, RetrievalConfig, RetrievalStrategy};
use crate::embeddings::{Embedder, EmbeddingClient};
use crate::generation::ChatClient;
use crate::knowledge::{self, Granularity, KnowledgeRow, VectorStore};
use crate::search::{CompositeMatcher, Searcher};

const EXIT_COMMANDS: &[&str] = &["exit", "quit", "выход"];

/// Both stores of the knowledge base with the embedder they were built with
#[derive(Clone)]
pub struct KnowledgeBase {
    pub questions: Arc<VectorStore>,
    pub categories: Arc<VectorStore>,
    pub embedder: Arc<dyn Embedder>,
}

impl KnowledgeBase {
    #[inline]
    pub fn searcher(&self) -> Searcher {
        Searcher::new(Arc::clone(&self.questions), Arc::clone(&self.embedder))
    }

    #[inline]
    pub fn matcher(&self) -> CompositeMatcher {
        CompositeMatcher::new(
            Arc::clone(&self.categories),
            Arc::clone(&self.questions),
            Arc::clone(&self.embedder),
        )
    }

    /// Retriever for the configured strategy
    #[inline]
    pub fn retriever(&self, config: &Config) -> Retriever {
        match config.retrieval.strategy {
            RetrievalStrategy::Questions => Retriever::Questions {
                searcher: self.searcher(),
                params: config.retrieval.search_params(),
            },
            RetrievalStrategy::Composite => Retriever::Composite {
                matcher: self.matcher(),
                params: config.retrieval.match_params(),
            },
        }
    }
}

/// Source rows for one store.
///
/// Category rows come from `categories_csv` when configured, otherwise they
/// are derived from the question table.
#[inline]
pub fn source_rows(config: &Config, granularity: Granularity) -> crate::Result<Vec<KnowledgeRow>> {
    match (granularity, config.categories_csv_path()) {
        (Granularity::Category, Some(path)) => knowledge::read_rows(path, Granularity::Category),
        (Granularity::Category, None) => {
            let rows = knowledge::read_rows(config.questions_csv_path(), Granularity::Question)?;
            Ok(knowledge::category_rows(&rows))
        }
        (Granularity::Question, _) => {
            knowledge::read_rows(config.questions_csv_path(), Granularity::Question)
        }
    }
}

/// Load both snapshots, building and saving whichever is missing
#[inline]
pub fn open_knowledge_base(
    config: &Config,
    embedder: Arc<dyn Embedder>,
) -> crate::Result<KnowledgeBase> {
    let questions = VectorStore::load_or_build(
        config.question_snapshot_path(),
        Granularity::Question,
        embedder.as_ref(),
        || source_rows(config, Granularity::Question),
    )?;
    let categories = VectorStore::load_or_build(
        config.category_snapshot_path(),
        Granularity::Category,
        embedder.as_ref(),
        || source_rows(config, Granularity::Category),
    )?;

    Ok(KnowledgeBase {
        questions: Arc::new(questions),
        categories: Arc::new(categories),
        embedder,
    })
}

/// Rebuild both stores from source and overwrite their snapshots
#[inline]
pub fn rebuild_knowledge_base(
    config: &Config,
    embedder: Arc<dyn Embedder>,
) -> crate::Result<KnowledgeBase> {
    let questions = VectorStore::rebuild(
        config.question_snapshot_path(),
        Granularity::Question,
        embedder.as_ref(),
        source_rows(config, Granularity::Question)?,
    )?;
    let categories = VectorStore::rebuild(
        config.category_snapshot_path(),
        Granularity::Category,
        embedder.as_ref(),
        source_rows(config, Granularity::Category)?,
    )?;

    Ok(KnowledgeBase {
        questions: Arc::new(questions),
        categories: Arc::new(categories),
        embedder,
    })
}

fn embedder_for(config: &Config) -> Result<Arc<dyn Embedder>> {
    let client = EmbeddingClient::new(config).context("Failed to create embedding client")?;
    Ok(Arc::new(client))
}

async fn load_knowledge_base(config: &Config) -> Result<KnowledgeBase> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || -> Result<KnowledgeBase> {
        let embedder = embedder_for(&config)?;
        Ok(open_knowledge_base(&config, embedder)?)
    })
    .await
    .context("Knowledge base loading task failed")?
}

/// Force a rebuild of both stores
#[inline]
pub async fn build_knowledge_base(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;
    info!(
        "Rebuilding knowledge base from {}",
        config.questions_csv_path().display()
    );

    let kb = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || -> Result<KnowledgeBase> {
            let embedder = embedder_for(&config)?;
            Ok(rebuild_knowledge_base(&config, embedder)?)
        })
        .await
        .context("Knowledge base build task failed")??
    };

    println!("Knowledge base rebuilt:");
    print_store_summary("Questions", &config.question_snapshot_path(), &kb.questions);
    print_store_summary("Categories", &config.category_snapshot_path(), &kb.categories);
    Ok(())
}

fn print_store_summary(label: &str, path: &Path, store: &VectorStore) {
    println!("  {}: {} records -> {}", label, store.len(), path.display());
    let missing = store.len() - store.available_count();
    if missing > 0 {
        println!("    ⚠️  {} records have no embedding", missing);
    }
}

/// Command-line overrides of the configured retrieval parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalOverrides {
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
    pub top_categories: Option<usize>,
    pub top_questions: Option<usize>,
    pub min_category_similarity: Option<f32>,
    pub category_weight: Option<f32>,
    pub question_weight: Option<f32>,
}

impl RetrievalOverrides {
    /// `retrieval` with the overrides applied, checked like a loaded config
    #[inline]
    pub fn apply(self, retrieval: &RetrievalConfig) -> Result<RetrievalConfig, ConfigError> {
        let merged = RetrievalConfig {
            strategy: retrieval.strategy,
            top_k: self.top_k.unwrap_or(retrieval.top_k),
            min_similarity: self.min_similarity.unwrap_or(retrieval.min_similarity),
            top_categories: self.top_categories.unwrap_or(retrieval.top_categories),
            top_questions: self.top_questions.unwrap_or(retrieval.top_questions),
            min_category_similarity: self
                .min_category_similarity
                .unwrap_or(retrieval.min_category_similarity),
            category_weight: self.category_weight.unwrap_or(retrieval.category_weight),
            question_weight: self.question_weight.unwrap_or(retrieval.question_weight),
        };
        merged.validate()?;
        Ok(merged)
    }
}

fn non_empty_query(query: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SupportError::EmptyQuery.into());
    }
    Ok(query.to_string())
}

/// Print the best question templates for `query`
#[inline]
pub async fn search_knowledge_base(
    config_dir: &Path,
    query: &str,
    overrides: RetrievalOverrides,
) -> Result<()> {
    let query = non_empty_query(query)?;
    let config = Config::load(config_dir)?;
    let params = overrides.apply(&config.retrieval)?.search_params();
    let kb = load_knowledge_base(&config).await?;

    let searcher = kb.searcher();
    let results = tokio::task::spawn_blocking(move || searcher.search_with(&query, params))
        .await
        .context("Search task failed")?;

    if results.is_empty() {
        println!("No results above similarity {}", params.min_similarity);
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} / {}",
            rank + 1,
            result.similarity_score,
            result.metadata.category,
            result.metadata.subcategory
        );
        if let Some(question) = &result.metadata.question {
            println!("   Вопрос: {}", question);
        }
        println!("   Ответ: {}", result.metadata.answer);
    }
    Ok(())
}

/// Print the best category/question pairing for `query`
#[inline]
pub async fn match_knowledge_base(
    config_dir: &Path,
    query: &str,
    overrides: RetrievalOverrides,
) -> Result<()> {
    let query = non_empty_query(query)?;
    let config = Config::load(config_dir)?;
    let params = overrides.apply(&config.retrieval)?.match_params();
    let kb = load_knowledge_base(&config).await?;

    let matcher = kb.matcher();
    let found = tokio::task::spawn_blocking(move || matcher.match_query(&query, &params))
        .await
        .context("Match task failed")?;

    match found {
        Some(found) => {
            println!(
                "[{:.4}] {} / {}",
                found.combined_score, found.category, found.subcategory
            );
            println!(
                "   category {:.4} × {} + question {:.4} × {}",
                found.category_score,
                params.category_weight,
                found.question_score,
                params.question_weight
            );
            if let Some(question) = &found.question {
                println!("   Вопрос: {}", question);
            }
            println!("   Ответ: {}", found.answer);
        }
        None => println!("No match"),
    }
    Ok(())
}

async fn assistant_for(config: &Config) -> Result<Assistant> {
    let kb = load_knowledge_base(config).await?;
    let generator = ChatClient::new(config).context("Failed to create chat client")?;
    Ok(Assistant::from_config(
        config,
        kb.retriever(config),
        Arc::new(generator),
    ))
}

/// Answer a single message
#[inline]
pub async fn ask(config_dir: &Path, user_id: &str, query: &str) -> Result<()> {
    let config = Config::load(config_dir)?;
    let assistant = assistant_for(&config).await?;

    let reply = assistant.reply(user_id, query).await?;
    println!("{}", reply.text);
    Ok(())
}

/// Interactive conversation on stdin until EOF or an exit command
#[inline]
pub async fn chat(config_dir: &Path, user_id: &str) -> Result<()> {
    let config = Config::load(config_dir)?;
    let assistant = assistant_for(&config).await?;

    println!("Чат с ассистентом поддержки. Для выхода введите «выход».");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&line.to_lowercase().as_str()) {
            break;
        }

        match assistant.reply(user_id, line).await {
            Ok(reply) => {
                if reply.kind == ReplyKind::Escalation {
                    warn!("Conversation with {} escalated to an administrator", user_id);
                }
                println!("{}", reply.text);
            }
            Err(e) => println!("⚠️  {}", e),
        }
    }

    Ok(())
}

/// Print configuration, snapshot and service status
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).unwrap_or_else(|e| {
        warn!("Using default configuration: {:#}", e);
        Config::default()
    });

    println!("📊 Smart Support Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("📁 Knowledge Base:");
    let csv = config.questions_csv_path();
    if csv.exists() {
        println!("   ✅ Source: {}", csv.display());
    } else {
        println!("   ❌ Source: {} (missing)", csv.display());
    }
    if let Some(categories) = config.categories_csv_path() {
        println!("   📄 Categories source: {}", categories.display());
    }
    print_snapshot_status("Question store", &config.question_snapshot_path());
    print_snapshot_status("Category store", &config.category_snapshot_path());

    println!();
    println!("🤖 Service Status ({}):", config.service.host);
    let health = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            let embedding = EmbeddingClient::new(&config).and_then(|c| c.health_check());
            let generation = ChatClient::new(&config).and_then(|c| c.health_check());
            (embedding, generation)
        })
        .await
        .context("Health check task failed")?
    };

    match health.0 {
        Ok(()) => println!("   ✅ Embeddings: {}", config.embedding.model),
        Err(e) => println!("   ❌ Embeddings: {} - {:#}", config.embedding.model, e),
    }
    match health.1 {
        Ok(()) => println!("   ✅ Generation: {}", config.generation.model),
        Err(e) => println!("   ❌ Generation: {} - {:#}", config.generation.model, e),
    }

    println!();
    println!("⚙️  Retrieval: {:?}", config.retrieval.strategy);
    Ok(())
}

fn print_snapshot_status(label: &str, path: &Path) {
    match VectorStore::load(path) {
        Ok(store) => {
            println!(
                "   ✅ {}: {} records, {} embedded, dimension {}",
                label,
                store.len(),
                store.available_count(),
                store
                    .dimension()
                    .map_or_else(|| "unknown".to_string(), |d| d.to_string())
            );
        }
        Err(crate::SupportError::SnapshotNotFound(_)) => {
            println!("   💤 {}: not built yet ({})", label, path.display());
        }
        Err(e) => println!("   ❌ {}: {}", label, e),
    }
}
