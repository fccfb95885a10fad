use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SupportError>;

#[derive(Error, Debug)]
pub enum SupportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error("Snapshot not found: {}", .0.display())]
    SnapshotNotFound(PathBuf),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod assistant;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod knowledge;
pub mod remote;
pub mod search;
