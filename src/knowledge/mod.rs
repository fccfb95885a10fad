//! Tabular knowledge base: source rows, stored metadata records and the
//! vector store that pairs them with embeddings.

pub mod store;

use std::collections::HashSet;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Result, SupportError};

pub use store::VectorStore;

const QUESTION_COLUMNS: &[&str] = &["пример вопроса", "вопрос", "question"];
const ANSWER_COLUMNS: &[&str] = &["шаблонный ответ", "ответ", "answer"];
const CATEGORY_COLUMNS: &[&str] = &["основная категория", "категория", "category"];
const SUBCATEGORY_COLUMNS: &[&str] = &["подкатегория", "subcategory"];
const PRIORITY_COLUMNS: &[&str] = &["приоритет", "priority"];
const AUDIENCE_COLUMNS: &[&str] = &["целевая аудитория", "аудитория", "audience"];

/// Level at which a store is embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Full question text plus its labels
    Question,
    /// Category and subcategory labels only
    Category,
}

/// One row of the source table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeRow {
    pub question: Option<String>,
    pub answer: String,
    pub category: String,
    pub subcategory: String,
    pub priority: Option<String>,
    pub audience: Option<String>,
}

impl KnowledgeRow {
    /// Text sent to the embedding service. Labels are appended so that
    /// near-identical questions from different categories stay apart.
    #[inline]
    pub fn embedding_text(&self, granularity: Granularity) -> String {
        match granularity {
            Granularity::Question => format!(
                "Вопрос: {} Категория: {} {}",
                self.question.as_deref().unwrap_or_default(),
                self.category,
                self.subcategory
            ),
            Granularity::Category => {
                format!("Категория: {} {}", self.category, self.subcategory)
            }
        }
    }
}

/// Metadata stored alongside each vector. `id` is the row position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: usize,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

impl KnowledgeRecord {
    #[inline]
    pub fn from_row(id: usize, row: &KnowledgeRow, granularity: Granularity) -> Self {
        let question = match granularity {
            Granularity::Question => row.question.clone(),
            Granularity::Category => None,
        };
        Self {
            id,
            question,
            answer: row.answer.clone(),
            category: row.category.clone(),
            subcategory: row.subcategory.clone(),
            priority: row.priority.clone(),
            audience: row.audience.clone(),
        }
    }
}

#[derive(Debug)]
struct ColumnMap {
    question: Option<usize>,
    answer: Option<usize>,
    category: Option<usize>,
    subcategory: Option<usize>,
    priority: Option<usize>,
    audience: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
            .collect();
        let find = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|alias| normalized.iter().position(|h| h.as_str() == *alias))
        };

        Self {
            question: find(QUESTION_COLUMNS),
            answer: find(ANSWER_COLUMNS),
            category: find(CATEGORY_COLUMNS),
            subcategory: find(SUBCATEGORY_COLUMNS),
            priority: find(PRIORITY_COLUMNS),
            audience: find(AUDIENCE_COLUMNS),
        }
    }

    fn warn_missing(&self, granularity: Granularity) {
        let mut required = vec![("category", self.category), ("subcategory", self.subcategory)];
        if granularity == Granularity::Question {
            required.push(("question", self.question));
            required.push(("answer", self.answer));
        }

        for (name, column) in required {
            if column.is_none() {
                warn!("Knowledge base has no {} column; using empty values", name);
            }
        }
    }
}

fn cell(record: &csv::StringRecord, column: Option<usize>) -> Option<String> {
    column
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Read knowledge base rows from a CSV file with a header line
#[inline]
pub fn read_rows<P: AsRef<Path>>(path: P, granularity: Granularity) -> Result<Vec<KnowledgeRow>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        SupportError::KnowledgeBase(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let rows = parse_rows(file, granularity)?;
    debug!("Read {} knowledge base rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Parse CSV knowledge base rows. Missing columns and short rows give empty values.
#[inline]
pub fn parse_rows<R: io::Read>(reader: R, granularity: Granularity) -> Result<Vec<KnowledgeRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| SupportError::KnowledgeBase(format!("Failed to read CSV header: {}", e)))?
        .clone();
    let columns = ColumnMap::from_headers(&headers);
    columns.warn_missing(granularity);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            SupportError::KnowledgeBase(format!("Malformed CSV record {}: {}", line + 1, e))
        })?;

        rows.push(KnowledgeRow {
            question: cell(&record, columns.question),
            answer: cell(&record, columns.answer).unwrap_or_default(),
            category: cell(&record, columns.category).unwrap_or_default(),
            subcategory: cell(&record, columns.subcategory).unwrap_or_default(),
            priority: cell(&record, columns.priority),
            audience: cell(&record, columns.audience),
        });
    }

    Ok(rows)
}

/// Distinct (category, subcategory) pairs in first-occurrence order
#[inline]
pub fn category_rows(rows: &[KnowledgeRow]) -> Vec<KnowledgeRow> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| seen.insert((row.category.as_str(), row.subcategory.as_str())))
        .map(|row| KnowledgeRow {
            category: row.category.clone(),
            subcategory: row.subcategory.clone(),
            ..KnowledgeRow::default()
        })
        .collect()
}
