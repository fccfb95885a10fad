// Assistant module
// Turns a client message into a reply: intent, retrieval, generation, history

pub mod history;
pub mod intent;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::generation::{Generator, Role};
use crate::search::{CompositeMatcher, MatchParams, SearchParams, Searcher};
use crate::{Result, SupportError};

pub use history::{ChatHistory, HistoryRegistry};
pub use intent::{Intent, IntentClassifier, IntentScore, KeywordIntentClassifier};
pub use prompt::{ContextEntry, build_context, build_messages};

pub const GREETING_REPLY: &str = "Здравствуйте! Чем могу помочь?";
pub const ESCALATION_REPLY: &str = "Администратор уведомлён и скоро подключится.";
pub const NO_MATCH_REPLY: &str = "Не найдено релевантных ответов.";
pub const FAILURE_REPLY: &str = "Извините, произошла ошибка. Попробуйте позже.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Greeting,
    Escalation,
    /// Generated from retrieved templates
    Answer,
    /// Nothing in the knowledge base was close enough
    NoMatch,
    /// Generation failed or ran out of time
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub kind: ReplyKind,
}

impl Reply {
    fn new(text: impl Into<String>, kind: ReplyKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Where the context for an answer comes from
#[derive(Clone)]
pub enum Retriever {
    /// Top-k question templates
    Questions {
        searcher: Searcher,
        params: SearchParams,
    },
    /// The single best category/question pairing
    Composite {
        matcher: CompositeMatcher,
        params: MatchParams,
    },
}

impl Retriever {
    /// Context entries for `query`; empty when nothing matched
    #[inline]
    pub fn retrieve(&self, query: &str) -> Vec<ContextEntry> {
        match self {
            Self::Questions { searcher, params } => searcher
                .search_with(query, *params)
                .iter()
                .map(ContextEntry::from)
                .collect(),
            Self::Composite { matcher, params } => matcher
                .match_query(query, params)
                .map(|found| vec![ContextEntry::from(&found)])
                .unwrap_or_default(),
        }
    }
}

enum Outcome {
    NoMatch,
    Generated(Result<String>),
}

pub struct Assistant {
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
    classifier: Arc<dyn IntentClassifier>,
    histories: HistoryRegistry,
    intent_threshold: f32,
    reply_timeout: Duration,
}

impl Assistant {
    #[inline]
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, histories: HistoryRegistry) -> Self {
        Self {
            retriever: Arc::new(retriever),
            generator,
            classifier: Arc::new(KeywordIntentClassifier),
            histories,
            intent_threshold: 0.7,
            reply_timeout: Duration::from_secs(90),
        }
    }

    /// Assistant with history location, intent threshold and deadline from `config`
    #[inline]
    pub fn from_config(config: &Config, retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        let histories = HistoryRegistry::new(config.history_dir_path(), config.history.max_length);
        Self::new(retriever, generator, histories)
            .with_intent_threshold(config.assistant.intent_threshold)
            .with_reply_timeout(Duration::from_secs(config.assistant.reply_timeout_seconds))
    }

    #[inline]
    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    #[inline]
    pub fn with_intent_threshold(mut self, threshold: f32) -> Self {
        self.intent_threshold = threshold;
        self
    }

    #[inline]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    #[inline]
    pub fn histories(&self) -> &HistoryRegistry {
        &self.histories
    }

    /// Answer one message from `user_id`.
    ///
    /// Messages from the same user are handled one at a time. Generation
    /// failures and timeouts become [`FAILURE_REPLY`]; only an empty query is
    /// an error.
    #[inline]
    pub async fn reply(&self, user_id: &str, query: &str) -> Result<Reply> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SupportError::EmptyQuery);
        }

        let history = self.histories.get(user_id);
        let mut history = history.lock().await;

        let score = self.classifier.classify(query);
        let intent = intent::resolve(score, self.intent_threshold);
        debug!(
            "Intent for {}: {} (classifier said {} with {:.2})",
            user_id, intent, score.intent, score.score
        );

        let reply = match intent {
            Intent::Greeting => Reply::new(GREETING_REPLY, ReplyKind::Greeting),
            Intent::Escalation => {
                warn!("Administrator requested by {}: {}", user_id, query);
                Reply::new(ESCALATION_REPLY, ReplyKind::Escalation)
            }
            Intent::Recommendation => self.answer(user_id, query, &history).await,
        };

        if reply.kind != ReplyKind::Failure {
            history.push(Role::User, query);
            history.push(Role::Assistant, reply.text.clone());
            if let Err(e) = history.save() {
                warn!("Failed to save chat history for {}: {}", user_id, e);
            }
        }

        Ok(reply)
    }

    async fn answer(&self, user_id: &str, query: &str, history: &ChatHistory) -> Reply {
        let retriever = Arc::clone(&self.retriever);
        let generator = Arc::clone(&self.generator);
        let prior = history.messages();
        let query = query.to_string();

        let task = tokio::task::spawn_blocking(move || {
            let entries = retriever.retrieve(&query);
            if entries.is_empty() {
                return Outcome::NoMatch;
            }
            let context = build_context(&entries);
            let messages = build_messages(&prior, &context, &query);
            Outcome::Generated(generator.generate(&messages))
        });

        match tokio::time::timeout(self.reply_timeout, task).await {
            Ok(Ok(Outcome::NoMatch)) => {
                info!("No knowledge base match for {}", user_id);
                Reply::new(NO_MATCH_REPLY, ReplyKind::NoMatch)
            }
            Ok(Ok(Outcome::Generated(Ok(text)))) => Reply::new(text, ReplyKind::Answer),
            Ok(Ok(Outcome::Generated(Err(e)))) => {
                error!("Generation failed for {}: {}", user_id, e);
                Reply::new(FAILURE_REPLY, ReplyKind::Failure)
            }
            Ok(Err(e)) => {
                error!("Reply task for {} failed: {}", user_id, e);
                Reply::new(FAILURE_REPLY, ReplyKind::Failure)
            }
            Err(_) => {
                error!(
                    "Reply for {} timed out after {:?}",
                    user_id, self.reply_timeout
                );
                Reply::new(FAILURE_REPLY, ReplyKind::Failure)
            }
        }
    }

    /// Forget the conversation of `user_id`
    #[inline]
    pub async fn clear_history(&self, user_id: &str) -> Result<()> {
        let history = self.histories.get(user_id);
        let mut history = history.lock().await;
        history.clear()
    }
}
