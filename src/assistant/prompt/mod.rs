
use crate::generation::ChatMessage;
use crate::search::{CompositeMatch, SimilarityResult};

pub const SYSTEM_PROMPT: &str = "Ты ассистент службы поддержки банка. \
Отвечай вежливо, кратко и по сути, используя только данные из контекста.";

/// A retrieved question/answer template fed to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub question: String,
    pub answer: String,
}

impl From<&SimilarityResult> for ContextEntry {
    #[inline]
    fn from(result: &SimilarityResult) -> Self {
        Self {
            question: result.metadata.question.clone().unwrap_or_default(),
            answer: result.metadata.answer.clone(),
        }
    }
}

impl From<&CompositeMatch> for ContextEntry {
    #[inline]
    fn from(found: &CompositeMatch) -> Self {
        Self {
            question: found.question.clone().unwrap_or_default(),
            answer: found.answer.clone(),
        }
    }
}

/// Render entries as `Вопрос:`/`Ответ:` blocks separated by a blank line
#[inline]
pub fn build_context(entries: &[ContextEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("Вопрос: {}\nОтвет: {}", entry.question, entry.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System prompt, then prior turns, then the query with its context
#[inline]
pub fn build_messages(history: &[ChatMessage], context: &str, query: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(format!(
        "data:\n{}\n\nВопрос клиента: {}",
        context, query
    )));
    messages
}
