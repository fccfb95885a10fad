#[cfg(test)]
mod tests;

use std::fmt;

/// What the client wants from a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Greeting,
    Recommendation,
    Escalation,
}

impl Intent {
    /// Russian label used in logs and by classifiers
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::Greeting => "приветствие",
            Self::Recommendation => "рекомендация",
            Self::Escalation => "вызов администратора",
        }
    }

    #[inline]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "приветствие" => Some(Self::Greeting),
            "рекомендация" => Some(Self::Recommendation),
            "вызов администратора" => Some(Self::Escalation),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Top label of a classifier with its confidence in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentScore {
    pub intent: Intent,
    pub score: f32,
}

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> IntentScore;
}

/// Accept the classifier's label only when it is confident enough
#[inline]
pub fn resolve(score: IntentScore, threshold: f32) -> Intent {
    if score.score >= threshold {
        score.intent
    } else {
        Intent::Recommendation
    }
}

const GREETINGS: &[&str] = &[
    "привет",
    "здравствуйте",
    "здравствуй",
    "добрый день",
    "добрый вечер",
    "доброе утро",
    "приветствую",
    "hello",
    "hi",
];

const ESCALATIONS: &[&str] = &[
    "администратор",
    "оператор",
    "менеджер",
    "живой человек",
    "живого человека",
    "сотрудник",
    "позовите",
    "соедините",
];

/// Words that may accompany a greeting without turning it into a request
const GREETING_FILLERS: &[&str] = &[
    "бот",
    "всем",
    "вам",
    "ассистент",
    "помощник",
    "снова",
    "ещё",
    "еще",
    "и",
    "bot",
    "there",
    "all",
    "everyone",
    "again",
];

/// Shorter keywords must match a whole word
const MIN_STEM_CHARS: usize = 5;

fn word_matches(word: &str, keyword: &str) -> bool {
    word == keyword || (keyword.chars().count() >= MIN_STEM_CHARS && word.starts_with(keyword))
}

/// Number of words a keyword from `keywords` covers at the start of `words`
fn phrase_at(words: &[&str], keywords: &[&str]) -> Option<usize> {
    keywords.iter().find_map(|keyword| {
        let parts: Vec<&str> = keyword.split(' ').collect();
        let matched = parts.len() <= words.len()
            && parts
                .iter()
                .zip(words)
                .all(|(part, word)| word_matches(word, part));
        matched.then_some(parts.len())
    })
}

fn contains_any(words: &[&str], keywords: &[&str]) -> bool {
    (0..words.len()).any(|start| phrase_at(&words[start..], keywords).is_some())
}

/// Every word belongs to a greeting or is a filler around one
fn is_bare_greeting(words: &[&str]) -> bool {
    let mut rest = words;
    while !rest.is_empty() {
        let step = phrase_at(rest, GREETINGS).or_else(|| {
            GREETING_FILLERS
                .iter()
                .any(|filler| rest[0] == *filler)
                .then_some(1)
        });
        match step {
            Some(step) => rest = &rest[step..],
            None => return false,
        }
    }
    true
}

/// Keyword-based classifier.
///
/// Escalation words win outright. A greeting is confident only when the
/// message holds nothing else; a greeting followed by a question or any other
/// request scores low and falls through to recommendation.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordIntentClassifier;

impl IntentClassifier for KeywordIntentClassifier {
    #[inline]
    fn classify(&self, text: &str) -> IntentScore {
        let normalized: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let words: Vec<&str> = normalized.split_whitespace().collect();

        if contains_any(&words, ESCALATIONS) {
            return IntentScore {
                intent: Intent::Escalation,
                score: 0.9,
            };
        }

        if contains_any(&words, GREETINGS) {
            let score = if !text.contains('?') && is_bare_greeting(&words) {
                0.9
            } else {
                0.4
            };
            return IntentScore {
                intent: Intent::Greeting,
                score,
            };
        }

        IntentScore {
            intent: Intent::Recommendation,
            score: 1.0,
        }
    }
}
