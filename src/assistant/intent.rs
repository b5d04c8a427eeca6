use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::prompts;
use super::providers::LlmProvider;

/// The classified purpose of a human utterance.
///
/// Dispatch over this enum is exhaustive; classifier output that names no
/// variant converts to `Unknown` rather than falling through silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BookRecommendation,
    TopBooksGenre,
    TopBooksAuthor,
    AddBook,
    ChatHistoryQuery,
    Greet,
    Unknown,
}

impl Intent {
    /// Map a classifier label onto the enumeration. Out-of-set labels are
    /// not an error — they resolve to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "book_recommendation" => Intent::BookRecommendation,
            "top_books_genre" => Intent::TopBooksGenre,
            "top_books_author" => Intent::TopBooksAuthor,
            "add_book" => Intent::AddBook,
            "chat_history_query" => Intent::ChatHistoryQuery,
            "greet" => Intent::Greet,
            _ => Intent::Unknown,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Intent::BookRecommendation => "book_recommendation",
            Intent::TopBooksGenre => "top_books_genre",
            Intent::TopBooksAuthor => "top_books_author",
            Intent::AddBook => "add_book",
            Intent::ChatHistoryQuery => "chat_history_query",
            Intent::Greet => "greet",
            Intent::Unknown => "unknown",
        }
    }
}

/// Maps the latest human utterance (in isolation, never the transcript) to
/// an intent label via one model call against the fixed instruction prompt.
#[derive(Clone)]
pub struct IntentClassifier {
    provider: Arc<dyn LlmProvider>,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Classify one utterance. Returns the raw label token; callers convert
    /// it with `Intent::from_label` so out-of-set output defaults safely.
    pub async fn classify(&self, utterance: &str) -> anyhow::Result<String> {
        let response = self
            .provider
            .complete(&prompts::intent_prompt(utterance))
            .await?;
        Ok(parse_label(&response))
    }
}

/// Lower-case the raw model response, take its first whitespace-delimited
/// token, and strip surrounding quote characters. Nothing is rejected here.
pub fn parse_label(response: &str) -> String {
    response
        .trim()
        .to_lowercase()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}
