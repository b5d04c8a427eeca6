//! One handler per intent. Handlers resolve malformed input and missing
//! entities locally, as corrective assistant text; only external-dependency
//! failures propagate to the orchestrator.

use std::sync::LazyLock;

use regex::Regex;

use super::prompts;
use super::providers::LlmProvider;
use crate::catalog::{Book, Catalog, NewBook};
use crate::retrieval::RetrievalIndex;
use crate::types::{AgentState, Role};

static TOP_GENRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)top (\d+) books in (.+)").expect("top-genre grammar"));

static TOP_AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)top (\d+) books by (.+)").expect("top-author grammar"));

static ADD_BOOK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)add book titled "(.+?)" by (.+?), genre: (.+?), description: (.+?), rating: (\d+(?:\.\d+)?), published in (\d{4})"#,
    )
    .expect("add-book grammar")
});

/// Parsed `top <K> books in <genre>` command.
pub fn parse_top_genre(utterance: &str) -> Option<(usize, String)> {
    let caps = TOP_GENRE_RE.captures(utterance)?;
    let k: usize = caps[1].parse().ok().filter(|k| *k > 0)?;
    Some((k, caps[2].trim().to_string()))
}

/// Parsed `top <K> books by <author>` command.
pub fn parse_top_author(utterance: &str) -> Option<(usize, String)> {
    let caps = TOP_AUTHOR_RE.captures(utterance)?;
    let k: usize = caps[1].parse().ok().filter(|k| *k > 0)?;
    Some((k, caps[2].trim().to_string()))
}

/// The fields of a matched add-book command.
#[derive(Debug, Clone, PartialEq)]
pub struct AddBookCommand {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub rating: f64,
    pub published_year: i32,
}

/// Parse an utterance against the fixed add-book template.
pub fn parse_add_book(utterance: &str) -> Option<AddBookCommand> {
    let caps = ADD_BOOK_RE.captures(utterance)?;
    Some(AddBookCommand {
        title: caps[1].to_string(),
        author: caps[2].trim().to_string(),
        genre: caps[3].trim().to_string(),
        description: caps[4].trim().to_string(),
        rating: caps[5].parse().ok()?,
        published_year: caps[6].parse().ok()?,
    })
}

/// `<index>. "<title>" by <author-name> (Rating: <rating>)`, one per line.
async fn format_book_lines(books: &[Book], catalog: &dyn Catalog) -> String {
    let mut lines = Vec::with_capacity(books.len());
    for (i, book) in books.iter().enumerate() {
        let author = match catalog.get_author(book.author_id).await {
            Ok(author) => author.name,
            Err(_) => "Unknown".to_string(),
        };
        lines.push(format!(
            "{}. \"{}\" by {} (Rating: {})",
            i + 1,
            book.title,
            author,
            book.rating
        ));
    }
    lines.join("\n")
}

/// Similarity search over the utterance, then a grounded model answer.
pub async fn book_recommendation(
    utterance: &str,
    retrieval: &dyn RetrievalIndex,
    provider: &dyn LlmProvider,
) -> anyhow::Result<String> {
    let passages = retrieval.similarity_search(utterance).await?;
    let context = passages.join("\n");
    provider
        .complete(&prompts::main_prompt(&context, utterance))
        .await
}

/// Streaming variant: pushes model tokens straight to the channel.
pub async fn book_recommendation_stream(
    utterance: &str,
    retrieval: &dyn RetrievalIndex,
    provider: &dyn LlmProvider,
    tx: tokio::sync::mpsc::Sender<crate::types::ChatEvent>,
) -> anyhow::Result<()> {
    let passages = retrieval.similarity_search(utterance).await?;
    let context = passages.join("\n");
    provider
        .complete_stream(&prompts::main_prompt(&context, utterance), tx)
        .await
}

pub async fn top_books_genre(utterance: &str, catalog: &dyn Catalog) -> anyhow::Result<String> {
    let Some((k, genre)) = parse_top_genre(utterance) else {
        return Ok(prompts::TOP_BOOKS_FORMAT_MESSAGE.to_string());
    };

    let books = catalog.find_books_by_genre_substring(&genre, k).await?;
    if books.is_empty() {
        return Ok(format!("No books found in the genre '{genre}'."));
    }
    Ok(format_book_lines(&books, catalog).await)
}

pub async fn top_books_author(utterance: &str, catalog: &dyn Catalog) -> anyhow::Result<String> {
    let Some((k, author_name)) = parse_top_author(utterance) else {
        return Ok(prompts::TOP_AUTHOR_FORMAT_MESSAGE.to_string());
    };

    let Some(author) = catalog.find_author_by_name_substring(&author_name).await? else {
        return Ok(format!(
            "Author '{author_name}' does not exist in the database."
        ));
    };

    let books = catalog.find_books_by_author(author.author_id, k).await?;
    if books.is_empty() {
        return Ok(format!("No books found by the author '{}'.", author.name));
    }
    Ok(format_book_lines(&books, catalog).await)
}

/// Insert a book described in natural language. The referenced author must
/// already exist — there is no implicit author creation.
pub async fn add_book(utterance: &str, catalog: &dyn Catalog) -> anyhow::Result<String> {
    let Some(cmd) = parse_add_book(utterance) else {
        return Ok(prompts::ADD_BOOK_FORMAT_MESSAGE.to_string());
    };

    let Some(author) = catalog.find_author_by_name(&cmd.author).await? else {
        return Ok(format!(
            "Author '{}' does not exist in the database. Please add the author first.",
            cmd.author
        ));
    };

    let book = catalog
        .insert_book(NewBook {
            title: cmd.title,
            author_id: author.author_id,
            genre: cmd.genre,
            description: cmd.description,
            rating: cmd.rating,
            published_year: cmd.published_year,
        })
        .await?;

    Ok(format!(
        "Book '{}' by {} added successfully.",
        book.title, author.name
    ))
}

/// Alternating `Human:` / `AI:` lines, oldest first.
pub fn render_transcript(state: &AgentState) -> String {
    state
        .transcript
        .iter()
        .map(|turn| match turn.role {
            Role::Human => format!("Human: {}", turn.content),
            Role::Assistant => format!("AI: {}", turn.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answer a question about the conversation so far: the whole transcript is
/// supplied as context for a free-form model answer. The query is the
/// state's latest human utterance.
pub async fn chat_history_query(
    state: &AgentState,
    provider: &dyn LlmProvider,
) -> anyhow::Result<String> {
    let query = state.latest_utterance().unwrap_or_default();
    let history = render_transcript(state);
    provider
        .complete(&prompts::main_prompt(&format!("History:\n{history}"), query))
        .await
}

pub async fn chat_history_query_stream(
    state: &AgentState,
    provider: &dyn LlmProvider,
    tx: tokio::sync::mpsc::Sender<crate::types::ChatEvent>,
) -> anyhow::Result<()> {
    let query = state.latest_utterance().unwrap_or_default();
    let history = render_transcript(state);
    provider
        .complete_stream(
            &prompts::main_prompt(&format!("History:\n{history}"), query),
            tx,
        )
        .await
}

pub fn greet() -> String {
    prompts::GREETING_MESSAGE.to_string()
}
