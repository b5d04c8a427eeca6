use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use bookmind::assistant::ChatEngine;
use bookmind::assistant::prompts;
use bookmind::assistant::providers::LlmProvider;
use bookmind::catalog::{Catalog, MemoryCatalog, NewAuthor, NewBook};
use bookmind::retrieval::CatalogIndex;
use bookmind::store::SessionStore;
use bookmind::types::{ChatEvent, Role};

/// Provider that replays canned responses in order. `<fail>` emits an error
/// event; `<slow>` stalls past any reasonable timeout.
struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete_stream(
        &self,
        _prompt: &str,
        tx: mpsc::Sender<ChatEvent>,
    ) -> anyhow::Result<()> {
        let next = self
            .responses
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| "ok".into());

        if next == "<fail>" {
            let _ = tx.send(ChatEvent::Error("boom".into())).await;
            let _ = tx.send(ChatEvent::Done).await;
            return Ok(());
        }
        if next == "<slow>" {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }

        // Two chunks so streaming consumers see more than one frame.
        let mid = next.len() / 2;
        let (head, tail) = next.split_at(mid);
        if !head.is_empty() {
            let _ = tx.send(ChatEvent::Text(head.to_string())).await;
        }
        let _ = tx.send(ChatEvent::Text(tail.to_string())).await;
        let _ = tx.send(ChatEvent::Done).await;
        Ok(())
    }
}

async fn seeded_catalog() -> Arc<MemoryCatalog> {
    let catalog = Arc::new(MemoryCatalog::new());

    let christie = catalog
        .insert_author(NewAuthor {
            name: "Agatha Christie".into(),
            biography: String::new(),
        })
        .await
        .expect("author");

    for (title, rating) in [
        ("And Then There Were None", 4.5),
        ("Murder on the Orient Express", 4.4),
        ("The ABC Murders", 4.2),
    ] {
        catalog
            .insert_book(NewBook {
                title: title.into(),
                author_id: christie.author_id,
                genre: "Mystery".into(),
                description: format!("{title}, a detective story."),
                rating,
                published_year: 1936,
            })
            .await
            .expect("book");
    }

    catalog
}

fn engine_with(
    provider: Arc<dyn LlmProvider>,
    catalog: Arc<MemoryCatalog>,
    timeout: Duration,
) -> ChatEngine {
    let catalog: Arc<dyn Catalog> = catalog;
    let store = Arc::new(SessionStore::new(200));
    let retrieval = Arc::new(CatalogIndex::new(Arc::clone(&catalog), 4));
    ChatEngine::new(store, catalog, retrieval, provider, timeout)
}

#[tokio::test]
async fn transcripts_alternate_human_and_assistant() {
    let provider = ScriptedProvider::new(&["greet", "greet", "greet"]);
    let engine = engine_with(provider, seeded_catalog().await, Duration::from_secs(5));

    for _ in 0..3 {
        engine.respond("s1", "hello there").await;
    }

    let transcript = engine.store().transcript("s1").await;
    assert_eq!(transcript.len(), 6);
    for (i, turn) in transcript.iter().enumerate() {
        let expected = if i % 2 == 0 { Role::Human } else { Role::Assistant };
        assert_eq!(turn.role, expected, "turn {i}");
    }
}

#[tokio::test]
async fn unknown_intent_short_circuits_without_side_effects() {
    let catalog = seeded_catalog().await;
    let before = catalog.list_books().await.expect("list").len();

    let provider = ScriptedProvider::new(&["unknown"]);
    let engine = engine_with(provider, Arc::clone(&catalog), Duration::from_secs(5));

    let reply = engine.respond("s1", "how do I fix my bicycle").await;
    assert_eq!(reply, prompts::REFUSAL_MESSAGE);
    assert_eq!(catalog.list_books().await.expect("list").len(), before);

    let transcript = engine.store().transcript("s1").await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].content, prompts::REFUSAL_MESSAGE);
}

#[tokio::test]
async fn out_of_set_classifier_label_is_treated_as_unknown() {
    let provider = ScriptedProvider::new(&["recommend_tacos"]);
    let engine = engine_with(provider, seeded_catalog().await, Duration::from_secs(5));

    let reply = engine.respond("s1", "anything").await;
    assert_eq!(reply, prompts::REFUSAL_MESSAGE);
}

#[tokio::test]
async fn repeated_top_query_is_deterministic() {
    let provider = ScriptedProvider::new(&["top_books_genre", "top_books_genre"]);
    let engine = engine_with(provider, seeded_catalog().await, Duration::from_secs(5));

    let first = engine.respond("s1", "top 5 books in mystery").await;
    let second = engine.respond("s1", "top 5 books in mystery").await;

    assert_eq!(first, second);
    assert!(first.starts_with("1. \"And Then There Were None\""));

    // Two full exchanges, distinct transcript positions.
    let transcript = engine.store().transcript("s1").await;
    assert_eq!(transcript.len(), 4);
    assert_eq!(transcript[1].content, transcript[3].content);
}

#[tokio::test]
async fn added_book_shows_up_in_subsequent_top_query() {
    let provider = ScriptedProvider::new(&["add_book", "top_books_genre"]);
    let engine = engine_with(provider, seeded_catalog().await, Duration::from_secs(5));

    let reply = engine
        .respond(
            "s1",
            "add book titled \"Crooked House\" by Agatha Christie, genre: Mystery, \
             description: A twisted family, rating: 4.6, published in 1949",
        )
        .await;
    assert_eq!(reply, "Book 'Crooked House' by Agatha Christie added successfully.");

    let top = engine.respond("s1", "top 1 books in mystery").await;
    assert_eq!(top, "1. \"Crooked House\" by Agatha Christie (Rating: 4.6)");
}

#[tokio::test]
async fn concurrent_sessions_do_not_share_transcripts() {
    let provider = ScriptedProvider::new(&["greet", "greet"]);
    let engine = engine_with(provider, seeded_catalog().await, Duration::from_secs(5));

    let (a, b) = tokio::join!(
        engine.respond("session-a", "hello from a"),
        engine.respond("session-b", "hello from b"),
    );
    assert_eq!(a, prompts::GREETING_MESSAGE);
    assert_eq!(b, prompts::GREETING_MESSAGE);

    let ta = engine.store().transcript("session-a").await;
    let tb = engine.store().transcript("session-b").await;
    assert_eq!(ta.len(), 2);
    assert_eq!(tb.len(), 2);
    assert_eq!(ta[0].content, "hello from a");
    assert_eq!(tb[0].content, "hello from b");
}

#[tokio::test]
async fn streaming_chunks_assemble_into_the_committed_reply() {
    let provider = ScriptedProvider::new(&["book_recommendation", "Try The ABC Murders."]);
    let engine = engine_with(provider, seeded_catalog().await, Duration::from_secs(5));

    let mut rx = engine.respond_stream("s1", "recommend me a detective story");
    let mut chunks = String::new();
    let mut saw_done = false;
    while let Some(event) = rx.recv().await {
        match event {
            ChatEvent::Text(t) => chunks.push_str(&t),
            ChatEvent::Done => {
                saw_done = true;
                break;
            }
            ChatEvent::Error(e) => panic!("unexpected error event: {e}"),
        }
    }

    assert!(saw_done);
    assert_eq!(chunks, "Try The ABC Murders.");

    let transcript = engine.store().transcript("s1").await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].content, "Try The ABC Murders.");
}

#[tokio::test]
async fn streaming_provider_failure_emits_error_and_keeps_transcript_whole() {
    let provider = ScriptedProvider::new(&["book_recommendation", "<fail>"]);
    let engine = engine_with(provider, seeded_catalog().await, Duration::from_secs(5));

    let mut rx = engine.respond_stream("s1", "recommend me something");
    let mut saw_error = false;
    let mut last = None;
    while let Some(event) = rx.recv().await {
        if matches!(event, ChatEvent::Error(_)) {
            saw_error = true;
        }
        last = Some(event);
    }

    assert!(saw_error);
    assert_eq!(last, Some(ChatEvent::Done));

    let transcript = engine.store().transcript("s1").await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].content, prompts::DEGRADED_MESSAGE);
}

#[tokio::test]
async fn classifier_failure_degrades_gracefully() {
    let provider = ScriptedProvider::new(&["<fail>"]);
    let engine = engine_with(provider, seeded_catalog().await, Duration::from_secs(5));

    let reply = engine.respond("s1", "hello").await;
    assert_eq!(reply, prompts::DEGRADED_MESSAGE);

    let transcript = engine.store().transcript("s1").await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].content, "hello");
}

#[tokio::test]
async fn slow_model_call_times_out_into_a_degraded_reply() {
    let provider = ScriptedProvider::new(&["book_recommendation", "<slow>"]);
    let engine = engine_with(provider, seeded_catalog().await, Duration::from_millis(200));

    let reply = engine.respond("s1", "recommend me something").await;
    assert_eq!(reply, prompts::DEGRADED_MESSAGE);
}
