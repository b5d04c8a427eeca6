//! The dialogue orchestrator: classify the latest utterance, dispatch to the
//! matching handler, commit exactly one assistant turn per human turn.

pub mod handlers;
pub mod intent;
pub mod prompts;
pub mod providers;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::AssistantError;
use crate::retrieval::RetrievalIndex;
use crate::store::SessionStore;
use crate::types::{AgentState, ChatEvent, Turn};
use intent::{Intent, IntentClassifier};
use providers::LlmProvider;

/// Sequences one turn: append human utterance → classify → dispatch →
/// append assistant reply. Single-shot and streaming modes share the
/// pipeline; a per-session lock serializes same-session turns.
#[derive(Clone)]
pub struct ChatEngine {
    store: Arc<SessionStore>,
    catalog: Arc<dyn Catalog>,
    retrieval: Arc<dyn RetrievalIndex>,
    provider: Arc<dyn LlmProvider>,
    classifier: IntentClassifier,
    call_timeout: Duration,
}

impl ChatEngine {
    pub fn new(
        store: Arc<SessionStore>,
        catalog: Arc<dyn Catalog>,
        retrieval: Arc<dyn RetrievalIndex>,
        provider: Arc<dyn LlmProvider>,
        call_timeout: Duration,
    ) -> Self {
        let classifier = IntentClassifier::new(Arc::clone(&provider));
        Self {
            store,
            catalog,
            retrieval,
            provider,
            classifier,
            call_timeout,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Run the full pipeline synchronously and return the complete reply.
    /// External failures surface as a generic notice, never an error.
    pub async fn respond(&self, session_id: &str, utterance: &str) -> String {
        let lock = self.store.lock(session_id).await;
        let _guard = lock.lock().await;

        let (intent, state) = match self.classify_turn(session_id, utterance).await {
            Ok(pair) => pair,
            Err(e) => return self.commit_degraded(session_id, &e).await,
        };

        if intent == Intent::Unknown {
            return self.commit(session_id, prompts::REFUSAL_MESSAGE).await;
        }

        let handled = timeout(
            self.call_timeout,
            self.dispatch(intent, &state, utterance),
        )
        .await;

        match handled {
            Ok(Ok(reply)) => self.commit(session_id, &reply).await,
            Ok(Err(e)) => {
                self.commit_degraded(
                    session_id,
                    &AssistantError::Dependency(e.to_string()),
                )
                .await
            }
            Err(_) => {
                self.commit_degraded(
                    session_id,
                    &AssistantError::Timeout(
                        intent.as_label(),
                        self.call_timeout.as_secs(),
                    ),
                )
                .await
            }
        }
    }

    /// Run the pipeline with incremental output. Model-backed handlers yield
    /// tokens as they arrive; deterministic handlers yield one chunk. The
    /// stream always ends with `Done` (an `Error` event precedes it on
    /// failure). Abandoning the receiver is not an error: the turn still
    /// commits whole at completion — never partially.
    pub fn respond_stream(&self, session_id: &str, utterance: &str) -> mpsc::Receiver<ChatEvent> {
        let (tx, rx) = mpsc::channel::<ChatEvent>(32);
        let engine = self.clone();
        let session_id = session_id.to_string();
        let utterance = utterance.to_string();

        tokio::spawn(async move {
            engine.run_stream(&session_id, &utterance, tx).await;
        });

        rx
    }

    async fn run_stream(&self, session_id: &str, utterance: &str, tx: mpsc::Sender<ChatEvent>) {
        let lock = self.store.lock(session_id).await;
        let _guard = lock.lock().await;

        let (intent, state) = match self.classify_turn(session_id, utterance).await {
            Ok(pair) => pair,
            Err(e) => {
                let reply = self.commit_degraded(session_id, &e).await;
                let _ = tx.send(ChatEvent::Error(reply)).await;
                let _ = tx.send(ChatEvent::Done).await;
                return;
            }
        };

        match intent {
            Intent::Unknown => {
                let reply = self.commit(session_id, prompts::REFUSAL_MESSAGE).await;
                let _ = tx.send(ChatEvent::Text(reply)).await;
                let _ = tx.send(ChatEvent::Done).await;
            }

            // Model-backed handlers stream token by token.
            Intent::BookRecommendation | Intent::ChatHistoryQuery => {
                let (inner_tx, mut inner_rx) = mpsc::channel::<ChatEvent>(32);

                // Run the handler on its own task so the provider's events
                // drain while it produces them.
                let retrieval = Arc::clone(&self.retrieval);
                let provider = Arc::clone(&self.provider);
                let call_timeout = self.call_timeout;
                let state = state.clone();
                let handler_utterance = utterance.to_string();
                let handle = tokio::spawn(timeout(call_timeout, async move {
                    match intent {
                        Intent::BookRecommendation => {
                            handlers::book_recommendation_stream(
                                &handler_utterance,
                                retrieval.as_ref(),
                                provider.as_ref(),
                                inner_tx,
                            )
                            .await
                        }
                        _ => {
                            handlers::chat_history_query_stream(
                                &state,
                                provider.as_ref(),
                                inner_tx,
                            )
                            .await
                        }
                    }
                }));

                // Forward chunks to the consumer while collecting the full
                // reply. The assistant turn is committed only once the
                // stream finishes cleanly.
                let mut assistant_text = String::new();
                let mut failure: Option<String> = None;

                while let Some(event) = inner_rx.recv().await {
                    match event {
                        ChatEvent::Text(chunk) => {
                            assistant_text.push_str(&chunk);
                            // Consumer may have gone away; keep draining.
                            let _ = tx.send(ChatEvent::Text(chunk)).await;
                        }
                        ChatEvent::Error(e) => failure = Some(e),
                        ChatEvent::Done => break,
                    }
                }

                let result = match handle.await {
                    Ok(r) => r,
                    Err(e) => Ok(Err(anyhow::anyhow!("handler task failed: {e}"))),
                };

                match result {
                    Err(_) => {
                        let reply = self
                            .commit_degraded(
                                session_id,
                                &AssistantError::Timeout(
                                    intent.as_label(),
                                    self.call_timeout.as_secs(),
                                ),
                            )
                            .await;
                        let _ = tx.send(ChatEvent::Error(reply)).await;
                    }
                    Ok(Err(e)) => {
                        let reply = self
                            .commit_degraded(
                                session_id,
                                &AssistantError::Dependency(e.to_string()),
                            )
                            .await;
                        let _ = tx.send(ChatEvent::Error(reply)).await;
                    }
                    Ok(Ok(())) => {
                        if let Some(e) = failure {
                            let reply = self
                                .commit_degraded(session_id, &AssistantError::Provider(e))
                                .await;
                            let _ = tx.send(ChatEvent::Error(reply)).await;
                        } else {
                            self.commit(session_id, &assistant_text).await;
                        }
                    }
                }

                let _ = tx.send(ChatEvent::Done).await;
            }

            // Deterministic handlers produce the full reply, sent as one chunk.
            _ => {
                let handled =
                    timeout(self.call_timeout, self.dispatch(intent, &state, utterance)).await;

                match handled {
                    Ok(Ok(reply)) => {
                        let reply = self.commit(session_id, &reply).await;
                        let _ = tx.send(ChatEvent::Text(reply)).await;
                    }
                    Ok(Err(e)) => {
                        let reply = self
                            .commit_degraded(
                                session_id,
                                &AssistantError::Dependency(e.to_string()),
                            )
                            .await;
                        let _ = tx.send(ChatEvent::Error(reply)).await;
                    }
                    Err(_) => {
                        let reply = self
                            .commit_degraded(
                                session_id,
                                &AssistantError::Timeout(
                                    intent.as_label(),
                                    self.call_timeout.as_secs(),
                                ),
                            )
                            .await;
                        let _ = tx.send(ChatEvent::Error(reply)).await;
                    }
                }

                let _ = tx.send(ChatEvent::Done).await;
            }
        }
    }

    /// Append the human turn, classify it, and record the resolved intent.
    /// Caller must hold the session lock.
    async fn classify_turn(
        &self,
        session_id: &str,
        utterance: &str,
    ) -> Result<(Intent, AgentState), AssistantError> {
        self.store.append(session_id, Turn::human(utterance)).await;

        let label = timeout(self.call_timeout, self.classifier.classify(utterance))
            .await
            .map_err(|_| {
                AssistantError::Timeout("classifier", self.call_timeout.as_secs())
            })?
            .map_err(|e| AssistantError::Provider(e.to_string()))?;

        let intent = Intent::from_label(&label);
        if intent == Intent::Unknown && label != "unknown" {
            warn!(label = %label, "classifier returned out-of-set label, treating as unknown");
        }

        self.store.set_last_intent(session_id, intent).await;
        info!(session = %session_id, intent = intent.as_label(), "turn classified");

        let transcript = self.store.transcript(session_id).await;
        let mut state = AgentState::new(session_id, transcript);
        state.intent = Some(intent);
        Ok((intent, state))
    }

    async fn dispatch(
        &self,
        intent: Intent,
        state: &AgentState,
        utterance: &str,
    ) -> anyhow::Result<String> {
        match intent {
            Intent::BookRecommendation => {
                handlers::book_recommendation(
                    utterance,
                    self.retrieval.as_ref(),
                    self.provider.as_ref(),
                )
                .await
            }
            Intent::TopBooksGenre => {
                handlers::top_books_genre(utterance, self.catalog.as_ref()).await
            }
            Intent::TopBooksAuthor => {
                handlers::top_books_author(utterance, self.catalog.as_ref()).await
            }
            Intent::AddBook => handlers::add_book(utterance, self.catalog.as_ref()).await,
            Intent::ChatHistoryQuery => {
                handlers::chat_history_query(state, self.provider.as_ref()).await
            }
            Intent::Greet => Ok(handlers::greet()),
            Intent::Unknown => Ok(prompts::REFUSAL_MESSAGE.to_string()),
        }
    }

    /// Append the assistant turn. Caller must hold the session lock.
    async fn commit(&self, session_id: &str, reply: &str) -> String {
        self.store
            .append(session_id, Turn::assistant(reply))
            .await;
        reply.to_string()
    }

    async fn commit_degraded(&self, session_id: &str, error: &AssistantError) -> String {
        warn!(session = %session_id, error = %error, "turn degraded");
        self.commit(session_id, prompts::DEGRADED_MESSAGE).await
    }
}
