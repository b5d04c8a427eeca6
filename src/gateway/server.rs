use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::auth::UserRegistry;
use super::{authors, books, chat, users};
use crate::assistant::ChatEngine;
use crate::assistant::providers;
use crate::catalog::{Catalog, MemoryCatalog};
use crate::config::BookmindConfig;
use crate::retrieval::CatalogIndex;
use crate::store::SessionStore;

pub struct AppState {
    pub engine: ChatEngine,
    pub catalog: Arc<dyn Catalog>,
    pub users: UserRegistry,
}

pub async fn run(config: BookmindConfig) -> anyhow::Result<()> {
    let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::new());
    let retrieval = Arc::new(CatalogIndex::new(
        Arc::clone(&catalog),
        config.retrieval.top_k,
    ));
    let provider: Arc<dyn providers::LlmProvider> =
        providers::from_config(&config.assistant)?.into();
    let store = Arc::new(SessionStore::new(config.session.max_turns));

    let engine = ChatEngine::new(
        store,
        Arc::clone(&catalog),
        retrieval,
        provider,
        Duration::from_secs(config.assistant.request_timeout_secs),
    );

    info!(
        provider = %config.assistant.provider,
        model = %config.assistant.model,
        "assistant configured"
    );

    let state = Arc::new(AppState {
        engine,
        catalog,
        users: UserRegistry::new(),
    });

    let addr = format!("{}:{}", config.gateway.bind, config.gateway.port);

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("bookmind gateway listening on {addr}");
    let is_loopback = config.gateway.bind == "127.0.0.1" || config.gateway.bind == "::1";
    if is_loopback {
        info!("bound to loopback — local access only");
    } else {
        warn!("bound to {addr} — endpoints are network-reachable");
    }

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat::respond))
        .route("/chat/stream", post(chat::respond_stream))
        .route("/books", get(books::list).post(books::create))
        .route("/books/top", get(books::top))
        .route("/books/search", get(books::search))
        .route(
            "/books/{id}",
            get(books::get_one).put(books::update).delete(books::remove),
        )
        .route("/authors", get(authors::list).post(authors::create))
        .route(
            "/authors/{id}",
            get(authors::get_one)
                .put(authors::update)
                .delete(authors::remove),
        )
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/me/activity", get(users::activity))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
