use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;

use super::auth::authorize;
use super::server::AppState;
use crate::catalog::{Book, NewBook};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub title: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Book>>, ApiError> {
    Ok(Json(state.catalog.list_books().await?))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Book>, ApiError> {
    Ok(Json(state.catalog.get_book(id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(fields): Json<NewBook>,
) -> Result<Json<Book>, ApiError> {
    let username = authorize(&state.users, &headers).await?;
    let book = state.catalog.insert_book(fields).await?;
    state
        .users
        .record_activity(&username, &format!("added book '{}'", book.title))
        .await;
    Ok(Json(book))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(fields): Json<NewBook>,
) -> Result<Json<Book>, ApiError> {
    let username = authorize(&state.users, &headers).await?;
    let book = state.catalog.update_book(id, fields).await?;
    state
        .users
        .record_activity(&username, &format!("updated book '{}'", book.title))
        .await;
    Ok(Json(book))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let username = authorize(&state.users, &headers).await?;
    state.catalog.delete_book(id).await?;
    state
        .users
        .record_activity(&username, &format!("deleted book {id}"))
        .await;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

pub async fn top(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Book>>, ApiError> {
    Ok(Json(state.catalog.top_books(params.limit).await?))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Book>>, ApiError> {
    Ok(Json(
        state
            .catalog
            .search_books_by_title(&params.title, params.limit)
            .await?,
    ))
}
