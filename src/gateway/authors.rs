use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;

use super::auth::authorize;
use super::server::AppState;
use crate::catalog::{Author, NewAuthor};
use crate::error::ApiError;

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Author>>, ApiError> {
    Ok(Json(state.catalog.list_authors().await?))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Author>, ApiError> {
    Ok(Json(state.catalog.get_author(id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(fields): Json<NewAuthor>,
) -> Result<Json<Author>, ApiError> {
    let username = authorize(&state.users, &headers).await?;
    let author = state.catalog.insert_author(fields).await?;
    state
        .users
        .record_activity(&username, &format!("added author '{}'", author.name))
        .await;
    Ok(Json(author))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(fields): Json<NewAuthor>,
) -> Result<Json<Author>, ApiError> {
    let username = authorize(&state.users, &headers).await?;
    let author = state.catalog.update_author(id, fields).await?;
    state
        .users
        .record_activity(&username, &format!("updated author '{}'", author.name))
        .await;
    Ok(Json(author))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let username = authorize(&state.users, &headers).await?;
    state.catalog.delete_author(id).await?;
    state
        .users
        .record_activity(&username, &format!("deleted author {id}"))
        .await;
    Ok(Json(serde_json::json!({ "deleted": id })))
}
