use std::collections::HashMap;

use axum::http::HeaderMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use crate::error::ApiError;

/// A registered account. Passwords are stored as SHA-256 digests and tokens
/// are opaque UUIDs — a deliberately simple stand-in, not a secure scheme.
#[derive(Clone)]
pub struct UserAccount {
    pub username: String,
    pub role: String,
    password_digest: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub action: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// In-memory user registry: accounts, issued bearer tokens, and a per-user
/// activity log.
#[derive(Default)]
pub struct UserRegistry {
    users: RwLock<HashMap<String, UserAccount>>,
    /// token -> username
    tokens: RwLock<HashMap<String, String>>,
    activity: RwLock<HashMap<String, Vec<ActivityEntry>>>,
}

fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: &str,
    ) -> Result<(), ApiError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ApiError::BadRequest(
                "username and password are required".into(),
            ));
        }

        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(ApiError::Conflict(format!(
                "user '{username}' already exists"
            )));
        }
        users.insert(
            username.to_string(),
            UserAccount {
                username: username.to_string(),
                role: role.to_string(),
                password_digest: digest(password),
                created_at: chrono::Utc::now(),
            },
        );
        drop(users);

        self.record_activity(username, "registered").await;
        Ok(())
    }

    /// Verify credentials and issue a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let presented = digest(password);
        let ok = {
            let users = self.users.read().await;
            users
                .get(username)
                .map(|u| constant_time_eq(u.password_digest.as_bytes(), presented.as_bytes()))
                .unwrap_or(false)
        };

        if !ok {
            return Err(ApiError::Unauthorized);
        }

        let token = uuid::Uuid::new_v4().to_string();
        self.tokens
            .write()
            .await
            .insert(token.clone(), username.to_string());
        self.record_activity(username, "logged in").await;
        Ok(token)
    }

    /// Resolve a presented token to its username.
    pub async fn verify_token(&self, presented: &str) -> Option<String> {
        let tokens = self.tokens.read().await;
        for (token, username) in tokens.iter() {
            if constant_time_eq(token.as_bytes(), presented.as_bytes()) {
                return Some(username.clone());
            }
        }
        None
    }

    pub async fn record_activity(&self, username: &str, action: &str) {
        let mut activity = self.activity.write().await;
        activity
            .entry(username.to_string())
            .or_default()
            .push(ActivityEntry {
                action: action.to_string(),
                timestamp: chrono::Utc::now(),
            });
    }

    pub async fn activity_for(&self, username: &str) -> Vec<ActivityEntry> {
        let activity = self.activity.read().await;
        activity.get(username).cloned().unwrap_or_default()
    }
}

/// Resolve the `Authorization: Bearer <token>` header to a username.
pub async fn authorize(registry: &UserRegistry, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    registry
        .verify_token(token)
        .await
        .ok_or(ApiError::Unauthorized)
}
