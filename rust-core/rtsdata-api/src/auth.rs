// SPDX-License-Identifier: PMPL-1.0-or-later
//! Access token check for the query API.
//!
//! Clients send their token in the `apikey` header, or `X-API-Key`. Tokens
//! are kept only as SHA-256 hashes. The key set is fixed at startup.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::ErrorResponse;

/// Headers a token is read from, in order
const TOKEN_HEADERS: [&str; 2] = ["apikey", "x-api-key"];

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// When disabled, all requests pass through.
    pub enabled: bool,
    /// Whether `/health` and `/ready` skip the token check.
    pub allow_public_health: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_public_health: true,
        }
    }
}

/// One accepted token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key_hash: String,
    pub label: String,
    pub active: bool,
}

/// Accepted tokens, keyed by hash.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyRegistry {
    keys: HashMap<String, ApiKeyEntry>,
}

impl ApiKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every key of `keys`, labelled by position.
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> Self {
        let mut registry = Self::new();
        for (i, key) in keys.iter().enumerate() {
            registry.register(key.as_ref(), &format!("key-{}", i + 1));
        }
        registry
    }

    pub fn register(&mut self, raw_key: &str, label: &str) {
        let key_hash = hash_key(raw_key);
        self.keys.insert(
            key_hash.clone(),
            ApiKeyEntry {
                key_hash,
                label: label.to_string(),
                active: true,
            },
        );
    }

    /// The active entry for `raw_key`, if any.
    pub fn validate(&self, raw_key: &str) -> Option<&ApiKeyEntry> {
        self.keys.get(&hash_key(raw_key)).filter(|entry| entry.active)
    }

    /// Deactivate by hash. Returns whether the key existed.
    pub fn revoke(&mut self, key_hash: &str) -> bool {
        match self.keys.get_mut(key_hash) {
            Some(entry) => {
                entry.active = false;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.values().filter(|entry| entry.active).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// State handed to [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub key_registry: Arc<ApiKeyRegistry>,
}

impl AuthState {
    pub fn new(config: AuthConfig, key_registry: ApiKeyRegistry) -> Self {
        Self {
            config,
            key_registry: Arc::new(key_registry),
        }
    }

    /// Everything passes through.
    pub fn disabled() -> Self {
        Self::new(
            AuthConfig {
                enabled: false,
                allow_public_health: true,
            },
            ApiKeyRegistry::new(),
        )
    }
}

/// Reject requests without a valid token with 401.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    if !auth.config.enabled {
        return next.run(request).await;
    }

    let path = request.uri().path();
    if auth.config.allow_public_health && (path == "/health" || path == "/ready") {
        return next.run(request).await;
    }

    match check_token(&request, &auth) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

fn check_token(request: &Request, auth: &AuthState) -> Result<(), Response> {
    let token = TOKEN_HEADERS
        .iter()
        .find_map(|name| request.headers().get(*name))
        .and_then(|v| v.to_str().ok());

    let Some(token) = token else {
        return Err((
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "ApiKey")],
            Json(ErrorResponse {
                error: "missing api key".to_string(),
                code: 401,
            }),
        )
            .into_response());
    };

    match auth.key_registry.validate(token) {
        Some(entry) => {
            debug!(label = %entry.label, "api key accepted");
            Ok(())
        }
        None => {
            warn!(path = %request.uri().path(), "invalid api key");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "invalid api key".to_string(),
                    code: 401,
                }),
            )
                .into_response())
        }
    }
}

/// Hash an API key with SHA-256 for storage.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
