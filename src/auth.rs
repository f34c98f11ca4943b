//! Thin bearer-token caller authentication.
//!
//! The approval engine itself does not authenticate callers; this
//! collaborator resolves a bearer token to a username and role set via
//! the configured auth service, and the routes decide whether admin
//! roles are required.

use axum::http::HeaderMap;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user: String,
    pub is_admin: bool,
}

#[derive(Deserialize)]
struct MeResponse {
    user: String,
    #[serde(default)]
    customroles: Vec<String>,
}

pub struct AuthClient {
    http: reqwest::Client,
    api_url: String,
    admin_roles: Vec<String>,
}

impl AuthClient {
    pub fn new(api_url: &str, admin_roles: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("failed to build auth HTTP client"),
            api_url: api_url.trim_end_matches('/').to_string(),
            admin_roles,
        }
    }

    /// Resolve a bearer token to a user. A token the auth service does
    /// not recognize maps to `Unauthenticated`.
    pub async fn authenticate(&self, token: &str) -> Result<AuthedUser, AppError> {
        let url = format!("{}/api/V2/me", self.api_url);
        let resp = self
            .http
            .get(&url)
            .header("authorization", token)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("auth service unreachable: {e}")))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthenticated);
        }
        let me: MeResponse = resp
            .error_for_status()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("auth service error: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("auth service bad response: {e}")))?;

        let is_admin = me
            .customroles
            .iter()
            .any(|r| self.admin_roles.iter().any(|a| a == r));
        debug!(user = %me.user, is_admin, "authenticated caller");
        Ok(AuthedUser { user: me.user, is_admin })
    }
}

/// Pull the bearer token out of the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return Err(AppError::Unauthenticated);
    }
    Ok(token)
}
