//! Governance backend client: performs the actual permission grant.
//!
//! The admin credential passed to [`GovernanceClient::grant`] lives only
//! for the duration of the call. It is never written to the registry,
//! never logged, and is dropped by the caller when the call returns.

use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::models::Permission;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("admin credential rejected by governance backend")]
    AuthExpired,

    #[error("tenant not known to governance backend")]
    TenantNotFound,

    #[error("governance backend unavailable: {0}")]
    UpstreamUnavailable(String),
}

pub struct GovernanceClient {
    http: reqwest::Client,
    api_url: String,
}

impl GovernanceClient {
    pub fn new(api_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("failed to build governance HTTP client"),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Backend group naming: read-only membership lives in a `<tenant>ro`
    /// group, read-write in the tenant group itself.
    fn group_name(tenant_name: &str, permission: Permission) -> String {
        match permission {
            Permission::ReadOnly => format!("{tenant_name}ro"),
            Permission::ReadWrite => tenant_name.to_string(),
        }
    }

    /// Add `requester` to the tenant group. One synchronous attempt, no
    /// retries: failures propagate to the dispatcher, which surfaces them
    /// in the rendered message.
    pub async fn grant(
        &self,
        tenant_name: &str,
        permission: Permission,
        requester: &str,
        credential: &str,
    ) -> Result<(), GovernanceError> {
        let group = Self::group_name(tenant_name, permission);
        let url = format!(
            "{}/management/groups/{}/members/{}",
            self.api_url, group, requester
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GovernanceError::UpstreamUnavailable("request timed out".to_string())
                } else {
                    GovernanceError::UpstreamUnavailable(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            info!(%group, %requester, "added member to tenant group");
            return Ok(());
        }

        error!(%group, %requester, status = %status, "governance grant failed");
        match status.as_u16() {
            401 | 403 => Err(GovernanceError::AuthExpired),
            404 => Err(GovernanceError::TenantNotFound),
            _ => Err(GovernanceError::UpstreamUnavailable(format!(
                "governance backend returned {status}"
            ))),
        }
    }
}
