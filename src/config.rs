use anyhow::Context;

use crate::slack::verify::DEFAULT_TOLERANCE_SECS;

pub const SLACK_API_URL: &str = "https://slack.com/api";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Slack Bot OAuth token (xoxb-...).
    pub slack_bot_token: String,
    /// Slack signing secret for callback verification.
    pub slack_signing_secret: String,
    /// Channel where approval messages are posted.
    pub slack_channel_id: String,
    /// Slack Web API base URL. Overridable for tests.
    pub slack_api_url: String,
    /// Replay window for callback timestamps, in seconds.
    pub signature_tolerance_secs: i64,
    pub governance_api_url: String,
    pub governance_timeout_secs: u64,
    /// Auth service consulted to resolve bearer tokens to users.
    pub auth_api_url: String,
    /// Roles that may approve/deny via the REST endpoints.
    pub auth_admin_roles: Vec<String>,
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{name} must be set"))
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        port: std::env::var("TAG_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        slack_bot_token: required("SLACK_BOT_TOKEN")?,
        slack_signing_secret: required("SLACK_SIGNING_SECRET")?,
        slack_channel_id: required("SLACK_CHANNEL_ID")?,
        slack_api_url: std::env::var("SLACK_API_URL").unwrap_or_else(|_| SLACK_API_URL.into()),
        signature_tolerance_secs: std::env::var("SLACK_SIGNATURE_TOLERANCE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TOLERANCE_SECS),
        governance_api_url: required("GOVERNANCE_API_URL")?,
        governance_timeout_secs: std::env::var("GOVERNANCE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
        auth_api_url: required("AUTH_API_URL")?,
        auth_admin_roles: std::env::var("AUTH_ADMIN_ROLES")
            .unwrap_or_else(|_| "CDM_JUPYTERHUB_ADMIN".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    })
}
