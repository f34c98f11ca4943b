//! Shared application state.
//!
//! Constructed once at startup and handed to the router; tests build
//! their own instances pointed at mock upstreams.

use std::time::Duration;

use crate::auth::AuthClient;
use crate::config::Config;
use crate::governance::GovernanceClient;
use crate::registry::RequestRegistry;
use crate::slack::client::SlackClient;

pub struct AppState {
    pub registry: RequestRegistry,
    pub slack: SlackClient,
    pub governance: GovernanceClient,
    pub auth: AuthClient,
    pub config: Config,
}

impl AppState {
    pub fn from_config(config: Config) -> Self {
        Self {
            registry: RequestRegistry::new(),
            slack: SlackClient::new(
                &config.slack_api_url,
                &config.slack_bot_token,
                &config.slack_channel_id,
            ),
            governance: GovernanceClient::new(
                &config.governance_api_url,
                Duration::from_secs(config.governance_timeout_secs),
            ),
            auth: AuthClient::new(&config.auth_api_url, config.auth_admin_roles.clone()),
            config,
        }
    }
}
