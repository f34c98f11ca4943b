//! Slack Web API sender.
//!
//! Thin collaborator around `chat.postMessage`, `chat.update`, and
//! `views.open`. The engine decides what to say; this client only moves
//! bytes. The API base URL is injectable so tests can point it at a mock
//! server.

use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::render::RenderedMessage;
use crate::models::MessageRef;

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("slack transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("slack api error: {0}")]
    Api(String),
}

#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_url: String,
    bot_token: String,
    channel_id: String,
}

#[derive(serde::Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

impl SlackClient {
    pub fn new(api_url: &str, bot_token: &str, channel_id: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("failed to build slack HTTP client"),
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            channel_id: channel_id.to_string(),
        }
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<ApiResponse, SlackError> {
        let url = format!("{}/{}", self.api_url, method);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<ApiResponse>()
            .await?;

        if !resp.ok {
            return Err(SlackError::Api(
                resp.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(resp)
    }

    /// Post a new message to the approval channel. Returns the handle
    /// needed to edit it later.
    pub async fn post_message(&self, message: &RenderedMessage) -> Result<MessageRef, SlackError> {
        let resp = self
            .call(
                "chat.postMessage",
                json!({
                    "channel": self.channel_id,
                    "text": message.text,
                    "blocks": message.blocks,
                }),
            )
            .await?;

        let ts = resp.ts.ok_or_else(|| SlackError::Api("missing ts".to_string()))?;
        let channel = resp
            .channel
            .unwrap_or_else(|| self.channel_id.clone());
        info!(channel = %channel, "posted access request message");
        Ok(MessageRef { channel, ts })
    }

    /// Edit an existing message in place.
    pub async fn update_message(
        &self,
        target: &MessageRef,
        message: &RenderedMessage,
    ) -> Result<(), SlackError> {
        self.call(
            "chat.update",
            json!({
                "channel": target.channel,
                "ts": target.ts,
                "text": message.text,
                "blocks": message.blocks,
            }),
        )
        .await?;
        debug!(channel = %target.channel, ts = %target.ts, "updated message");
        Ok(())
    }

    /// Open a modal in response to a button click.
    pub async fn open_view(
        &self,
        trigger_id: &str,
        view: serde_json::Value,
    ) -> Result<(), SlackError> {
        self.call("views.open", json!({"trigger_id": trigger_id, "view": view}))
            .await?;
        Ok(())
    }
}
