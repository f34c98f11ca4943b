//! Parsing of Slack interactive callbacks.
//!
//! Slack delivers interactions as a form-encoded body with a single
//! `payload` field holding JSON. Parsing only happens after
//! [`crate::slack::verify`] has accepted the raw bytes.

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::render::{ACTION_APPROVE, ACTION_DENY, MODAL_CALLBACK_ID, MODAL_TOKEN_ACTION, MODAL_TOKEN_BLOCK};
use crate::models::MessageRef;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("body has no payload field")]
    MissingPayload,

    #[error("payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload field missing: {0}")]
    MissingField(&'static str),

    #[error("button value is not a valid request id")]
    BadRequestId,

    #[error("unrecognized action: {0}")]
    UnknownAction(String),

    #[error("unrecognized callback: {0}")]
    UnknownCallback(String),
}

/// Which button the admin clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    Approve,
    Deny,
}

/// A verified, parsed interaction.
#[derive(Debug)]
pub enum Interaction {
    /// Approve/Deny button click on the request message.
    ButtonClick {
        action: ClickAction,
        request_id: Uuid,
        user: String,
        trigger_id: String,
        /// Where the clicked message lives, for rendering failures when
        /// the registry no longer knows the id.
        source: MessageRef,
    },
    /// Submission of the credential modal: carries the transient admin
    /// token for the governance call.
    ViewSubmission {
        request_id: Uuid,
        user: String,
        credential: Zeroizing<String>,
    },
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(rename = "type")]
    kind: String,
    user: RawUser,
    #[serde(default)]
    trigger_id: Option<String>,
    #[serde(default)]
    actions: Vec<RawAction>,
    #[serde(default)]
    channel: Option<RawChannel>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    view: Option<RawView>,
}

#[derive(Deserialize)]
struct RawUser {
    username: String,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
    value: String,
}

#[derive(Deserialize)]
struct RawChannel {
    id: String,
}

#[derive(Deserialize)]
struct RawMessage {
    ts: String,
}

#[derive(Deserialize)]
struct RawView {
    callback_id: String,
    private_metadata: String,
    state: RawViewState,
}

#[derive(Deserialize)]
struct RawViewState {
    values: serde_json::Value,
}

/// Parse a verified interaction body into an [`Interaction`].
///
/// Action and callback tags form a closed set: anything unrecognized is an
/// error, never silently ignored.
pub fn parse_interaction(body: &[u8]) -> Result<Interaction, PayloadError> {
    let payload = url::form_urlencoded::parse(body)
        .find(|(k, _)| k == "payload")
        .map(|(_, v)| v.into_owned())
        .ok_or(PayloadError::MissingPayload)?;

    let raw: RawPayload = serde_json::from_str(&payload)?;

    match raw.kind.as_str() {
        "block_actions" => parse_button_click(raw),
        "view_submission" => parse_view_submission(raw),
        other => Err(PayloadError::UnknownCallback(other.to_string())),
    }
}

fn parse_button_click(raw: RawPayload) -> Result<Interaction, PayloadError> {
    let action = raw
        .actions
        .into_iter()
        .next()
        .ok_or(PayloadError::MissingField("actions"))?;

    let click = match action.action_id.as_str() {
        ACTION_APPROVE => ClickAction::Approve,
        ACTION_DENY => ClickAction::Deny,
        other => return Err(PayloadError::UnknownAction(other.to_string())),
    };

    let request_id: Uuid = action.value.parse().map_err(|_| PayloadError::BadRequestId)?;
    let channel = raw.channel.ok_or(PayloadError::MissingField("channel"))?;
    let message = raw.message.ok_or(PayloadError::MissingField("message"))?;
    let trigger_id = raw.trigger_id.ok_or(PayloadError::MissingField("trigger_id"))?;

    Ok(Interaction::ButtonClick {
        action: click,
        request_id,
        user: raw.user.username,
        trigger_id,
        source: MessageRef {
            channel: channel.id,
            ts: message.ts,
        },
    })
}

fn parse_view_submission(raw: RawPayload) -> Result<Interaction, PayloadError> {
    let view = raw.view.ok_or(PayloadError::MissingField("view"))?;
    if view.callback_id != MODAL_CALLBACK_ID {
        return Err(PayloadError::UnknownCallback(view.callback_id));
    }

    let request_id: Uuid = view
        .private_metadata
        .parse()
        .map_err(|_| PayloadError::BadRequestId)?;

    let credential = view.state.values[MODAL_TOKEN_BLOCK][MODAL_TOKEN_ACTION]["value"]
        .as_str()
        .ok_or(PayloadError::MissingField("token value"))?;

    Ok(Interaction::ViewSubmission {
        request_id,
        user: raw.user.username,
        credential: Zeroizing::new(credential.to_string()),
    })
}
