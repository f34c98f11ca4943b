//! Block Kit rendering for approval messages.
//!
//! Pure functions of the record: no I/O, no clock reads. Timestamps come
//! from `created_at` / `resolved_at` on the record itself.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{AccessRequest, RequestStatus};

pub const ACTION_APPROVE: &str = "approve_tenant_access";
pub const ACTION_DENY: &str = "deny_tenant_access";
pub const MODAL_CALLBACK_ID: &str = "approve_with_token";
pub const MODAL_TOKEN_BLOCK: &str = "token_block";
pub const MODAL_TOKEN_ACTION: &str = "admin_token";

/// Terminal outcome to render. `GrantFailed` covers the acknowledged
/// inconsistency where the record is approved but the governance call did
/// not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedOutcome {
    Approved,
    Denied,
    GrantFailed { detail: String },
}

impl ResolvedOutcome {
    /// Outcome matching a record that is already terminal, used when a
    /// duplicate click needs the existing state re-rendered.
    ///
    /// # Panics
    ///
    /// Panics on `Pending`: pending records have no terminal outcome to
    /// re-render and reaching here with one is a caller bug.
    pub fn from_status(status: RequestStatus) -> Self {
        match status {
            RequestStatus::Approved => ResolvedOutcome::Approved,
            RequestStatus::Denied => ResolvedOutcome::Denied,
            RequestStatus::Pending => unreachable!("pending records are not re-rendered"),
        }
    }
}

/// A message body ready for `chat.postMessage` / `chat.update`: Block Kit
/// blocks plus the plain-text fallback Slack requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub text: String,
    pub blocks: Vec<Value>,
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn fields_section(pairs: &[(&str, String)]) -> Value {
    let fields: Vec<Value> = pairs
        .iter()
        .map(|(label, value)| json!({"type": "mrkdwn", "text": format!("*{label}:*\n{value}")}))
        .collect();
    json!({"type": "section", "fields": fields})
}

fn header(text: &str) -> Value {
    json!({"type": "header", "text": {"type": "plain_text", "text": text, "emoji": true}})
}

/// Notification for a freshly created request: request details plus
/// Approve/Deny buttons whose `value` is the record id, so a later
/// callback can locate the record without trusting anything else in the
/// payload.
pub fn pending(record: &AccessRequest) -> RenderedMessage {
    let mut blocks = vec![
        header("🔐 Tenant Access Request"),
        fields_section(&[
            ("Requester", record.requester.clone()),
            ("Tenant", record.tenant_name.clone()),
            ("Permission", record.permission.label().to_string()),
            ("Requested", fmt_ts(record.created_at)),
        ]),
    ];

    if let Some(justification) = &record.justification {
        blocks.push(json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("*Justification:*\n{justification}")},
        }));
    }

    blocks.push(json!({
        "type": "actions",
        "elements": [
            {
                "type": "button",
                "text": {"type": "plain_text", "text": "✅ Approve", "emoji": true},
                "style": "primary",
                "action_id": ACTION_APPROVE,
                "value": record.id.to_string(),
            },
            {
                "type": "button",
                "text": {"type": "plain_text", "text": "❌ Deny", "emoji": true},
                "style": "danger",
                "action_id": ACTION_DENY,
                "value": record.id.to_string(),
            },
        ],
    }));

    RenderedMessage {
        text: format!(
            "Tenant access request from {} for {}",
            record.requester, record.tenant_name
        ),
        blocks,
    }
}

/// Terminal message: same request details plus who resolved it and when,
/// with no action elements. Terminal messages are not actionable.
pub fn resolved(record: &AccessRequest, outcome: &ResolvedOutcome) -> RenderedMessage {
    let resolver = record.resolver.as_deref().unwrap_or("unknown").to_string();
    let resolved_at = record.resolved_at.map(fmt_ts).unwrap_or_default();

    let (head, verb, text) = match outcome {
        ResolvedOutcome::Approved => (
            "✅ Tenant Access Approved",
            "Approved by",
            format!(
                "✅ Approved: {} → {} ({})",
                record.requester,
                record.tenant_name,
                record.permission.label()
            ),
        ),
        ResolvedOutcome::Denied => (
            "❌ Tenant Access Denied",
            "Denied by",
            format!("❌ Denied: {} → {}", record.requester, record.tenant_name),
        ),
        ResolvedOutcome::GrantFailed { .. } => (
            "⚠️ Approved — Grant Failed",
            "Approved by",
            format!(
                "⚠️ Approved but grant failed: {} → {}",
                record.requester, record.tenant_name
            ),
        ),
    };

    let mut blocks = vec![
        header(head),
        fields_section(&[
            ("Requester", record.requester.clone()),
            ("Tenant", record.tenant_name.clone()),
            ("Permission", record.permission.label().to_string()),
            (verb, resolver),
        ]),
    ];

    match outcome {
        ResolvedOutcome::GrantFailed { detail } => {
            blocks.push(json!({
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": format!(
                        "The approval was recorded but the governance call failed: {detail}.\n\
                         The grant was *not* performed. Manual follow-up is required."
                    ),
                },
            }));
            blocks.push(json!({
                "type": "context",
                "elements": [{"type": "mrkdwn", "text": format!("Approved at {resolved_at}")}],
            }));
        }
        ResolvedOutcome::Approved => {
            blocks.push(json!({
                "type": "context",
                "elements": [{"type": "mrkdwn", "text": format!("Approved at {resolved_at}")}],
            }));
        }
        ResolvedOutcome::Denied => {
            blocks.push(json!({
                "type": "context",
                "elements": [{"type": "mrkdwn", "text": format!("Denied at {resolved_at}")}],
            }));
        }
    }

    RenderedMessage { text, blocks }
}

/// Generic failure notice for callbacks whose correlation id no longer
/// resolves to a record. Deliberately vague: no internal detail leaks.
pub fn unknown_request() -> RenderedMessage {
    RenderedMessage {
        text: "⚠️ This access request could not be processed".to_string(),
        blocks: vec![
            header("⚠️ Request Unavailable"),
            json!({
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": "This access request is no longer available. \
                             Ask the requester to submit a new one.",
                },
            }),
        ],
    }
}

/// Modal asking the approving admin for their governance token. The
/// correlation id rides along in `private_metadata`; the token itself is
/// used once and never stored.
pub fn credential_modal(request_id: &Uuid) -> Value {
    json!({
        "type": "modal",
        "callback_id": MODAL_CALLBACK_ID,
        "private_metadata": request_id.to_string(),
        "title": {"type": "plain_text", "text": "Approve Access", "emoji": true},
        "submit": {"type": "plain_text", "text": "Approve", "emoji": true},
        "close": {"type": "plain_text", "text": "Cancel", "emoji": true},
        "blocks": [
            {
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": "Enter your governance authentication token to approve this request.\n\n\
                             Your token is used once to perform the grant and is not stored.",
                },
            },
            {
                "type": "input",
                "block_id": MODAL_TOKEN_BLOCK,
                "element": {
                    "type": "plain_text_input",
                    "action_id": MODAL_TOKEN_ACTION,
                    "placeholder": {"type": "plain_text", "text": "Paste your token here"},
                },
                "label": {"type": "plain_text", "text": "Admin Token", "emoji": true},
            },
        ],
    })
}
