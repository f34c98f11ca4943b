use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::auth::bearer_token;
use crate::dispatch::{self, Action, DispatchOutcome};
use crate::errors::AppError;
use crate::models::{AccessRequest, MessageRef, Permission, RequestStatus};
use crate::registry::RegistryError;
use crate::slack::payload::{self, ClickAction, Interaction};
use crate::slack::{render, verify};
use crate::state::AppState;

// ── Submission ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateAccessRequest {
    pub tenant_name: String,
    #[serde(default = "default_permission")]
    pub permission: Permission,
    #[serde(default)]
    pub justification: Option<String>,
}

fn default_permission() -> Permission {
    Permission::ReadOnly
}

#[derive(Debug, Serialize)]
pub struct AccessRequestResponse {
    pub status: String,
    pub message: String,
    pub id: Uuid,
    pub requester: String,
    pub tenant_name: String,
    pub permission: Permission,
}

/// POST /requests — submit a tenant access request.
///
/// Creates a pending record, posts the approval message to Slack, and
/// stores the message handle so the record's message can be edited in
/// place when the request resolves.
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateAccessRequest>,
) -> Result<Json<AccessRequestResponse>, AppError> {
    let token = bearer_token(&headers)?;
    let caller = state.auth.authenticate(token).await?;

    let tenant_name = body.tenant_name.trim().to_string();
    if tenant_name.is_empty() {
        return Err(AppError::InvalidRequest("tenant_name must not be empty".to_string()));
    }
    let justification = body
        .justification
        .map(|j| j.trim().to_string())
        .filter(|j| !j.is_empty());

    let id = Uuid::new_v4();
    let record = AccessRequest::new(
        id,
        caller.user.clone(),
        tenant_name.clone(),
        body.permission,
        justification,
        Utc::now(),
    );

    let message = render::pending(&record);
    let message_ref = state.slack.post_message(&message).await?;
    state.registry.create(record.with_message_ref(message_ref))?;

    info!(%id, user = %caller.user, tenant = %tenant_name, permission = ?body.permission, "access request submitted");

    Ok(Json(AccessRequestResponse {
        status: "submitted".to_string(),
        message: "Request sent to the admin channel for approval.".to_string(),
        id,
        requester: caller.user,
        tenant_name,
        permission: body.permission,
    }))
}

/// GET /requests/:id — inspect a record (admin only).
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<AccessRequest>, AppError> {
    let admin = state.auth.authenticate(bearer_token(&headers)?).await?;
    if !admin.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(Json(state.registry.get(&id)?))
}

// ── Slack interactive callbacks ───────────────────────────────

/// POST /slack/interact — Slack button clicks and modal submissions.
///
/// The signature check runs on the raw body before anything is parsed.
/// Once verified, the response to Slack is 200 even for no-op outcomes;
/// state changes flow back through message edits, not the HTTP reply.
pub async fn slack_interact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signature = headers
        .get("x-slack-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;
    let timestamp = headers
        .get("x-slack-request-timestamp")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    verify::verify_signature(
        &state.config.slack_signing_secret,
        signature,
        timestamp,
        &body,
        Utc::now().timestamp(),
        state.config.signature_tolerance_secs,
    )
    .map_err(|e| {
        warn!("rejected slack callback: {e}");
        AppError::InvalidSignature
    })?;

    let interaction = match payload::parse_interaction(&body) {
        Ok(i) => i,
        Err(e) => {
            // Unrecognized callbacks fail closed: nothing is mutated.
            warn!("unhandled slack payload: {e}");
            return Ok(StatusCode::OK.into_response());
        }
    };

    match interaction {
        Interaction::ButtonClick {
            action: ClickAction::Deny,
            request_id,
            user,
            source,
            ..
        } => {
            resolve_and_update(&state, request_id, Action::Deny, &user, Some(&source)).await?;
        }
        Interaction::ButtonClick {
            action: ClickAction::Approve,
            request_id,
            trigger_id,
            source,
            ..
        } => {
            // Approval needs the admin's governance token, collected
            // through a modal. The correlation id rides in the modal's
            // private metadata; the actual transition happens on submit.
            match state.registry.get(&request_id) {
                Err(RegistryError::NotFound) => {
                    state
                        .slack
                        .update_message(&source, &render::unknown_request())
                        .await?;
                }
                Err(e) => return Err(e.into()),
                Ok(record) if record.status.is_terminal() => {
                    let outcome = render::ResolvedOutcome::from_status(record.status);
                    state
                        .slack
                        .update_message(&record.message_ref, &render::resolved(&record, &outcome))
                        .await?;
                }
                Ok(_) => {
                    state
                        .slack
                        .open_view(&trigger_id, render::credential_modal(&request_id))
                        .await?;
                }
            }
        }
        Interaction::ViewSubmission {
            request_id,
            user,
            credential,
        } => {
            resolve_and_update(&state, request_id, Action::Approve { credential }, &user, None)
                .await?;
        }
    }

    Ok(StatusCode::OK.into_response())
}

/// Drive the dispatcher and edit the Slack message to the rendered
/// terminal state. `source` is the message the interaction came from,
/// used for the generic notice when the id no longer resolves.
async fn resolve_and_update(
    state: &AppState,
    id: Uuid,
    action: Action,
    actor: &str,
    source: Option<&MessageRef>,
) -> Result<(), AppError> {
    match dispatch::dispatch(&state.registry, &state.governance, id, action, actor, Utc::now())
        .await
    {
        Ok(outcome) => {
            state
                .slack
                .update_message(&outcome.record.message_ref, &outcome.message)
                .await?;
            Ok(())
        }
        Err(RegistryError::NotFound) => {
            warn!(%id, %actor, "interaction for unknown request id");
            if let Some(source) = source {
                state
                    .slack
                    .update_message(source, &render::unknown_request())
                    .await?;
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

// ── Admin REST approvals ──────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub status: RequestStatus,
    pub requester: String,
    pub tenant_name: String,
    pub permission: Permission,
    pub performed_by: Option<String>,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ApprovalResponse {
    fn from_outcome(outcome: &DispatchOutcome) -> Self {
        let record = &outcome.record;
        let message = if !outcome.applied {
            format!("Request was already resolved as {:?}", record.status)
        } else if let Some(err) = &outcome.grant_error {
            format!(
                "Approval recorded but the grant failed: {err}. Manual follow-up is required."
            )
        } else {
            match record.status {
                RequestStatus::Approved => format!(
                    "Successfully added {} to {}",
                    record.requester, record.tenant_name
                ),
                _ => format!("Access request denied for {}", record.requester),
            }
        };
        Self {
            status: record.status,
            requester: record.requester.clone(),
            tenant_name: record.tenant_name.clone(),
            permission: record.permission,
            performed_by: record.resolver.clone(),
            message,
            timestamp: record.resolved_at,
        }
    }
}

/// POST /approvals/:id/approve — REST path for admins who prefer the API
/// over the Slack modal. The admin's own bearer token doubles as the
/// transient governance credential, exactly as in the modal flow.
pub async fn approve_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ApprovalResponse>, AppError> {
    let token = bearer_token(&headers)?;
    let admin = state.auth.authenticate(token).await?;
    if !admin.is_admin {
        return Err(AppError::Forbidden);
    }

    let credential = Zeroizing::new(token.to_string());
    let outcome = dispatch::dispatch(
        &state.registry,
        &state.governance,
        id,
        Action::Approve { credential },
        &admin.user,
        Utc::now(),
    )
    .await?;

    state
        .slack
        .update_message(&outcome.record.message_ref, &outcome.message)
        .await?;
    Ok(Json(ApprovalResponse::from_outcome(&outcome)))
}

/// POST /approvals/:id/deny — deny without any governance call.
pub async fn deny_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ApprovalResponse>, AppError> {
    let admin = state.auth.authenticate(bearer_token(&headers)?).await?;
    if !admin.is_admin {
        return Err(AppError::Forbidden);
    }

    let outcome = dispatch::dispatch(
        &state.registry,
        &state.governance,
        id,
        Action::Deny,
        &admin.user,
        Utc::now(),
    )
    .await?;

    state
        .slack
        .update_message(&outcome.record.message_ref, &outcome.message)
        .await?;
    Ok(Json(ApprovalResponse::from_outcome(&outcome)))
}

// ── Health ────────────────────────────────────────────────────

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
