//! Interaction dispatcher: turns a verified approval action into a single
//! atomic state transition, a governance call when warranted, and the
//! terminal message to render.
//!
//! This is the only place a record resolves. Both entry points — the
//! Slack callback route and the admin REST route — funnel into
//! [`dispatch`], so the idempotency guarantees hold no matter which path
//! a duplicate arrives on.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::governance::{GovernanceClient, GovernanceError};
use crate::models::{AccessRequest, Decision};
use crate::registry::{RegistryError, RequestRegistry, Transition};
use crate::slack::render::{self, RenderedMessage, ResolvedOutcome};

/// A resolution action taken by an admin. The approve credential is
/// single-use: it is moved into the governance call and dropped (and
/// zeroized) when this value goes out of scope.
pub enum Action {
    Approve { credential: Zeroizing<String> },
    Deny,
}

impl Action {
    fn decision(&self) -> Decision {
        match self {
            Action::Approve { .. } => Decision::Approved,
            Action::Deny => Decision::Denied,
        }
    }
}

/// What the dispatcher decided and what to show for it.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub record: AccessRequest,
    pub message: RenderedMessage,
    /// False when the record was already terminal and this call was a
    /// no-op re-render.
    pub applied: bool,
    /// Set when the transition committed as approved but the governance
    /// grant failed. The record is *not* reverted; the message instructs
    /// manual follow-up.
    pub grant_error: Option<GovernanceError>,
}

/// Resolve a request.
///
/// * Unknown id → `Err(NotFound)`; the caller renders a generic notice.
/// * Already terminal → re-render the existing state, touch nothing else.
/// * Deny → transition and render; the governance backend is never called.
/// * Approve → transition, then one governance attempt. A failed grant
///   leaves the record approved and is surfaced in the rendered message.
pub async fn dispatch(
    registry: &RequestRegistry,
    governance: &GovernanceClient,
    id: Uuid,
    action: Action,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<DispatchOutcome, RegistryError> {
    let record = match registry.transition(&id, action.decision(), actor, now)? {
        Transition::AlreadyResolved(record) => {
            info!(%id, status = ?record.status, "duplicate resolution attempt, re-rendering");
            let outcome = ResolvedOutcome::from_status(record.status);
            let message = render::resolved(&record, &outcome);
            return Ok(DispatchOutcome {
                record,
                message,
                applied: false,
                grant_error: None,
            });
        }
        Transition::Applied(record) => record,
    };

    match action {
        Action::Deny => {
            info!(%id, %actor, requester = %record.requester, tenant = %record.tenant_name, "request denied");
            let message = render::resolved(&record, &ResolvedOutcome::Denied);
            Ok(DispatchOutcome {
                record,
                message,
                applied: true,
                grant_error: None,
            })
        }
        Action::Approve { credential } => {
            let result = governance
                .grant(
                    &record.tenant_name,
                    record.permission,
                    &record.requester,
                    &credential,
                )
                .await;
            drop(credential);

            match result {
                Ok(()) => {
                    info!(%id, %actor, requester = %record.requester, tenant = %record.tenant_name, "request approved and granted");
                    let message = render::resolved(&record, &ResolvedOutcome::Approved);
                    Ok(DispatchOutcome {
                        record,
                        message,
                        applied: true,
                        grant_error: None,
                    })
                }
                Err(err) => {
                    // The transition already committed; surfacing the
                    // inconsistency beats letting a second click re-run
                    // the grant.
                    warn!(%id, %actor, error = %err, "approval recorded but governance grant failed");
                    let message = render::resolved(
                        &record,
                        &ResolvedOutcome::GrantFailed {
                            detail: err.to_string(),
                        },
                    );
                    Ok(DispatchOutcome {
                        record,
                        message,
                        applied: true,
                        grant_error: Some(err),
                    })
                }
            }
        }
    }
}
