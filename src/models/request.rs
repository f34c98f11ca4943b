use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permission level a requester can ask for on a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    /// Human-readable label used in Slack messages.
    pub fn label(&self) -> &'static str {
        match self {
            Permission::ReadOnly => "Read Only",
            Permission::ReadWrite => "Read/Write",
        }
    }
}

/// Lifecycle state of an access request. Transitions are monotonic:
/// `Pending` moves at most once to `Approved` or `Denied` and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// The terminal verdict an admin hands down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Denied,
}

impl From<Decision> for RequestStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Approved => RequestStatus::Approved,
            Decision::Denied => RequestStatus::Denied,
        }
    }
}

/// Handle to the Slack message announcing a request, kept so the message
/// can be edited in place once the request resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: String,
    pub ts: String,
}

/// A tenant access request and its resolution state.
///
/// `resolver` and `resolved_at` are both `None` while the request is
/// pending and both `Some` once it is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: Uuid,
    pub requester: String,
    pub tenant_name: String,
    pub permission: Permission,
    pub justification: Option<String>,
    pub status: RequestStatus,
    pub resolver: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub message_ref: MessageRef,
    pub created_at: DateTime<Utc>,
}

impl AccessRequest {
    /// Build a new pending record. The Slack message has not been posted
    /// yet at this point, so the message ref starts empty; attach it with
    /// [`AccessRequest::with_message_ref`] before inserting into the
    /// registry.
    pub fn new(
        id: Uuid,
        requester: impl Into<String>,
        tenant_name: impl Into<String>,
        permission: Permission,
        justification: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            requester: requester.into(),
            tenant_name: tenant_name.into(),
            permission,
            justification,
            status: RequestStatus::Pending,
            resolver: None,
            resolved_at: None,
            message_ref: MessageRef::default(),
            created_at: now,
        }
    }

    pub fn with_message_ref(mut self, message_ref: MessageRef) -> Self {
        self.message_ref = message_ref;
        self
    }
}
