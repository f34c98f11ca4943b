//! End-to-end tests for the approval workflow engine.
//!
//! The router runs against wiremock stand-ins for the three upstreams
//! (Slack Web API, governance backend, auth service), so every flow here
//! exercises the real verification, registry, dispatch, and rendering
//! code paths.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{bearer_token, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tenant_access_gateway::api;
use tenant_access_gateway::config::Config;
use tenant_access_gateway::models::RequestStatus;
use tenant_access_gateway::slack::render::{
    ACTION_APPROVE, ACTION_DENY, MODAL_CALLBACK_ID, MODAL_TOKEN_ACTION, MODAL_TOKEN_BLOCK,
};
use tenant_access_gateway::slack::verify::sign;
use tenant_access_gateway::state::AppState;

const SIGNING_SECRET: &str = "test-signing-secret";
const CHANNEL: &str = "C0123";

struct TestHarness {
    state: Arc<AppState>,
    app: axum::Router,
    governance: MockServer,
    // Kept alive for the duration of each test.
    _slack: MockServer,
    _auth: MockServer,
}

async fn harness() -> TestHarness {
    let slack = MockServer::start().await;
    let governance = MockServer::start().await;
    let auth = MockServer::start().await;

    // Default Slack behavior; individual tests mount stricter expectations.
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true, "ts": "1700000000.000100", "channel": CHANNEL,
        })))
        .mount(&slack)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat.update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&slack)
        .await;
    Mock::given(method("POST"))
        .and(path("/views.open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&slack)
        .await;

    // Two known tokens: a plain user and an admin.
    Mock::given(method("GET"))
        .and(path("/api/V2/me"))
        .and(header("authorization", "tok-user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": "jdoe", "customroles": [],
        })))
        .mount(&auth)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/V2/me"))
        .and(header("authorization", "tok-admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": "alice", "customroles": ["CDM_JUPYTERHUB_ADMIN"],
        })))
        .mount(&auth)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/V2/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&auth)
        .await;

    let config = Config {
        port: 0,
        slack_bot_token: "xoxb-test".to_string(),
        slack_signing_secret: SIGNING_SECRET.to_string(),
        slack_channel_id: CHANNEL.to_string(),
        slack_api_url: slack.uri(),
        signature_tolerance_secs: 300,
        governance_api_url: governance.uri(),
        governance_timeout_secs: 5,
        auth_api_url: auth.uri(),
        auth_admin_roles: vec!["CDM_JUPYTERHUB_ADMIN".to_string()],
    };

    let state = Arc::new(AppState::from_config(config));
    let app = api::router(state.clone());
    TestHarness { state, app, governance, _slack: slack, _auth: auth }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Submit a request as `jdoe` and return its correlation id.
async fn submit_request(h: &TestHarness, tenant: &str, permission: &str) -> Uuid {
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/requests")
                .header("authorization", "Bearer tok-user")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "tenant_name": tenant,
                        "permission": permission,
                        "justification": "need the data",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "submitted");
    body["id"].as_str().unwrap().parse().unwrap()
}

fn interact_body(payload: &serde_json::Value) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("payload", &payload.to_string())
        .finish()
}

fn signed_interact_request(body: &str, timestamp: i64) -> Request<Body> {
    let ts = timestamp.to_string();
    let signature = sign(SIGNING_SECRET, &ts, body.as_bytes());
    Request::builder()
        .method("POST")
        .uri("/slack/interact")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("x-slack-signature", signature)
        .header("x-slack-request-timestamp", ts)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn button_click(action_id: &str, id: &Uuid, user: &str) -> serde_json::Value {
    json!({
        "type": "block_actions",
        "user": {"username": user},
        "trigger_id": "trig-001",
        "channel": {"id": CHANNEL},
        "message": {"ts": "1700000000.000100"},
        "actions": [{"action_id": action_id, "value": id.to_string()}],
    })
}

fn modal_submission(id: &Uuid, user: &str, token: &str) -> serde_json::Value {
    json!({
        "type": "view_submission",
        "user": {"username": user},
        "view": {
            "callback_id": MODAL_CALLBACK_ID,
            "private_metadata": id.to_string(),
            "state": {"values": {
                MODAL_TOKEN_BLOCK: {MODAL_TOKEN_ACTION: {"value": token}}
            }},
        },
    })
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn path_regex_management() -> impl wiremock::Match {
    path_regex("^/management/")
}

#[tokio::test]
async fn health_is_ok() {
    let h = harness().await;
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn submission_creates_pending_record_with_message_ref() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_only").await;

    let record = h.state.registry.get(&id).unwrap();
    assert_eq!(record.status, RequestStatus::Pending);
    assert_eq!(record.requester, "jdoe");
    assert_eq!(record.tenant_name, "kbase");
    assert_eq!(record.message_ref.channel, CHANNEL);
    assert_eq!(record.message_ref.ts, "1700000000.000100");
    assert!(record.resolver.is_none());
}

#[tokio::test]
async fn submission_requires_a_known_token() {
    let h = harness().await;
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/requests")
                .header("authorization", "Bearer tok-unknown")
                .header("content-type", "application/json")
                .body(Body::from(json!({"tenant_name": "kbase"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deny_click_resolves_record_without_governance_call() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path_regex_management())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.governance)
        .await;

    let id = submit_request(&h, "kbase", "read_only").await;
    let body = interact_body(&button_click(ACTION_DENY, &id, "bob"));
    let response = h
        .app
        .clone()
        .oneshot(signed_interact_request(&body, now()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = h.state.registry.get(&id).unwrap();
    assert_eq!(record.status, RequestStatus::Denied);
    assert_eq!(record.resolver.as_deref(), Some("bob"));
    assert!(record.resolved_at.is_some());
}

#[tokio::test]
async fn approve_click_opens_credential_modal_then_submission_grants() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_only").await;

    // Click: no transition yet, just the modal.
    let body = interact_body(&button_click(ACTION_APPROVE, &id, "alice"));
    let response = h
        .app
        .clone()
        .oneshot(signed_interact_request(&body, now()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.state.registry.get(&id).unwrap().status, RequestStatus::Pending);

    // Modal submission carries the transient credential and resolves.
    Mock::given(method("POST"))
        .and(path("/management/groups/kbasero/members/jdoe"))
        .and(bearer_token("tok-governance"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.governance)
        .await;

    let body = interact_body(&modal_submission(&id, "alice", "tok-governance"));
    let response = h
        .app
        .clone()
        .oneshot(signed_interact_request(&body, now()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = h.state.registry.get(&id).unwrap();
    assert_eq!(record.status, RequestStatus::Approved);
    assert_eq!(record.resolver.as_deref(), Some("alice"));
}

#[tokio::test]
async fn read_write_grant_targets_the_tenant_group() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_write").await;

    Mock::given(method("POST"))
        .and(path("/management/groups/kbase/members/jdoe"))
        .and(bearer_token("tok-governance"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.governance)
        .await;

    let body = interact_body(&modal_submission(&id, "alice", "tok-governance"));
    h.app
        .clone()
        .oneshot(signed_interact_request(&body, now()))
        .await
        .unwrap();
    assert_eq!(h.state.registry.get(&id).unwrap().status, RequestStatus::Approved);
}

#[tokio::test]
async fn failed_grant_keeps_record_approved() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_only").await;

    Mock::given(method("POST"))
        .and(path_regex_management())
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&h.governance)
        .await;

    let body = interact_body(&modal_submission(&id, "alice", "tok-governance"));
    let response = h
        .app
        .clone()
        .oneshot(signed_interact_request(&body, now()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Not reverted to pending: transitions are monotonic.
    let record = h.state.registry.get(&id).unwrap();
    assert_eq!(record.status, RequestStatus::Approved);
}

#[tokio::test]
async fn duplicate_deny_after_approval_is_a_noop() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_only").await;

    Mock::given(method("POST"))
        .and(path_regex_management())
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.governance)
        .await;

    let body = interact_body(&modal_submission(&id, "alice", "tok-governance"));
    h.app
        .clone()
        .oneshot(signed_interact_request(&body, now()))
        .await
        .unwrap();

    // A racing deny click replays against the terminal record.
    let body = interact_body(&button_click(ACTION_DENY, &id, "bob"));
    let response = h
        .app
        .clone()
        .oneshot(signed_interact_request(&body, now()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = h.state.registry.get(&id).unwrap();
    assert_eq!(record.status, RequestStatus::Approved);
    assert_eq!(record.resolver.as_deref(), Some("alice"));
}

#[tokio::test]
async fn stale_timestamp_is_rejected_even_with_valid_signature() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_only").await;

    let body = interact_body(&button_click(ACTION_DENY, &id, "bob"));
    // 10 minutes old, tolerance is 5.
    let response = h
        .app
        .clone()
        .oneshot(signed_interact_request(&body, now() - 600))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // No mutation happened.
    assert_eq!(h.state.registry.get(&id).unwrap().status, RequestStatus::Pending);
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_only").await;

    let body = interact_body(&button_click(ACTION_DENY, &id, "bob"));
    let ts = now().to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/slack/interact")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("x-slack-signature", "v0=deadbeef")
        .header("x-slack-request-timestamp", ts)
        .body(Body::from(body))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(h.state.registry.get(&id).unwrap().status, RequestStatus::Pending);
}

#[tokio::test]
async fn callback_for_unknown_id_never_reaches_governance() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path_regex_management())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.governance)
        .await;

    let body = interact_body(&modal_submission(&Uuid::new_v4(), "alice", "tok"));
    let response = h
        .app
        .clone()
        .oneshot(signed_interact_request(&body, now()))
        .await
        .unwrap();
    // Slack still gets its 200; nothing was acted on.
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn rest_approve_uses_admin_token_as_credential() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_only").await;

    Mock::given(method("POST"))
        .and(path("/management/groups/kbasero/members/jdoe"))
        .and(bearer_token("tok-admin"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.governance)
        .await;

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/approvals/{id}/approve"))
                .header("authorization", "Bearer tok-admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["performed_by"], "alice");

    assert_eq!(h.state.registry.get(&id).unwrap().status, RequestStatus::Approved);
}

#[tokio::test]
async fn rest_approve_with_failed_grant_reports_inconsistency_not_error() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_only").await;

    Mock::given(method("POST"))
        .and(path_regex_management())
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&h.governance)
        .await;

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/approvals/{id}/approve"))
                .header("authorization", "Bearer tok-admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // The transition committed, so this is a successful response that
    // carries the inconsistency, not a gateway error.
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "approved");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("grant failed"));
    assert_eq!(h.state.registry.get(&id).unwrap().status, RequestStatus::Approved);
}

#[tokio::test]
async fn rest_deny_requires_admin_role() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_only").await;

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/approvals/{id}/deny"))
                .header("authorization", "Bearer tok-user")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.state.registry.get(&id).unwrap().status, RequestStatus::Pending);
}

#[tokio::test]
async fn rest_approve_unknown_id_is_404() {
    let h = harness().await;
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/approvals/{}/approve", Uuid::new_v4()))
                .header("authorization", "Bearer tok-admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rest_approve_on_resolved_request_reports_existing_outcome() {
    let h = harness().await;
    let id = submit_request(&h, "kbase", "read_only").await;

    // Neither the denial nor the late approval may reach the backend.
    Mock::given(method("POST"))
        .and(path_regex_management())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.governance)
        .await;

    // Deny first via Slack.
    let body = interact_body(&button_click(ACTION_DENY, &id, "bob"));
    h.app
        .clone()
        .oneshot(signed_interact_request(&body, now()))
        .await
        .unwrap();

    // REST approve afterwards observes the denial instead of acting.
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/approvals/{id}/approve"))
                .header("authorization", "Bearer tok-admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "denied");
    assert_eq!(body["performed_by"], "bob");
}
