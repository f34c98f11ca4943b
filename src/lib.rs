//! Tenant Access Gateway — library crate for integration testing.
//!
//! Mediates human approval of tenant access grants: requests come in over
//! HTTP, admins approve or deny from Slack, and approvals trigger a grant
//! call against the governance backend.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod governance;
pub mod models;
pub mod registry;
pub mod slack;
pub mod state;
