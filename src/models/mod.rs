pub mod request;

pub use request::{AccessRequest, Decision, MessageRef, Permission, RequestStatus};
