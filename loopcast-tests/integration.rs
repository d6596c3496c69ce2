//! Integration tests for Loopcast
//!
//! These tests drive a live `StreamProxy` over real loopback sockets, either
//! through an HTTP client or by writing raw request bytes, and check what a
//! media player would observe.

#[path = "integration/common.rs"]
mod common;

#[path = "integration/connection_limits.rs"]
mod connection_limits;
#[path = "integration/local_share.rs"]
mod local_share;
#[path = "integration/protocol_errors.rs"]
mod protocol_errors;
#[path = "integration/registration.rs"]
mod registration;
#[path = "integration/remote_failures.rs"]
mod remote_failures;
#[path = "integration/streaming.rs"]
mod streaming;
