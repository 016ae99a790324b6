//! Shared helpers for integration tests.

#![allow(dead_code)]

#[cfg(unix)]
pub mod fake_tool;
pub mod socket_guard;
pub mod stall_server;
