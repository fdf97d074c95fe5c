//! Integration tests for rewind
//!
//! These tests drive a monitored app and a monitor against each other.

#[path = "../common/mod.rs"]
pub mod common;

pub mod export_flow;
pub mod monitor_flow;
