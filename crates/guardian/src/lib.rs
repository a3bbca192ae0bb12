//! Resource Guardian binary internals
//!
//! Split out of `main.rs` so the HTTP router can be exercised from tests.

pub mod api;
pub mod config;
