//! Gateway: HTTP entry point for the Signal REST API webhook.
//!
//! Deliveries are acknowledged immediately; each accepted message becomes one
//! background relay turn.

mod server;

pub use server::{build_state, router, run_gateway, GatewayState};
