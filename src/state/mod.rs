//! State module for tracking scrape progress
//!
//! # Components
//!
//! - `QueryState`: lifecycle of a single query (pending, in flight, success, ...)
//! - `VpnState`: readiness of the shared VPN egress identity

mod query_state;
mod vpn_state;

// Re-export main types
pub use query_state::QueryState;
pub use vpn_state::VpnState;
