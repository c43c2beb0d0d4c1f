//! VPN egress rotation
//!
//! A [`VpnRotator`] is the process-wide view of the network identity. Tripping
//! it hands a rotation request to a background task that disconnects and
//! reconnects through a [`Reconnector`], within a bounded rotation budget.

mod reconnect;
mod rotator;

pub use reconnect::{CommandReconnector, Reconnector};
pub use rotator::VpnRotator;

use std::time::Duration;
use thiserror::Error;

/// Errors raised while driving the VPN client
#[derive(Debug, Error)]
pub enum VpnError {
    #[error("No {0} command configured")]
    NoCommand(&'static str),

    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited with status {code:?}")]
    Command { command: String, code: Option<i32> },

    #[error("Reconnect did not finish within {0:?}")]
    Timeout(Duration),
}
