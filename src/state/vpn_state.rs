use std::fmt;

/// Observable state of the VPN egress identity
///
/// `Ready ⇄ Rotating → Terminated`. Terminated is final for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VpnState {
    /// Connected; page loads may proceed
    Ready,

    /// Tripped; disconnect and reconnect in progress
    Rotating,

    /// Rotation budget exhausted; no further loads are allowed
    Terminated,
}

impl VpnState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// True while rotation is still permitted
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Terminated)
    }
}

impl fmt::Display for VpnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "ready",
            Self::Rotating => "rotating",
            Self::Terminated => "terminated",
        };
        write!(f, "{}", name)
    }
}
