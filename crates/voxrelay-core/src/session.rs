//! Connection lifecycle shared by the relay and the client transport.

use std::fmt;

/// Lifecycle of one duplex connection.
///
/// `Connecting -> Open -> Closing -> Closed`; a reconnect starts a new
/// `Connecting` cycle with a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }

    pub fn is_open(self) -> bool {
        self == SessionState::Open
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
