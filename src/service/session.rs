//! Session, security, and timing state held by the service engine
//! (spec.md §3 "Session state"). One owned record per conversation; no
//! global state, per spec.md §9.

use std::time::Duration;

/// Default P2: 50 ms server response deadline before any session-control
/// exchange has run.
pub const DEFAULT_P2: Duration = Duration::from_millis(50);
/// Default P2*: 5000 ms extended deadline while ResponsePending continues.
pub const DEFAULT_P2_STAR: Duration = Duration::from_millis(5000);

/// The well-known diagnostic session identifiers (ISO 14229-1 Table 29).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    Default,
    Programming,
    Extended,
    SafetySystem,
    Other(u8),
}

impl Session {
    pub fn to_byte(self) -> u8 {
        match self {
            Session::Default => 0x01,
            Session::Programming => 0x02,
            Session::Extended => 0x03,
            Session::SafetySystem => 0x04,
            Session::Other(byte) => byte,
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => Session::Default,
            0x02 => Session::Programming,
            0x03 => Session::Extended,
            0x04 => Session::SafetySystem,
            other => Session::Other(other),
        }
    }
}

/// Everything the engine tracks across exchanges within one conversation:
/// active session, negotiated timing, security unlock level, and the
/// DTC-logging-enabled flag mirrored from ControlDTCSetting.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub current_session: u8,
    pub p2: Duration,
    pub p2_star: Duration,
    /// `Some(level)` once a SecurityAccess key has been accepted at that
    /// level; any session transition drops it back to `None` (spec.md
    /// §4.3.9: "Security is level-scoped and is implicitly dropped by any
    /// session transition").
    pub security_level: Option<u8>,
    pub dtc_logging_enabled: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_session: Session::Default.to_byte(),
            p2: DEFAULT_P2,
            p2_star: DEFAULT_P2_STAR,
            security_level: None,
            dtc_logging_enabled: true,
        }
    }
}
