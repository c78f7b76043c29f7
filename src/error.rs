//! Crate-wide error taxonomy.
//!
//! Five non-overlapping variants, matching the client-visible result shape a
//! diagnostic stack needs: every call resolves to success or one of these,
//! never a parsed-prose message.

use std::fmt;

use crate::service::nrc::NegativeResponseCode;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Reason a transport-level exchange was aborted before a response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAbort {
    /// A consecutive frame's sequence number did not match the expected one.
    SequenceError,
    /// No flow-control frame arrived before N_Bs (or N_Bs after a wait frame).
    FlowControlTimeout,
    /// The receiver kept sending `wait` flow-control frames past `max_wft`.
    WaitCapExceeded,
    /// The peer signalled a flow-control overflow.
    PeerOverflow,
    /// `tx_enabled` was false; the send path refused to run.
    TxMuted,
    /// `rx_enabled` was false; the receive path refused to run.
    RxMuted,
}

impl fmt::Display for TransportAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportAbort::SequenceError => write!(f, "consecutive frame sequence error"),
            TransportAbort::FlowControlTimeout => write!(f, "flow control timeout"),
            TransportAbort::WaitCapExceeded => write!(f, "flow control wait-frame cap exceeded"),
            TransportAbort::PeerOverflow => write!(f, "peer signalled flow control overflow"),
            TransportAbort::TxMuted => write!(f, "transmit direction is muted"),
            TransportAbort::RxMuted => write!(f, "receive direction is muted"),
        }
    }
}

/// The five error kinds a diagnostic exchange can resolve to.
#[derive(Debug)]
pub enum Error {
    /// No reply arrived within the applicable deadline.
    Timeout,
    /// The transport aborted the exchange (sequence error, flow control
    /// timeout, wait-cap exceeded, peer overflow, or a muted direction).
    TransportAbort(TransportAbort),
    /// The server returned `0x7F <request SID> <NRC>`, optionally followed
    /// by reason-specific trailing bytes (e.g. WrongBlockSequenceCounter's
    /// echoed block counter).
    NegativeResponse {
        /// The service identifier that was rejected.
        request_sid: u8,
        /// The negative response code reported by the server.
        nrc: NegativeResponseCode,
        /// Bytes following the NRC byte, if the server sent any.
        data: Vec<u8>,
    },
    /// A frame arrived but was not a valid positive or negative response:
    /// wrong SID echo, a short frame, a malformed ALFI, and similar.
    ProtocolViolation(String),
    /// The underlying link reported an I/O failure.
    LinkFailure(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Timeout => write!(f, "timed out waiting for a response"),
            Error::TransportAbort(reason) => write!(f, "transport aborted: {}", reason),
            Error::NegativeResponse { request_sid, nrc, .. } => write!(
                f,
                "negative response to service 0x{:02X}: {}",
                request_sid, nrc
            ),
            Error::ProtocolViolation(detail) => write!(f, "protocol violation: {}", detail),
            Error::LinkFailure(detail) => write!(f, "link failure: {}", detail),
        }
    }
}

impl std::error::Error for Error {}

impl From<TransportAbort> for Error {
    fn from(reason: TransportAbort) -> Self {
        Error::TransportAbort(reason)
    }
}
