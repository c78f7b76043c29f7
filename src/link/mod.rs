//! Frame link (L1): send/receive 8-byte CAN frames, filtered by identifier.
//!
//! A small capability trait stands in for the adapter, following
//! `libautomotive::types::Port` and `ecu_diagnostics::channel::PayloadChannel`:
//! a fixed, non-virtual set of operations rather than a class hierarchy. The
//! classifier that tells a [`Frame`] apart from plain bytes lives one layer up
//! in `isotp`; this layer only moves bytes.

pub mod loopback;
#[cfg(feature = "slcan")]
pub mod slcan;

use std::time::Instant;

/// An 11- or 29-bit CAN identifier pair, plus the addressing mode, set once
/// per conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    /// Identifier the tester transmits on (the ECU listens here).
    pub tx_id: u32,
    /// Identifier the tester listens on (the ECU transmits here).
    pub rx_id: u32,
    /// Point-to-point (`false`) vs broadcast-style (`true`) addressing.
    pub functional: bool,
    /// Whether `tx_id`/`rx_id` are 29-bit extended identifiers.
    pub extended: bool,
}

impl Address {
    /// Convenience constructor for the common physical/11-bit case.
    pub fn physical(tx_id: u32, rx_id: u32) -> Self {
        Self {
            tx_id,
            rx_id,
            functional: false,
            extended: false,
        }
    }

    /// Convenience constructor for functional (broadcast-style) addressing.
    pub fn functional(tx_id: u32, rx_id: u32) -> Self {
        Self {
            tx_id,
            rx_id,
            functional: true,
            extended: false,
        }
    }
}

/// A single CAN frame: identifier, 0-8 data bytes, and an optional receive
/// timestamp. Frames are plain owned values; nothing aliases them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// CAN arbitration identifier.
    pub id: u32,
    /// Data bytes, length 0..=8 (the Data Length Code).
    pub data: Vec<u8>,
    /// When the frame was received, if the link supplies timestamps.
    pub timestamp: Option<Instant>,
}

impl Frame {
    /// Builds a frame, truncating `data` to 8 bytes if longer.
    pub fn new(id: u32, data: &[u8]) -> Self {
        let len = data.len().min(8);
        Self {
            id,
            data: data[..len].to_vec(),
            timestamp: None,
        }
    }

    /// Data Length Code: number of valid bytes in `data`.
    pub fn dlc(&self) -> u8 {
        self.data.len() as u8
    }
}

/// Classification of a link-layer receive failure, so the transport above
/// can decide whether to retry or surface a [`crate::error::Error::LinkFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkErrorKind {
    /// No frame arrived before the caller's deadline.
    Timeout,
    /// The outbound queue is full (back-pressure).
    QueueFull,
    /// The adapter reported an underlying I/O failure.
    Io,
    /// The adapter signalled a CAN error frame (bus-off, ack error, ...).
    BusError,
}

/// Error produced by a [`Link`] implementation.
#[derive(Debug)]
pub struct LinkError {
    pub kind: LinkErrorKind,
    pub detail: String,
}

impl LinkError {
    pub fn new(kind: LinkErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(LinkErrorKind::Timeout, "no frame before deadline")
    }
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for LinkError {}

/// Capability set a CAN adapter must provide. Implementations may queue
/// outbound frames (bounded) and fail `send` when that queue is full; the
/// receive path must be able to discard frames for other identifiers without
/// consuming the caller's deadline budget, but filtering by rx id is done by
/// the transport above, not required here (an adapter that only sees one bus
/// can return everything it sees).
pub trait Link: Send + Sync {
    /// Set the addressing in effect for subsequent `send`/`receive` calls.
    fn set_address(&mut self, address: Address);

    /// Send one frame. Returns `Err` on a full outbound queue or I/O error.
    fn send(&mut self, frame: &Frame) -> std::result::Result<(), LinkError>;

    /// Block for at most `deadline` waiting for the next frame. Frames
    /// arrive in the order the adapter received them; no reordering.
    fn receive(&mut self, deadline: std::time::Duration)
        -> std::result::Result<Frame, LinkError>;
}

impl<T: Link + ?Sized> Link for Box<T> {
    fn set_address(&mut self, address: Address) {
        T::set_address(self, address)
    }

    fn send(&mut self, frame: &Frame) -> std::result::Result<(), LinkError> {
        T::send(self, frame)
    }

    fn receive(
        &mut self,
        deadline: std::time::Duration,
    ) -> std::result::Result<Frame, LinkError> {
        T::receive(self, deadline)
    }
}

impl<T: Link + ?Sized> Link for std::sync::Arc<std::sync::Mutex<T>> {
    fn set_address(&mut self, address: Address) {
        T::set_address(&mut self.lock().expect("link mutex poisoned"), address)
    }

    fn send(&mut self, frame: &Frame) -> std::result::Result<(), LinkError> {
        T::send(&mut self.lock().expect("link mutex poisoned"), frame)
    }

    fn receive(
        &mut self,
        deadline: std::time::Duration,
    ) -> std::result::Result<Frame, LinkError> {
        T::receive(&mut self.lock().expect("link mutex poisoned"), deadline)
    }
}
