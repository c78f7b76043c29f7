//! # uds-rs
//!
//! A client-side diagnostic stack for vehicle ECUs: a segmentation/
//! reassembly transport ([`isotp`], ISO 15765-2) carrying request/response
//! exchanges between a tester and an ECU over CAN, and a session-oriented
//! diagnostic service protocol ([`service`], ISO 14229-1) layered on top.
//!
//! The stack is three layers, leaves first:
//!
//! - [`link`] (L1) — send/receive 8-byte CAN frames through a small
//!   `Link` capability trait. [`link::loopback::LoopbackLink`] is an
//!   in-memory pair for tests and examples; the `slcan` feature adds
//!   [`link::slcan::SerialLink`], a reference adapter over a real serial
//!   port.
//! - [`isotp`] (L2) — segments a variable-length service data unit (up to
//!   4095 bytes) into 8-byte frames and reassembles them, under
//!   receiver-driven flow control.
//! - [`service`] (L3) — composes diagnostic service PDUs on top of
//!   [`isotp::Transport`], dispatches exchanges, and handles negative
//!   responses, timing negotiation, and block upload/download.
//!
//! ```
//! use std::time::Duration;
//! use uds_rs::isotp::{Transport, TransportConfig};
//! use uds_rs::link::{loopback::LoopbackLink, Address};
//! use uds_rs::service::Client;
//!
//! let (tester_link, ecu_link) = LoopbackLink::pair();
//! let mut client = Client::new(Transport::new(
//!     tester_link,
//!     Address::physical(0x7E0, 0x7E8),
//!     TransportConfig::default(),
//! ));
//! let mut ecu = Transport::new(
//!     ecu_link,
//!     Address::physical(0x7E8, 0x7E0),
//!     TransportConfig::default(),
//! );
//!
//! std::thread::scope(|s| {
//!     s.spawn(move || {
//!         let request = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
//!         assert_eq!(request, vec![0x22, 0xF1, 0x90]);
//!         ecu.send_sdu(&[0x62, 0xF1, 0x90, b'V', b'I', b'N']).unwrap();
//!     });
//!     let payload = client.read_data_by_identifier(0xF190).unwrap();
//!     assert_eq!(payload, vec![0xF1, 0x90, b'V', b'I', b'N']);
//! });
//! ```

pub mod codec;
pub mod error;
pub mod isotp;
pub mod link;
pub mod service;

pub use error::{Error, Result};
pub use service::Client;
