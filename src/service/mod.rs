//! Service engine (L3): composes diagnostic service PDUs, dispatches
//! exchanges over an [`isotp::Transport`](crate::isotp::Transport), and
//! classifies responses as positive, negative, or an in-progress
//! ResponsePending/BusyRepeatRequest that the exchange loop resolves on its
//! own.

pub mod cache;
pub mod dddi;
pub mod download;
pub mod dtc;
pub mod nrc;
pub mod periodic;
pub mod programming;
pub mod security;
pub mod session;

use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::codec::{self, Alfi};
use crate::error::{Error, Result};
use crate::isotp::Transport;
use crate::link::Link;
use nrc::NegativeResponseCode;
use session::SessionState;

/// Service identifiers used directly by this crate. Not exhaustive of
/// ISO 14229-1's SID space; services this crate doesn't compose a helper
/// for can still be reached via [`Client::exchange`] with a raw SID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Sid {
    DiagnosticSessionControl = 0x10,
    EcuReset = 0x11,
    ClearDiagnosticInformation = 0x14,
    ReadDtcInformation = 0x19,
    ReadDataByIdentifier = 0x22,
    ReadMemoryByAddress = 0x23,
    ReadScalingDataByIdentifier = 0x24,
    SecurityAccess = 0x27,
    CommunicationControl = 0x28,
    ReadDataByPeriodicIdentifier = 0x2A,
    DynamicallyDefineDataIdentifier = 0x2C,
    WriteDataByIdentifier = 0x2E,
    InputOutputControlByIdentifier = 0x2F,
    RoutineControl = 0x31,
    RequestDownload = 0x34,
    RequestUpload = 0x35,
    TransferData = 0x36,
    RequestTransferExit = 0x37,
    WriteMemoryByAddress = 0x3D,
    TesterPresent = 0x3E,
    AccessTimingParameter = 0x83,
    ControlDtcSetting = 0x85,
}

/// Which deadline an exchange should use while waiting for its first
/// response frame. Services expected to take longer use `Extended` (P2*)
/// up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    Default,
    Extended,
}

/// The outcome of one exchange: either the positive response payload (bytes
/// after the echoed SID) or a structured failure already carrying
/// [`Error::NegativeResponse`]'s fields when applicable. Transport/protocol
/// failures propagate as `Err` directly; this alias exists so call sites
/// read naturally.
pub type Exchange = Result<Vec<u8>>;

/// The diagnostic service client: owns the transport, session timing, and
/// session/security/comm-control state for one conversation.
pub struct Client<L: Link> {
    transport: Transport<L>,
    session: SessionState,
    last_request_at: Option<Instant>,
    /// Minimum gap enforced between successive requests (inter-request
    /// gap), distinct from STmin which governs intra-message frame gaps.
    min_request_gap: Duration,
}

impl<L: Link> Client<L> {
    pub fn new(transport: Transport<L>) -> Self {
        Self {
            transport,
            session: SessionState::default(),
            last_request_at: None,
            min_request_gap: Duration::from_millis(0),
        }
    }

    pub fn transport(&self) -> &Transport<L> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<L> {
        &mut self.transport
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    fn sleep_for_min_gap(&mut self) {
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < self.min_request_gap {
                std::thread::sleep(self.min_request_gap - elapsed);
            }
        }
        self.last_request_at = Some(Instant::now());
    }

    fn deadline_for(&self, deadline: Deadline) -> Duration {
        match deadline {
            Deadline::Default => self.session.p2,
            Deadline::Extended => self.session.p2_star,
        }
    }

    /// Sends `[sid][payload]` and classifies the response: ResponsePending
    /// (0x78) loops while the peer keeps signalling progress,
    /// BusyRepeatRequest (0x21) earns exactly one re-listen, any other
    /// negative reason is returned structured, and a non-matching SID is a
    /// protocol violation.
    pub fn exchange(&mut self, sid: u8, payload: &[u8], deadline: Deadline) -> Exchange {
        self.exchange_with(sid, payload, deadline, true)
    }

    /// Like [`Client::exchange`] but, when `expect_response` is false
    /// (the request's sub-function suppress bit was set), returns
    /// immediately after sending without waiting for a reply.
    pub fn exchange_with(
        &mut self,
        sid: u8,
        payload: &[u8],
        deadline: Deadline,
        expect_response: bool,
    ) -> Exchange {
        self.sleep_for_min_gap();
        let mut request = Vec::with_capacity(1 + payload.len());
        request.push(sid);
        request.extend_from_slice(payload);
        trace!(target: "service", "tx sid=0x{:02X} payload={:02X?}", sid, payload);
        self.transport.send_sdu(&request)?;

        if !expect_response {
            debug!(target: "service", "sid=0x{:02X}: response suppressed, not waiting", sid);
            return Ok(Vec::new());
        }

        self.classify(sid, self.deadline_for(deadline))
    }

    fn classify(&mut self, request_sid: u8, first_deadline: Duration) -> Exchange {
        let sdu = self.transport.recv_sdu(first_deadline)?;
        self.interpret(request_sid, sdu)
    }

    fn interpret(&mut self, request_sid: u8, sdu: Vec<u8>) -> Exchange {
        self.interpret_with_busy_budget(request_sid, sdu, false)
    }

    /// `busy_retried` tracks whether the one BusyRepeatRequest re-listen
    /// spec.md §4.3.1/§4.4 grants has already been spent for this response
    /// chain, so a second consecutive 0x21 is a structured failure rather
    /// than another retry.
    fn interpret_with_busy_budget(
        &mut self,
        request_sid: u8,
        sdu: Vec<u8>,
        busy_retried: bool,
    ) -> Exchange {
        let Some(&first) = sdu.first() else {
            return Err(Error::ProtocolViolation("empty response SDU".to_string()));
        };

        if first == 0x7F {
            let echoed_sid = *sdu.get(1).ok_or_else(|| {
                Error::ProtocolViolation("negative response missing echoed SID".to_string())
            })?;
            let nrc_byte = *sdu.get(2).ok_or_else(|| {
                Error::ProtocolViolation("negative response missing NRC".to_string())
            })?;
            let nrc = NegativeResponseCode::from_byte(nrc_byte);

            if echoed_sid != request_sid {
                return Err(Error::ProtocolViolation(format!(
                    "negative response echoes sid 0x{:02X}, expected 0x{:02X}",
                    echoed_sid, request_sid
                )));
            }

            if nrc.is_response_pending() {
                debug!(target: "service", "sid=0x{:02X}: response pending, waiting P2*", request_sid);
                return self.classify(request_sid, self.session.p2_star);
            }

            if nrc.is_busy_repeat() && !busy_retried {
                debug!(target: "service", "sid=0x{:02X}: busy, one re-listen at P2", request_sid);
                let sdu = self.transport.recv_sdu(self.session.p2)?;
                return self.interpret_with_busy_budget(request_sid, sdu, true);
            }

            warn!(target: "service", "sid=0x{:02X}: negative response {}", request_sid, nrc);
            let data = sdu.get(3..).map(|b| b.to_vec()).unwrap_or_default();
            return Err(Error::NegativeResponse { request_sid, nrc, data });
        }

        let expected_positive = request_sid.wrapping_add(0x40);
        if first != expected_positive {
            return Err(Error::ProtocolViolation(format!(
                "unexpected response sid 0x{:02X}, expected 0x{:02X} or 0x7F",
                first, expected_positive
            )));
        }

        Ok(sdu[1..].to_vec())
    }

    /// DiagnosticSessionControl (0x10): requests `session_id`, adopts the
    /// ECU's reported P2/P2* on success.
    pub fn diagnostic_session_control(&mut self, session_id: u8) -> Exchange {
        let payload = self.exchange(Sid::DiagnosticSessionControl as u8, &[session_id], Deadline::Default)?;
        if payload.len() >= 5 {
            let p2_ms = codec::from_be16(&payload[1..3]).unwrap_or(0);
            let p2_star_tens_ms = codec::from_be16(&payload[3..5]).unwrap_or(0);
            let p2_ms = if p2_ms == 0 { 50 } else { p2_ms as u64 };
            let p2_star_ms = (p2_star_tens_ms as u64) * 10;
            let p2_star_ms = if p2_star_ms < 500 { 500 } else { p2_star_ms };
            self.session.p2 = Duration::from_millis(p2_ms);
            self.session.p2_star = Duration::from_millis(p2_star_ms);
        }
        self.session.current_session = session_id;
        self.session.security_level = None;
        Ok(payload)
    }

    /// EcuReset (0x11).
    pub fn ecu_reset(&mut self, reset_type: u8) -> Exchange {
        self.exchange(Sid::EcuReset as u8, &[reset_type], Deadline::Default)
    }

    /// TesterPresent (0x3E). `suppress` requests the server not reply.
    pub fn tester_present(&mut self, suppress: bool) -> Exchange {
        let sub = if suppress { 0x80 } else { 0x00 };
        self.exchange_with(Sid::TesterPresent as u8, &[sub], Deadline::Default, !suppress)
    }

    /// SecurityAccess seed request: odd sub-function `(level << 1) | 1`.
    pub fn security_access_request_seed(&mut self, level: u8) -> Exchange {
        let sub = (level << 1) | 1;
        self.exchange(Sid::SecurityAccess as u8, &[sub], Deadline::Default)
    }

    /// SecurityAccess key submission: even sub-function `(level << 1)`.
    pub fn security_access_send_key(&mut self, level: u8, key: &[u8]) -> Exchange {
        let sub = level << 1;
        let mut payload = vec![sub];
        payload.extend_from_slice(key);
        let result = self.exchange(Sid::SecurityAccess as u8, &payload, Deadline::Default);
        if result.is_ok() {
            self.session.security_level = Some(level);
        }
        result
    }

    /// ReadDataByIdentifier (0x22).
    pub fn read_data_by_identifier(&mut self, did: u16) -> Exchange {
        self.exchange(
            Sid::ReadDataByIdentifier as u8,
            &codec::be16(did),
            Deadline::Default,
        )
    }

    /// ReadScalingDataByIdentifier (0x24) — same shape as
    /// ReadDataByIdentifier, dropped by the distilled spec but present in
    /// the original service catalogue.
    pub fn read_scaling_data_by_identifier(&mut self, did: u16) -> Exchange {
        self.exchange(
            Sid::ReadScalingDataByIdentifier as u8,
            &codec::be16(did),
            Deadline::Default,
        )
    }

    /// WriteDataByIdentifier (0x2E).
    pub fn write_data_by_identifier(&mut self, did: u16, data: &[u8]) -> Exchange {
        let mut payload = codec::be16(did).to_vec();
        payload.extend_from_slice(data);
        self.exchange(Sid::WriteDataByIdentifier as u8, &payload, Deadline::Default)
    }

    /// ReadMemoryByAddress (0x23), convenience 32-bit address/size form.
    pub fn read_memory_by_address(&mut self, address: u32, size: u32) -> Exchange {
        let payload = Alfi::FULL_32.encode_address_and_size(address, size);
        self.exchange(Sid::ReadMemoryByAddress as u8, &payload, Deadline::Extended)
    }

    /// ReadMemoryByAddress (0x23), explicit ALFI for OEM-narrow formats.
    pub fn read_memory_by_address_with_alfi(&mut self, alfi: Alfi, address: u32, size: u32) -> Exchange {
        let payload = alfi.encode_address_and_size(address, size);
        self.exchange(Sid::ReadMemoryByAddress as u8, &payload, Deadline::Extended)
    }

    /// WriteMemoryByAddress (0x3D), convenience 32-bit address/size form.
    pub fn write_memory_by_address(&mut self, address: u32, data: &[u8]) -> Exchange {
        let mut payload = Alfi::FULL_32.encode_address_and_size(address, data.len() as u32);
        payload.extend_from_slice(data);
        self.exchange(Sid::WriteMemoryByAddress as u8, &payload, Deadline::Extended)
    }

    /// RoutineControl (0x31): `action` is 0x01 start, 0x02 stop, 0x03
    /// request results.
    pub fn routine_control(&mut self, action: u8, routine_id: u16, record: &[u8]) -> Exchange {
        let mut payload = vec![action];
        payload.extend_from_slice(&codec::be16(routine_id));
        payload.extend_from_slice(record);
        self.exchange(Sid::RoutineControl as u8, &payload, Deadline::Extended)
    }

    /// ClearDiagnosticInformation (0x14): `group` is the 3-byte DTC group
    /// mask (0xFFFFFF clears all).
    pub fn clear_diagnostic_information(&mut self, group: u32) -> Exchange {
        let payload = codec::be_bytes(group, 3);
        self.exchange(
            Sid::ClearDiagnosticInformation as u8,
            &payload,
            Deadline::Extended,
        )
    }

    /// ReadDTCInformation (0x19).
    pub fn read_dtc_information(&mut self, sub_function: u8, record: &[u8]) -> Exchange {
        let mut payload = vec![sub_function];
        payload.extend_from_slice(record);
        self.exchange(Sid::ReadDtcInformation as u8, &payload, Deadline::Extended)
    }

    /// CommunicationControl (0x28): mirrors the requested rx/tx mute state
    /// into the transport on success. `suppress` requests
    /// no reply, in which case the mirror still applies (the request was
    /// accepted by convention once sent).
    pub fn communication_control(&mut self, control_type: u8, comm_type: u8, suppress: bool) -> Exchange {
        let sub = if suppress { control_type | 0x80 } else { control_type };
        let payload = [sub, comm_type];
        let result =
            self.exchange_with(Sid::CommunicationControl as u8, &payload, Deadline::Default, !suppress);
        if result.is_ok() {
            match control_type & 0x7F {
                0x00 => {
                    self.transport.set_rx_enabled(true);
                    self.transport.set_tx_enabled(true);
                }
                // 0x01 EnableRxDisableTx (listen-only): rx stays enabled, tx is muted.
                0x01 => self.transport.set_tx_enabled(false),
                // 0x02 DisableRxEnableTx (transmit-only): tx stays enabled, rx is muted.
                0x02 => self.transport.set_rx_enabled(false),
                0x03 => {
                    self.transport.set_rx_enabled(false);
                    self.transport.set_tx_enabled(false);
                }
                _ => {}
            }
        }
        result
    }

    /// ControlDTCSetting (0x85): mirrors the "DTC logging enabled" flag on
    /// success.
    pub fn control_dtc_setting(&mut self, setting_type: u8, suppress: bool) -> Exchange {
        let sub = if suppress { setting_type | 0x80 } else { setting_type };
        let result =
            self.exchange_with(Sid::ControlDtcSetting as u8, &[sub], Deadline::Default, !suppress);
        if result.is_ok() {
            match setting_type & 0x7F {
                0x01 => self.session.dtc_logging_enabled = true,
                0x02 => self.session.dtc_logging_enabled = false,
                _ => {}
            }
        }
        result
    }

    /// AccessTimingParameter (0x83), supplemented from the original service
    /// catalogue. On a read-type sub-function (0x01/0x03) that returns P2/P2*
    /// bytes, adopts them the same way session control does.
    pub fn access_timing_parameters(&mut self, sub_function: u8, record: &[u8]) -> Exchange {
        let mut payload = vec![sub_function];
        payload.extend_from_slice(record);
        let response = self.exchange(Sid::AccessTimingParameter as u8, &payload, Deadline::Default)?;
        if response.len() >= 5 && matches!(sub_function, 0x01 | 0x03) {
            let p2_ms = codec::from_be16(&response[1..3]).unwrap_or(0).max(50) as u64;
            let p2_star_ms = (codec::from_be16(&response[3..5]).unwrap_or(0) as u64 * 10).max(500);
            self.session.p2 = Duration::from_millis(p2_ms);
            self.session.p2_star = Duration::from_millis(p2_star_ms);
        }
        Ok(response)
    }
}
