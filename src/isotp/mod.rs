//! Segmentation transport (L2): turns a variable-length SDU (1..4095 bytes)
//! into a sequence of 8-byte CAN frames and back, under receiver-driven flow
//! control, with a per-flow-control-frame deadline and running counters
//! exposed for diagnostics.

mod pci;

pub use pci::{FlowStatus, Pci};

use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::error::{Error, TransportAbort};
use crate::link::{Address, Frame, Link};

/// Per-conversation transport parameters.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    /// Frames the receiver accepts before requiring a new flow-control
    /// frame; 0 means unlimited.
    pub block_size: u8,
    /// Locally configured minimum gap between consecutive frames, raw wire
    /// encoding (see [`stmin_to_duration`]).
    pub stmin: u8,
    /// Deadline for the peer's flow-control frame after First Frame.
    pub n_bs: Duration,
    /// Deadline the receiver allows the sender for the next consecutive
    /// frame (also used as the sender's reply deadline to its own sends,
    /// mirroring `N_As` in the one-adapter-models-both-directions case).
    pub n_as: Duration,
    /// Deadline the sender allows the receiver to issue flow control
    /// between consecutive frames it already committed to.
    pub n_ar: Duration,
    /// Deadline a receiver grants the sender's side for its own frame gap.
    pub n_br: Duration,
    /// Deadline between consecutive frames on the receive path.
    pub n_cr: Duration,
    /// Maximum number of *wait* flow-control frames tolerated before
    /// aborting.
    pub max_wft: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            block_size: 0,
            stmin: 0,
            n_as: Duration::from_millis(50),
            n_ar: Duration::from_millis(1000),
            n_bs: Duration::from_millis(1000),
            n_br: Duration::from_millis(50),
            n_cr: Duration::from_millis(1000),
            max_wft: 10,
        }
    }
}

/// Decodes an STmin wire byte into the minimum inter-frame gap:
/// 0x00-0x7F is that many whole milliseconds, 0xF1-0xF9 is
/// 100-900 microseconds (rounded up to 1 ms, since most adapters can't
/// schedule sub-millisecond gaps), anything else is reserved and treated
/// as zero.
pub fn stmin_to_duration(byte: u8) -> Duration {
    match byte {
        0x00..=0x7F => Duration::from_millis(byte as u64),
        0xF1..=0xF9 => Duration::from_millis(1),
        _ => Duration::from_millis(0),
    }
}

/// Diagnostic counters a real client exposes for logging/telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub wait_frames_seen: u64,
    pub sequence_errors: u64,
}

/// The segmentation/reassembly engine for one conversation. Owns the
/// addressing, configuration, mute switches, and diagnostic counters; borrows
/// the link for the lifetime of each send/receive call.
pub struct Transport<L: Link> {
    link: L,
    address: Address,
    config: TransportConfig,
    rx_enabled: bool,
    tx_enabled: bool,
    stats: TransportStats,
}

impl<L: Link> Transport<L> {
    pub fn new(mut link: L, address: Address, config: TransportConfig) -> Self {
        link.set_address(address);
        Self {
            link,
            address,
            config,
            rx_enabled: true,
            tx_enabled: true,
            stats: TransportStats::default(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TransportConfig {
        &mut self.config
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Mirrors a CommunicationControl side-effect into the mute switches.
    pub fn set_rx_enabled(&mut self, enabled: bool) {
        self.rx_enabled = enabled;
    }

    pub fn set_tx_enabled(&mut self, enabled: bool) {
        self.tx_enabled = enabled;
    }

    pub fn rx_enabled(&self) -> bool {
        self.rx_enabled
    }

    pub fn tx_enabled(&self) -> bool {
        self.tx_enabled
    }

    fn send_frame(&mut self, data: &[u8]) -> crate::error::Result<()> {
        let frame = Frame::new(self.address.tx_id, data);
        trace!(target: "isotp", "tx id=0x{:X} data={}", frame.id, hex::encode(&frame.data));
        self.link
            .send(&frame)
            .map_err(|e| Error::LinkFailure(e.to_string()))?;
        self.stats.frames_sent += 1;
        Ok(())
    }

    fn recv_frame(&mut self, deadline: Duration) -> crate::error::Result<Frame> {
        loop {
            let now = Instant::now();
            let frame = self.link.receive(deadline).map_err(|e| {
                if e.kind == crate::link::LinkErrorKind::Timeout {
                    Error::Timeout
                } else {
                    Error::LinkFailure(e.to_string())
                }
            })?;
            if frame.id != self.address.rx_id {
                trace!(target: "isotp", "discarding frame id=0x{:X} (expected 0x{:X})", frame.id, self.address.rx_id);
                let elapsed = now.elapsed();
                if elapsed >= deadline {
                    return Err(Error::Timeout);
                }
                continue;
            }
            self.stats.frames_received += 1;
            trace!(target: "isotp", "rx id=0x{:X} data={}", frame.id, hex::encode(&frame.data));
            return Ok(frame);
        }
    }

    /// Sends `sdu` (1..4095 bytes), segmenting as needed.
    pub fn send_sdu(&mut self, sdu: &[u8]) -> crate::error::Result<()> {
        if !self.tx_enabled {
            return Err(TransportAbort::TxMuted.into());
        }
        if sdu.is_empty() || sdu.len() > 4095 {
            return Err(Error::ProtocolViolation(format!(
                "sdu length {} out of range 1..4095",
                sdu.len()
            )));
        }
        if sdu.len() <= 7 {
            let mut data = vec![Pci::single_frame(sdu.len() as u8)];
            data.extend_from_slice(sdu);
            return self.send_frame(&data);
        }

        let mut data = Pci::first_frame_header(sdu.len() as u16);
        data.extend_from_slice(&sdu[..6]);
        self.send_frame(&data)?;

        let (mut block_size, mut stmin) = self.wait_for_flow_control()?;
        let mut offset = 6usize;
        let mut seq = 1u8;
        let mut sent_in_block = 0u32;

        while offset < sdu.len() {
            let chunk_len = (sdu.len() - offset).min(7);
            let mut frame = vec![Pci::consecutive_frame(seq)];
            frame.extend_from_slice(&sdu[offset..offset + chunk_len]);
            if stmin > Duration::ZERO {
                std::thread::sleep(stmin);
            }
            self.send_frame(&frame)?;
            offset += chunk_len;
            seq = (seq + 1) % 16;
            sent_in_block += 1;

            if block_size != 0 && sent_in_block == block_size as u32 && offset < sdu.len() {
                let (next_bs, next_stmin) = self.wait_for_flow_control()?;
                block_size = next_bs;
                stmin = next_stmin.max(stmin_to_duration(self.config.stmin));
                sent_in_block = 0;
            }
        }
        Ok(())
    }

    /// Waits for one flow-control frame, handling *wait* retries and
    /// returning the effective `(block_size, stmin)` on *continue*.
    fn wait_for_flow_control(&mut self) -> crate::error::Result<(u8, Duration)> {
        let mut wait_count = 0u32;
        loop {
            let frame = self.recv_frame(self.config.n_bs)?;
            let pci = Pci::decode(&frame.data).ok_or_else(|| {
                Error::ProtocolViolation("expected flow control frame".to_string())
            })?;
            match pci {
                Pci::FlowControl { status, bs, stmin } => match status {
                    FlowStatus::Continue => {
                        let effective = stmin_to_duration(stmin)
                            .max(stmin_to_duration(self.config.stmin));
                        return Ok((bs, effective));
                    }
                    FlowStatus::Wait => {
                        wait_count += 1;
                        self.stats.wait_frames_seen += 1;
                        if wait_count > self.config.max_wft {
                            return Err(TransportAbort::WaitCapExceeded.into());
                        }
                        debug!(target: "isotp", "wait frame #{wait_count}, resetting N_Bs");
                        continue;
                    }
                    FlowStatus::Overflow => {
                        return Err(TransportAbort::PeerOverflow.into());
                    }
                },
                _ => {
                    return Err(Error::ProtocolViolation(
                        "expected flow control frame".to_string(),
                    ))
                }
            }
        }
    }

    /// Receives one SDU, blocking at most `deadline` for
    /// the first frame and `n_cr` between subsequent frames.
    pub fn recv_sdu(&mut self, deadline: Duration) -> crate::error::Result<Vec<u8>> {
        if !self.rx_enabled {
            return Err(TransportAbort::RxMuted.into());
        }
        let frame = self.recv_frame(deadline)?;
        let pci = Pci::decode(&frame.data)
            .ok_or_else(|| Error::ProtocolViolation("malformed PCI byte".to_string()))?;

        match pci {
            Pci::SingleFrame { len } => {
                let len = len as usize;
                if frame.data.len() < 1 + len {
                    return Err(Error::ProtocolViolation(
                        "single frame shorter than declared length".to_string(),
                    ));
                }
                Ok(frame.data[1..1 + len].to_vec())
            }
            Pci::FirstFrame { total_len } => {
                let total_len = total_len as usize;
                let mut buf = Vec::with_capacity(total_len);
                buf.extend_from_slice(&frame.data[2..8.min(frame.data.len())]);

                self.send_flow_control(FlowStatus::Continue)?;

                let mut expected_seq = 1u8;
                let mut since_fc = 0u32;
                while buf.len() < total_len {
                    let cf = self.recv_frame(self.config.n_cr)?;
                    let cf_pci = Pci::decode(&cf.data).ok_or_else(|| {
                        Error::ProtocolViolation("malformed consecutive frame".to_string())
                    })?;
                    match cf_pci {
                        Pci::ConsecutiveFrame { seq } => {
                            if seq != expected_seq {
                                self.stats.sequence_errors += 1;
                                warn!(target: "isotp", "sequence error: expected {expected_seq}, got {seq}");
                                return Err(TransportAbort::SequenceError.into());
                            }
                            let remaining = total_len - buf.len();
                            let take = remaining.min(cf.data.len() - 1);
                            buf.extend_from_slice(&cf.data[1..1 + take]);
                            expected_seq = (expected_seq + 1) % 16;
                            since_fc += 1;

                            if self.config.block_size != 0
                                && since_fc == self.config.block_size as u32
                                && buf.len() < total_len
                            {
                                self.send_flow_control(FlowStatus::Continue)?;
                                since_fc = 0;
                            }
                        }
                        _ => {
                            return Err(Error::ProtocolViolation(
                                "expected consecutive frame".to_string(),
                            ))
                        }
                    }
                }
                Ok(buf)
            }
            _ => Err(Error::ProtocolViolation(
                "expected single or first frame".to_string(),
            )),
        }
    }

    fn send_flow_control(&mut self, status: FlowStatus) -> crate::error::Result<()> {
        let frame = Pci::flow_control(status, self.config.block_size, self.config.stmin);
        self.send_frame(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::loopback::LoopbackLink;
    use std::time::Duration;

    fn pair() -> (Transport<LoopbackLink>, Transport<LoopbackLink>) {
        let (a, b) = LoopbackLink::pair();
        let addr_a = Address::physical(0x7E0, 0x7E8);
        let addr_b = Address::physical(0x7E8, 0x7E0);
        (
            Transport::new(a, addr_a, TransportConfig::default()),
            Transport::new(b, addr_b, TransportConfig::default()),
        )
    }

    #[test]
    fn single_frame_round_trips() {
        let (mut tester, mut ecu) = pair();
        std::thread::scope(|s| {
            let handle = s.spawn(|| ecu.recv_sdu(Duration::from_millis(200)).unwrap());
            tester.send_sdu(&[0x22, 0xF1, 0x90]).unwrap();
            let sdu = handle.join().unwrap();
            assert_eq!(sdu, vec![0x22, 0xF1, 0x90]);
        });
    }

    #[test]
    fn multi_frame_round_trips_with_block_size() {
        let (mut tester, mut ecu) = pair();
        tester.config_mut().block_size = 2;
        ecu.config_mut().block_size = 2;
        let payload: Vec<u8> = (0..20u8).collect();
        std::thread::scope(|s| {
            let handle = s.spawn(|| ecu.recv_sdu(Duration::from_millis(500)).unwrap());
            tester.send_sdu(&payload).unwrap();
            let sdu = handle.join().unwrap();
            assert_eq!(sdu, payload);
        });
    }

    #[test]
    fn tx_muted_fails_fast() {
        let (mut tester, _ecu) = pair();
        tester.set_tx_enabled(false);
        let err = tester.send_sdu(&[0x3E]).unwrap_err();
        assert!(matches!(err, Error::TransportAbort(TransportAbort::TxMuted)));
    }

    #[test]
    fn rx_muted_fails_fast() {
        let (_tester, mut ecu) = pair();
        ecu.set_rx_enabled(false);
        let err = ecu.recv_sdu(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, Error::TransportAbort(TransportAbort::RxMuted)));
    }

    #[test]
    fn recv_sdu_reports_timeout_not_link_failure_when_no_frame_arrives() {
        let (_tester, mut ecu) = pair();
        let err = ecu.recv_sdu(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[test]
    fn stmin_decoding_matches_spec_boundaries() {
        assert_eq!(stmin_to_duration(0x00), Duration::from_millis(0));
        assert_eq!(stmin_to_duration(0x7F), Duration::from_millis(127));
        assert_eq!(stmin_to_duration(0xF1), Duration::from_millis(1));
        assert_eq!(stmin_to_duration(0xF9), Duration::from_millis(1));
        assert_eq!(stmin_to_duration(0xFA), Duration::from_millis(0));
    }
}
