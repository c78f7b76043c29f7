//! Periodic data streaming (spec.md §4.3.7): ReadDataByPeriodicIdentifier
//! (0x2A) enables ECU-initiated delivery; the engine then pulls unsolicited
//! frames with a caller-supplied deadline.

use super::{Client, Deadline, Exchange, Sid};
use crate::error::{Error, Result};
use crate::link::Link;

/// Transmission rate classes for periodic identifiers (ISO 14229-1
/// Table 59).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodicRate {
    Slow,
    Medium,
    Fast,
    /// Stops periodic transmission of the given identifiers.
    StopSending,
}

impl PeriodicRate {
    fn to_byte(self) -> u8 {
        match self {
            PeriodicRate::Slow => 0x01,
            PeriodicRate::Medium => 0x02,
            PeriodicRate::Fast => 0x03,
            PeriodicRate::StopSending => 0x04,
        }
    }
}

/// One periodic identifier's current value, as delivered in an unsolicited
/// frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicSample {
    pub periodic_did: u8,
    pub data: Vec<u8>,
}

impl<L: Link> Client<L> {
    /// ReadDataByPeriodicIdentifier (0x2A): enables (or stops) streaming of
    /// `identifiers` at the given rate.
    pub fn read_data_by_periodic_identifier(
        &mut self,
        rate: PeriodicRate,
        identifiers: &[u8],
    ) -> Exchange {
        let mut payload = vec![rate.to_byte()];
        payload.extend_from_slice(identifiers);
        self.exchange(
            Sid::ReadDataByPeriodicIdentifier as u8,
            &payload,
            Deadline::Default,
        )
    }

    /// Pulls one unsolicited periodic message within `deadline`. The
    /// response echo SID is `0x6A` (0x2A with the positive-response bit
    /// set), followed by `[periodicDID][data...]`.
    pub fn receive_periodic(&mut self, deadline: std::time::Duration) -> Result<PeriodicSample> {
        let sdu = self.transport_mut().recv_sdu(deadline)?;
        let &sid = sdu.first().ok_or_else(|| {
            Error::ProtocolViolation("empty periodic message".to_string())
        })?;
        if sid != 0x6A {
            return Err(Error::ProtocolViolation(format!(
                "unexpected periodic sid 0x{:02X}, expected 0x6A",
                sid
            )));
        }
        let periodic_did = *sdu.get(1).ok_or_else(|| {
            Error::ProtocolViolation("periodic message missing identifier".to_string())
        })?;
        Ok(PeriodicSample {
            periodic_did,
            data: sdu.get(2..).unwrap_or(&[]).to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isotp::{Transport, TransportConfig};
    use crate::link::{loopback::LoopbackLink, Address};
    use std::time::Duration;

    #[test]
    fn enables_and_receives_a_sample() {
        let (a, mut ecu) = LoopbackLink::pair();
        let mut client = Client::new(Transport::new(
            a,
            Address::physical(0x7E0, 0x7E8),
            TransportConfig::default(),
        ));
        std::thread::scope(|s| {
            s.spawn(move || {
                let req = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
                assert_eq!(req, vec![0x2A, 0x03, 0x01]);
                ecu.send_sdu(&[0x6A]).unwrap();
                ecu.send_sdu(&[0x6A, 0x01, 0xAB, 0xCD]).unwrap();
            });
            client
                .read_data_by_periodic_identifier(PeriodicRate::Fast, &[0x01])
                .unwrap();
            let sample = client.receive_periodic(Duration::from_millis(200)).unwrap();
            assert_eq!(sample.periodic_did, 0x01);
            assert_eq!(sample.data, vec![0xAB, 0xCD]);
        });
    }
}
