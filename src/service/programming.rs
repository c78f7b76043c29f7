//! `ProgrammingSession`: a scoped convenience helper composing
//! `enter programming session → unlock → disable DTCs/comms → erase →
//! download → restore → reset`. Pure glue over [`Client`] — it adds no wire
//! behavior beyond the services `Client` already exposes.
//!
//! The disable-then-restore pattern is scope-bound restoration: this type
//! restores in [`Drop`] regardless of exit path, unless
//! [`ProgrammingSession::finish`] already did it. A failed restore is
//! logged, never allowed to mask the primary result.

use log::warn;

use super::download::{Direction, TransferSession};
use super::security::SeedToKey;
use super::session::Session;
use super::Client;
use crate::error::Result;
use crate::link::Link;

/// Routine-control action byte for "start routine" (used for erase, per
/// `uds_programming.cpp::erase_memory`).
const ROUTINE_START: u8 = 0x01;

pub struct ProgrammingSession<'c, L: Link> {
    client: &'c mut Client<L>,
    restore_dtc: bool,
    restore_comm: bool,
    restored: bool,
}

impl<'c, L: Link> ProgrammingSession<'c, L> {
    /// Enters the programming session (DiagnosticSessionControl 0x02).
    pub fn enter(client: &'c mut Client<L>) -> Result<Self> {
        client.diagnostic_session_control(Session::Programming.to_byte())?;
        Ok(Self {
            client,
            restore_dtc: false,
            restore_comm: false,
            restored: false,
        })
    }

    /// Requests a seed at `level` and sends the transformed key
    /// (SecurityAccess 0x27).
    pub fn unlock(&mut self, level: u8, transform: &mut SeedToKey<'_>) -> Result<()> {
        self.client.security_access_unlock(level, transform)?;
        Ok(())
    }

    /// Disables DTC logging (ControlDTCSetting 0x85, settingType=off) and
    /// marks it for restoration on exit.
    pub fn disable_dtcs(&mut self) -> Result<()> {
        self.client.control_dtc_setting(0x02, false)?;
        self.restore_dtc = true;
        Ok(())
    }

    /// Disables both rx and tx (CommunicationControl 0x28, subFunction=0x03,
    /// commType=0xFF) and marks it for restoration on exit.
    pub fn disable_comms(&mut self) -> Result<()> {
        self.client.communication_control(0x03, 0xFF, false)?;
        self.restore_comm = true;
        Ok(())
    }

    /// Starts an erase routine (RoutineControl 0x31, action=start).
    pub fn erase_memory(&mut self, routine_id: u16, erase_record: &[u8]) -> Result<Vec<u8>> {
        self.client
            .routine_control(ROUTINE_START, routine_id, erase_record)
    }

    /// Runs a full RequestDownload → TransferData* → RequestTransferExit
    /// sequence for `data`.
    pub fn download(&mut self, dfi: u8, address: u32, data: &[u8]) -> Result<()> {
        let mut session =
            TransferSession::request(self.client, Direction::Download, dfi, address, data.len() as u32)?;
        session.transfer_download(data)?;
        session.finish(&[])?;
        Ok(())
    }

    /// Restores communication and DTC logging (if disabled), then issues
    /// an ECU reset and consumes the session. Equivalent to
    /// `uds_programming.cpp::finalize`.
    pub fn finish(mut self, reset_type: u8) -> Result<()> {
        self.restore();
        self.client.ecu_reset(reset_type)?;
        Ok(())
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if self.restore_comm {
            if let Err(err) = self.client.communication_control(0x00, 0xFF, false) {
                warn!(target: "service", "failed to restore communication on exit: {err}");
            }
        }
        if self.restore_dtc {
            if let Err(err) = self.client.control_dtc_setting(0x01, false) {
                warn!(target: "service", "failed to restore DTC setting on exit: {err}");
            }
        }
    }
}

impl<'c, L: Link> Drop for ProgrammingSession<'c, L> {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isotp::{Transport, TransportConfig};
    use crate::link::{loopback::LoopbackLink, Address};
    use std::time::Duration;

    #[test]
    fn drop_restores_comms_and_dtcs_without_explicit_finish() {
        let (a, mut ecu) = LoopbackLink::pair();
        let mut client = Client::new(Transport::new(
            a,
            Address::physical(0x7E0, 0x7E8),
            TransportConfig::default(),
        ));
        std::thread::scope(|s| {
            s.spawn(move || {
                let enter = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
                assert_eq!(enter, vec![0x10, 0x02]);
                ecu.send_sdu(&[0x50, 0x02, 0x00, 0x32, 0x01, 0xF4]).unwrap();

                let disable_dtc = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
                assert_eq!(disable_dtc, vec![0x85, 0x02]);
                ecu.send_sdu(&[0xC5, 0x02]).unwrap();

                let disable_comm = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
                assert_eq!(disable_comm, vec![0x28, 0x03, 0xFF]);
                ecu.send_sdu(&[0x68, 0x03]).unwrap();

                let restore_comm = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
                assert_eq!(restore_comm, vec![0x28, 0x00, 0xFF]);
                ecu.send_sdu(&[0x68, 0x00]).unwrap();

                let restore_dtc = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
                assert_eq!(restore_dtc, vec![0x85, 0x01]);
                ecu.send_sdu(&[0xC5, 0x01]).unwrap();
            });

            {
                let mut session = ProgrammingSession::enter(&mut client).unwrap();
                session.disable_dtcs().unwrap();
                session.disable_comms().unwrap();
            }
        });
    }
}
