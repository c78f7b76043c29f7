//! Block upload/download (spec.md §4.3.3, §4.3.9, §4.3.10): RequestDownload/
//! RequestUpload → repeated TransferData → RequestTransferExit, with the
//! Idle/Downloading/Faulted state machine spec.md draws explicitly.
//! Grounded on `original_source/src/uds_programming.cpp::transfer_image`
//! for the chunking and counter-wrap control flow.

use log::warn;

use super::{Client, Deadline, Exchange, Sid};
use crate::codec::{self, Alfi};
use crate::error::{Error, Result};
use crate::link::Link;
use crate::service::nrc::NegativeResponseCode;

/// Data-transfer direction, matching the two request SIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

/// Where a block transfer sits in the state machine of spec.md §4.3.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Downloading { counter: u8 },
    Faulted,
}

/// Increments a block counter with the wrap this crate follows: 0xFF → 0x00
/// (spec.md §8 P4 and the Boundary Tests are explicit; see DESIGN.md for the
/// deviation from `original_source`'s 0xFF → 0x01).
fn next_counter(counter: u8) -> u8 {
    counter.wrapping_add(1)
}

/// Drives one block transfer (download or upload) over a [`Client`],
/// tracking the Idle/Downloading/Faulted state and the per-block counter.
/// One request per address pair may be outstanding (spec.md §3 invariant),
/// so this borrows the client for its lifetime.
pub struct TransferSession<'c, L: Link> {
    client: &'c mut Client<L>,
    direction: Direction,
    state: State,
    max_chunk: usize,
}

impl<'c, L: Link> TransferSession<'c, L> {
    /// RequestDownload (0x34) or RequestUpload (0x35), 32-bit
    /// address/size convenience form. `dfi` is the data-format identifier
    /// (compression/encryption method, 0x00 = none).
    pub fn request(
        client: &'c mut Client<L>,
        direction: Direction,
        dfi: u8,
        address: u32,
        size: u32,
    ) -> Result<Self> {
        Self::request_with_alfi(client, direction, dfi, Alfi::FULL_32, address, size)
    }

    /// Like [`TransferSession::request`] but with an explicit ALFI for
    /// OEM-narrow address/size formats.
    pub fn request_with_alfi(
        client: &'c mut Client<L>,
        direction: Direction,
        dfi: u8,
        alfi: Alfi,
        address: u32,
        size: u32,
    ) -> Result<Self> {
        let mut payload = vec![dfi];
        payload.extend(alfi.encode_address_and_size(address, size));
        let sid = match direction {
            Direction::Download => Sid::RequestDownload as u8,
            Direction::Upload => Sid::RequestUpload as u8,
        };
        let response = client.exchange(sid, &payload, Deadline::Extended)?;
        let lfi = *response.first().ok_or_else(|| {
            Error::ProtocolViolation("transfer response missing length format".to_string())
        })?;
        let len_width = (lfi >> 4) & 0x0F;
        if len_width == 0 {
            return Err(Error::ProtocolViolation(
                "RequestDownload response has invalid lengthFormatIdentifier".to_string(),
            ));
        }
        let max_block_length = codec::from_be_bytes(&response[1..], len_width).ok_or_else(|| {
            Error::ProtocolViolation("transfer response max block length truncated".to_string())
        })?;
        if max_block_length == 0 {
            return Err(Error::ProtocolViolation(
                "maxNumberOfBlockLength is zero".to_string(),
            ));
        }
        // maxNumberOfBlockLength is the chunk size directly (matching
        // `uds_programming.cpp::transfer_image`, which applies no overhead
        // subtraction here).
        let max_chunk = (max_block_length as usize).max(1);
        Ok(Self {
            client,
            direction,
            state: State::Downloading { counter: 1 },
            max_chunk,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The usable TransferData payload size derived from the server's
    /// maxNumberOfBlockLength.
    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Sends the full `data` buffer as `ceil(len/max_chunk)` TransferData
    /// blocks (download direction), retrying exactly once per block on
    /// WrongBlockSequenceCounter (spec.md §4.3.3, §4.4).
    pub fn transfer_download(&mut self, data: &[u8]) -> Result<()> {
        if self.direction != Direction::Download {
            return Err(Error::ProtocolViolation(
                "transfer_download called on an upload session".to_string(),
            ));
        }
        for chunk in data.chunks(self.max_chunk) {
            self.send_block(chunk)?;
        }
        Ok(())
    }

    fn send_block(&mut self, chunk: &[u8]) -> Result<()> {
        let State::Downloading { counter } = self.state else {
            return Err(Error::ProtocolViolation(
                "transfer called outside the Downloading state".to_string(),
            ));
        };
        let mut payload = vec![counter];
        payload.extend_from_slice(chunk);
        match self.client.exchange(Sid::TransferData as u8, &payload, Deadline::Extended) {
            Ok(response) => {
                self.state = State::Downloading {
                    counter: next_counter(counter),
                };
                let _ = response;
                Ok(())
            }
            Err(Error::NegativeResponse { nrc, data, .. }) if nrc.is_wrong_block_sequence_counter() => {
                let server_counter = *data.first().unwrap_or(&counter);
                warn!(target: "service", "wrong block sequence counter, retrying at server-advised {server_counter:#04x}");
                self.retry_with_counter(server_counter, chunk)
            }
            Err(err) => {
                self.state = State::Faulted;
                Err(err)
            }
        }
    }

    /// Resends `chunk` at the counter the server echoed in a
    /// WrongBlockSequenceCounter response (spec.md §4.3.3, §4.4 — exactly
    /// one retry).
    fn retry_with_counter(&mut self, counter: u8, chunk: &[u8]) -> Result<()> {
        let mut payload = vec![counter];
        payload.extend_from_slice(chunk);
        match self.client.exchange(Sid::TransferData as u8, &payload, Deadline::Extended) {
            Ok(_) => {
                self.state = State::Downloading {
                    counter: next_counter(counter),
                };
                Ok(())
            }
            Err(err) => {
                self.state = State::Faulted;
                Err(err)
            }
        }
    }

    /// Requests one block of upload data (the server sends the chunk back
    /// in the TransferData response).
    pub fn transfer_upload_block(&mut self) -> Result<Vec<u8>> {
        if self.direction != Direction::Upload {
            return Err(Error::ProtocolViolation(
                "transfer_upload_block called on a download session".to_string(),
            ));
        }
        let State::Downloading { counter } = self.state else {
            return Err(Error::ProtocolViolation(
                "transfer called outside the Downloading state".to_string(),
            ));
        };
        let response = self
            .client
            .exchange(Sid::TransferData as u8, &[counter], Deadline::Extended)
            .map_err(|err| {
                self.state = State::Faulted;
                err
            })?;
        self.state = State::Downloading {
            counter: next_counter(counter),
        };
        Ok(response.get(1..).unwrap_or(&[]).to_vec())
    }

    /// RequestTransferExit (0x37), with an optional checksum/trailer
    /// record. Transitions back to Idle on success.
    pub fn finish(mut self, record: &[u8]) -> Exchange {
        let response = self
            .client
            .exchange(Sid::RequestTransferExit as u8, record, Deadline::Extended)
            .map_err(|err| {
                self.state = State::Faulted;
                err
            })?;
        self.state = State::Idle;
        Ok(response)
    }
}

/// True if `nrc` is one of the two reasons the block-transfer loop handles
/// in place rather than surfacing as a fatal failure at the session level
/// (spec.md §4.4). Exposed for callers building their own retry policy atop
/// [`TransferSession`].
pub fn is_recoverable(nrc: NegativeResponseCode) -> bool {
    nrc.is_wrong_block_sequence_counter()
}
