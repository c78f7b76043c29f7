//! DynamicallyDefineDataIdentifier (0x2C), spec.md §4.3.6: three
//! sub-functions layered under one SID.

use super::{Client, Exchange, Sid, Deadline};
use crate::codec::{self, Alfi};
use crate::link::Link;

const DEFINE_BY_IDENTIFIER: u8 = 0x01;
const DEFINE_BY_MEMORY_ADDRESS: u8 = 0x02;
const CLEAR_DYNAMICALLY_DEFINED_DATA_IDENTIFIER: u8 = 0x03;

/// One (source identifier, byte offset, byte length) triple referenced by a
/// define-by-identifier request.
#[derive(Debug, Clone, Copy)]
pub struct SourceSpan {
    pub source_did: u16,
    pub position: u8,
    pub length: u8,
}

impl<L: Link> Client<L> {
    /// Defines `target_did` as the concatenation of the given source spans.
    pub fn dynamically_define_by_identifier(
        &mut self,
        target_did: u16,
        spans: &[SourceSpan],
    ) -> Exchange {
        let mut payload = vec![DEFINE_BY_IDENTIFIER];
        payload.extend_from_slice(&codec::be16(target_did));
        for span in spans {
            payload.extend_from_slice(&codec::be16(span.source_did));
            payload.push(span.position);
            payload.push(span.length);
        }
        self.exchange(
            Sid::DynamicallyDefineDataIdentifier as u8,
            &payload,
            Deadline::Default,
        )
    }

    /// Defines `target_did` as the concatenation of the given
    /// (address, size) memory spans, encoded per the given ALFI.
    pub fn dynamically_define_by_memory_address(
        &mut self,
        target_did: u16,
        alfi: Alfi,
        spans: &[(u32, u32)],
    ) -> Exchange {
        let mut payload = vec![DEFINE_BY_MEMORY_ADDRESS];
        payload.extend_from_slice(&codec::be16(target_did));
        payload.push(alfi.to_byte());
        for &(address, size) in spans {
            payload.extend_from_slice(&codec::be_bytes(address, alfi.address_width));
            payload.extend_from_slice(&codec::be_bytes(size, alfi.size_width));
        }
        self.exchange(
            Sid::DynamicallyDefineDataIdentifier as u8,
            &payload,
            Deadline::Default,
        )
    }

    /// Clears a previously defined dynamic identifier.
    pub fn clear_dynamically_defined_data_identifier(&mut self, target_did: u16) -> Exchange {
        let mut payload = vec![CLEAR_DYNAMICALLY_DEFINED_DATA_IDENTIFIER];
        payload.extend_from_slice(&codec::be16(target_did));
        self.exchange(
            Sid::DynamicallyDefineDataIdentifier as u8,
            &payload,
            Deadline::Default,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isotp::{Transport, TransportConfig};
    use crate::link::{loopback::LoopbackLink, Address};
    use std::time::Duration;

    #[test]
    fn define_by_identifier_concatenates_spans() {
        let (a, mut ecu) = LoopbackLink::pair();
        let mut client = Client::new(Transport::new(
            a,
            Address::physical(0x7E0, 0x7E8),
            TransportConfig::default(),
        ));
        std::thread::scope(|s| {
            s.spawn(move || {
                let req = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
                assert_eq!(
                    req,
                    vec![0x2C, 0x01, 0xF3, 0x00, 0xF1, 0x90, 0x01, 0x02]
                );
                ecu.send_sdu(&[0x6C, 0x01, 0xF3, 0x00]).unwrap();
            });
            client
                .dynamically_define_by_identifier(
                    0xF300,
                    &[SourceSpan {
                        source_did: 0xF190,
                        position: 1,
                        length: 2,
                    }],
                )
                .unwrap();
        });
    }
}
