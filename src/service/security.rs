//! SecurityAccess unlock flow (spec.md §4.3.5), grounded on
//! `original_source/src/uds_programming.cpp::unlock`'s seed→transform→key
//! sequence, expressed as a closure bound rather than a raw function
//! pointer (the original's `calc_key` callback).

use super::{Client, Exchange};
use crate::error::Error;
use crate::link::Link;

/// A pure seed-to-key transform, supplied by the caller (an external
/// collaborator per spec.md §6 — the algorithm itself is out of scope).
pub type SeedToKey<'a> = dyn FnMut(&[u8]) -> Vec<u8> + 'a;

impl<L: Link> Client<L> {
    /// Requests a seed at `level`, applies `transform`, and sends the
    /// resulting key at the same level. Returns the key-submission
    /// response payload. `InvalidKey`/`ExceededNumberOfAttempts`/
    /// `RequiredTimeDelayNotExpired` surface unmodified as
    /// [`Error::NegativeResponse`]; this crate implements no lockout
    /// back-off (spec.md §4.3.5 leaves that to the caller).
    pub fn security_access_unlock(&mut self, level: u8, transform: &mut SeedToKey<'_>) -> Exchange {
        let seed_response = self.security_access_request_seed(level)?;
        let seed = seed_response.get(1..).ok_or_else(|| {
            Error::ProtocolViolation("security access seed response too short".to_string())
        })?;
        if seed.iter().all(|&b| b == 0) && !seed.is_empty() {
            // An all-zero seed conventionally means the level is already
            // unlocked; nothing to send.
            return Ok(seed_response);
        }
        let key = transform(seed);
        self.security_access_send_key(level, &key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isotp::{Transport, TransportConfig};
    use crate::link::{loopback::LoopbackLink, Address};
    use std::time::Duration;

    #[test]
    fn unlock_sends_transformed_key() {
        let (a, mut ecu) = LoopbackLink::pair();
        let mut client = Client::new(Transport::new(
            a,
            Address::physical(0x7E0, 0x7E8),
            TransportConfig::default(),
        ));
        std::thread::scope(|s| {
            s.spawn(move || {
                let seed_req = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
                assert_eq!(seed_req, vec![0x27, 0x01]);
                ecu.send_sdu(&[0x67, 0x01, 0xAA, 0xBB]).unwrap();
                let key_req = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
                assert_eq!(key_req, vec![0x27, 0x02, 0x55, 0x44]);
                ecu.send_sdu(&[0x67, 0x02]).unwrap();
            });
            let mut xor = |seed: &[u8]| seed.iter().map(|b| b ^ 0xFF).collect::<Vec<u8>>();
            client.security_access_unlock(1, &mut xor).unwrap();
        });
        assert_eq!(client.session().security_level, Some(1));
    }
}
