//! End-to-end transport scenarios (spec.md §8) over an in-memory pair of
//! [`LoopbackLink`]s, in the teacher's `tests/transport_test.rs` style: a
//! mock endpoint stands in for the CAN bus instead of real hardware.

use std::thread;
use std::time::Duration;

use uds_rs::error::{Error, TransportAbort};
use uds_rs::isotp::{Transport, TransportConfig};
use uds_rs::link::{loopback::LoopbackLink, Address};

fn pair(config: TransportConfig) -> (Transport<LoopbackLink>, Transport<LoopbackLink>) {
    let (a, b) = LoopbackLink::pair();
    let addr_a = Address::physical(0x7E0, 0x7E8);
    let addr_b = Address::physical(0x7E8, 0x7E0);
    (
        Transport::new(a, addr_a, config),
        Transport::new(b, addr_b, config),
    )
}

/// P1: an SDU sent through `send_sdu` reassembles to the same bytes on the
/// far end, across the single-frame/multi-frame boundary (lengths 1, 6, 7,
/// 8, 4095).
#[test]
fn p1_round_trips_every_boundary_length() {
    for len in [1usize, 6, 7, 8, 4095] {
        let (mut tester, mut ecu) = pair(TransportConfig::default());
        let sdu: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
        let expected = sdu.clone();
        thread::scope(|s| {
            let handle = s.spawn(|| ecu.recv_sdu(Duration::from_secs(2)).unwrap());
            tester.send_sdu(&sdu).unwrap();
            assert_eq!(handle.join().unwrap(), expected);
        });
    }
}

/// P2: with block_size=2, the receiver sees exactly 2 consecutive frames
/// between flow-control frames (S6's worked scenario, block_size=2,
/// stmin=0, total 20 bytes, final CF padding discarded).
#[test]
fn p2_and_s6_multiframe_receive_respects_block_size() {
    let mut config = TransportConfig::default();
    config.block_size = 2;
    let (mut tester, mut ecu) = pair(config);
    let payload: Vec<u8> = (0..20u8).collect();
    thread::scope(|s| {
        let handle = s.spawn(|| ecu.recv_sdu(Duration::from_secs(1)).unwrap());
        tester.send_sdu(&payload).unwrap();
        let sdu = handle.join().unwrap();
        assert_eq!(sdu, payload);
    });
    assert_eq!(ecu.stats().frames_received, 4); // FF + 3 CF (7+7+6 bytes)
}

/// P5: a muted direction fails fast without touching the link.
#[test]
fn p5_muted_directions_fail_fast() {
    let (mut tester, mut ecu) = pair(TransportConfig::default());
    tester.set_tx_enabled(false);
    let err = tester.send_sdu(&[0x3E]).unwrap_err();
    assert!(matches!(err, Error::TransportAbort(TransportAbort::TxMuted)));

    ecu.set_rx_enabled(false);
    let err = ecu.recv_sdu(Duration::from_millis(20)).unwrap_err();
    assert!(matches!(err, Error::TransportAbort(TransportAbort::RxMuted)));
}

/// Boundary: block_size=0 ("unlimited") never pauses for an extra
/// flow-control frame mid-transfer.
#[test]
fn unlimited_block_size_sends_without_interim_flow_control() {
    let (mut tester, mut ecu) = pair(TransportConfig::default());
    let payload: Vec<u8> = (0..300u8 as usize).map(|i| i as u8).collect();
    thread::scope(|s| {
        let handle = s.spawn(|| ecu.recv_sdu(Duration::from_secs(2)).unwrap());
        tester.send_sdu(&payload).unwrap();
        assert_eq!(handle.join().unwrap(), payload);
    });
}

/// Boundary: a consecutive frame sequence error aborts with
/// `TransportAbort::SequenceError` rather than silently accepting bad data.
#[test]
fn sequence_error_aborts_receive() {
    use uds_rs::link::{Frame, Link};

    let (mut tester_link, mut ecu_link) = LoopbackLink::pair();
    let addr_tester = Address::physical(0x7E0, 0x7E8);
    tester_link.set_address(addr_tester);

    // Hand-craft a first frame (total length 10) followed by a consecutive
    // frame whose sequence number is wrong (2 instead of 1).
    tester_link
        .send(&Frame::new(0x7E0, &[0x10, 0x0A, 1, 2, 3, 4, 5, 6]))
        .unwrap();
    tester_link
        .send(&Frame::new(0x7E0, &[0x22, 7, 8, 9, 10]))
        .unwrap();

    let mut ecu = Transport::new(ecu_link, Address::physical(0x7E8, 0x7E0), TransportConfig::default());
    let err = ecu.recv_sdu(Duration::from_millis(200)).unwrap_err();
    assert!(matches!(err, Error::TransportAbort(TransportAbort::SequenceError)));
}

/// Boundary: STmin decoding at the documented wire-byte boundaries.
#[test]
fn stmin_boundaries() {
    use std::time::Duration as D;
    use uds_rs::isotp::stmin_to_duration;

    assert_eq!(stmin_to_duration(0x00), D::from_millis(0));
    assert_eq!(stmin_to_duration(0x7F), D::from_millis(127));
    assert_eq!(stmin_to_duration(0xF1), D::from_millis(1));
    assert_eq!(stmin_to_duration(0xF9), D::from_millis(1));
    assert_eq!(stmin_to_duration(0xFA), D::from_millis(0)); // reserved
}
