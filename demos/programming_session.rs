//! Drives a full enter-session -> unlock -> disable-DTCs/comms ->
//! download -> restore-and-reset sequence through [`ProgrammingSession`],
//! grounded on `original_source/examples/programming_session_example.cpp`'s
//! end-to-end flow.

use std::thread;
use std::time::Duration;

use log::LevelFilter;
use uds_rs::isotp::{Transport, TransportConfig};
use uds_rs::link::{loopback::LoopbackLink, Address};
use uds_rs::service::programming::ProgrammingSession;
use uds_rs::service::Client;

fn main() {
    log::set_max_level(LevelFilter::Debug);
    env_logger::init();

    let (tester_link, ecu_link) = LoopbackLink::pair();
    let mut client = Client::new(Transport::new(
        tester_link,
        Address::physical(0x7E0, 0x7E8),
        TransportConfig::default(),
    ));
    let mut ecu = Transport::new(
        ecu_link,
        Address::physical(0x7E8, 0x7E0),
        TransportConfig::default(),
    );

    let ecu_thread = thread::spawn(move || {
        let enter = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(enter, vec![0x10, 0x02]);
        ecu.send_sdu(&[0x50, 0x02, 0x00, 0x32, 0x01, 0xF4]).unwrap();

        let seed_req = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(seed_req, vec![0x27, 0x01]);
        ecu.send_sdu(&[0x67, 0x01, 0xAA, 0xBB]).unwrap();
        let key_req = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(key_req, vec![0x27, 0x02, 0x55, 0x44]);
        ecu.send_sdu(&[0x67, 0x02]).unwrap();

        let disable_dtc = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(disable_dtc, vec![0x85, 0x02]);
        ecu.send_sdu(&[0xC5, 0x02]).unwrap();

        let disable_comm = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(disable_comm, vec![0x28, 0x03, 0xFF]);
        ecu.send_sdu(&[0x68, 0x03]).unwrap();

        let download_req = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(download_req[0], 0x34);
        ecu.send_sdu(&[0x74, 0x20, 0x00, 0x82]).unwrap();
        for expected_counter in [1u8, 2, 3] {
            let block = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
            assert_eq!(block[1], expected_counter);
            ecu.send_sdu(&[0x76, expected_counter]).unwrap();
        }
        let exit = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(exit[0], 0x37);
        ecu.send_sdu(&[0x77]).unwrap();

        let restore_comm = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(restore_comm, vec![0x28, 0x00, 0xFF]);
        ecu.send_sdu(&[0x68, 0x00]).unwrap();
        let restore_dtc = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(restore_dtc, vec![0x85, 0x01]);
        ecu.send_sdu(&[0xC5, 0x01]).unwrap();
        let reset = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(reset, vec![0x11, 0x01]);
        ecu.send_sdu(&[0x51, 0x01]).unwrap();
    });

    let mut session = ProgrammingSession::enter(&mut client).unwrap();
    session
        .unlock(1, &mut |seed: &[u8]| seed.iter().map(|b| b ^ 0xFF).collect())
        .unwrap();
    session.disable_dtcs().unwrap();
    session.disable_comms().unwrap();
    session.download(0x00, 0x1000_0000, &[0xAB; 300]).unwrap();
    session.finish(0x01).unwrap();
    println!("programming session complete");

    ecu_thread.join().unwrap();
}
