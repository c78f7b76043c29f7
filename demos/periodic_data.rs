//! Enables periodic streaming of one identifier and pulls a few unsolicited
//! samples, exercising spec.md's §4.3.7 periodic-streaming path.

use std::thread;
use std::time::Duration;

use log::LevelFilter;
use uds_rs::isotp::{Transport, TransportConfig};
use uds_rs::link::{loopback::LoopbackLink, Address};
use uds_rs::service::periodic::PeriodicRate;
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
        let request = ecu.recv_sdu(Duration::from_millis(200)).unwrap();
        assert_eq!(request, vec![0x2A, 0x03, 0x01]);
        ecu.send_sdu(&[0x6A]).unwrap();
        for value in [0xABu8, 0xAC, 0xAD] {
            ecu.send_sdu(&[0x6A, 0x01, value]).unwrap();
        }
    });

    client
        .read_data_by_periodic_identifier(PeriodicRate::Fast, &[0x01])
        .unwrap();
    for _ in 0..3 {
        let sample = client.receive_periodic(Duration::from_millis(200)).unwrap();
        println!("periodic id 0x{:02X}: {:02X?}", sample.periodic_did, sample.data);
    }

    ecu_thread.join().unwrap();
}
