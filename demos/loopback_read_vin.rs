//! Reads a VIN over an in-memory loopback link, standing in for a real CAN
//! bus the way the teacher's `transport`/`no_transport` examples exercised
//! the MIN protocol over an in-process pair instead of real hardware.

use std::thread;
use std::time::Duration;

use log::LevelFilter;
use uds_rs::isotp::{Transport, TransportConfig};
use uds_rs::link::{loopback::LoopbackLink, Address};
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
        assert_eq!(request, vec![0x22, 0xF1, 0x90]);
        ecu.send_sdu(&[0x62, 0xF1, 0x90, b'V', b'I', b'N']).unwrap();
    });

    let payload = client.read_data_by_identifier(0xF190).unwrap();
    let vin = String::from_utf8_lossy(&payload[2..]);
    println!("VIN: {vin}");

    ecu_thread.join().unwrap();
}
