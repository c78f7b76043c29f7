//! Talks to a real ECU over a SLCAN-speaking serial adapter, the
//! hardware-backed counterpart to `loopback_read_vin`, grounded on the
//! teacher's `real_uart_on_linux` example for serial port setup and logging.

use log::LevelFilter;
use uds_rs::isotp::{Transport, TransportConfig};
use uds_rs::link::slcan::SerialLink;
use uds_rs::link::Address;
use uds_rs::service::Client;

const SERIAL_PORT: &str = "/dev/ttyUSB0";
const BAUD_RATE: serial::BaudRate = serial::Baud115200;

fn main() {
    log::set_max_level(LevelFilter::Debug);
    env_logger::init();

    let link = SerialLink::open(SERIAL_PORT, BAUD_RATE).expect("failed to open SLCAN adapter");
    let mut client = Client::new(Transport::new(
        link,
        Address::physical(0x7E0, 0x7E8),
        TransportConfig::default(),
    ));

    let vin = client.read_data_by_identifier(0xF190).expect("ReadDataByIdentifier(VIN) failed");
    println!("VIN bytes: {:02X?}", vin);
}
