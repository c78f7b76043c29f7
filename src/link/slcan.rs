//! Reference SLCAN serial adapter implementing [`Link`] over a real serial
//! port, following the classic Lawicel ASCII protocol: `tiiildd...\r` for an
//! 11-bit data frame, `Tiiiiiiiildd...\r` for a 29-bit one, `O\r`/`C\r` to
//! open/close the channel.
//!
//! A concrete, hardware-facing adapter alongside
//! [`LoopbackLink`](super::loopback::LoopbackLink), which the crate's own
//! tests and demos use so they don't depend on real hardware.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use serial::prelude::*;

use super::{Address, Frame, Link, LinkError, LinkErrorKind};

/// 8N1, no flow control, at a caller-supplied baud rate (SLCAN adapters
/// commonly run at 115200 or 230400 regardless of the CAN bitrate they
/// carry).
fn port_settings(baud_rate: serial::BaudRate) -> serial::PortSettings {
    serial::PortSettings {
        baud_rate,
        char_size: serial::Bits8,
        parity: serial::ParityNone,
        stop_bits: serial::Stop1,
        flow_control: serial::FlowNone,
    }
}

/// A [`Link`] implementation over a SLCAN-speaking serial adapter. Decodes
/// one line at a time; non-CAN-data lines (line-ack responses to prior
/// `t`/`T` sends) are returned to the caller as discardable noise rather
/// than buffered.
pub struct SerialLink {
    port: serial::SystemPort,
    address: Address,
    line_buf: Vec<u8>,
}

impl SerialLink {
    /// Opens `device`, configures it at `baud_rate`, sends `C\r` (close any
    /// prior channel) then `O\r` (open). Does not configure the adapter's
    /// CAN bitrate; callers on real hardware issue the adapter-specific
    /// `Sn\r`/`Bn\r` bitrate command before calling this, since the command
    /// set is adapter-specific.
    pub fn open(device: &str, baud_rate: serial::BaudRate) -> Result<Self, LinkError> {
        let mut port = serial::open(device)
            .map_err(|e| LinkError::new(LinkErrorKind::Io, e.to_string()))?;
        port.configure(&port_settings(baud_rate))
            .map_err(|e| LinkError::new(LinkErrorKind::Io, e.to_string()))?;
        port.set_timeout(Duration::from_millis(100))
            .map_err(|e| LinkError::new(LinkErrorKind::Io, e.to_string()))?;

        let mut link = Self {
            port,
            address: Address::physical(0, 0),
            line_buf: Vec::new(),
        };
        let _ = link.write_command("C\r");
        link.write_command("O\r")?;
        debug!(target: "slcan", "opened {device} at {baud_rate:?}");
        Ok(link)
    }

    fn write_command(&mut self, cmd: &str) -> Result<(), LinkError> {
        self.port
            .write_all(cmd.as_bytes())
            .map_err(|e| LinkError::new(LinkErrorKind::Io, e.to_string()))?;
        Ok(())
    }

    /// Reads one `\r`-or-`\x07`-terminated SLCAN line, blocking at most
    /// `deadline`. `\x07` (BEL) is the adapter's error-command response.
    fn read_line(&mut self, deadline: Duration) -> Result<Vec<u8>, LinkError> {
        let deadline_at = Instant::now() + deadline;
        loop {
            if let Some(pos) = self.line_buf.iter().position(|&b| b == b'\r' || b == 0x07) {
                let line: Vec<u8> = self.line_buf.drain(..=pos).collect();
                return Ok(line[..line.len() - 1].to_vec());
            }
            if Instant::now() >= deadline_at {
                return Err(LinkError::timeout());
            }
            let mut byte = [0u8; 64];
            match self.port.read(&mut byte) {
                Ok(0) => continue,
                Ok(n) => self.line_buf.extend_from_slice(&byte[..n]),
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(LinkError::new(LinkErrorKind::Io, e.to_string())),
            }
        }
    }

    /// Encodes a frame as a Lawicel `t`/`T` transmit command.
    fn encode_frame(frame: &Frame, extended: bool) -> String {
        let mut cmd = String::new();
        if extended {
            cmd.push('T');
            cmd.push_str(&format!("{:08X}", frame.id));
        } else {
            cmd.push('t');
            cmd.push_str(&format!("{:03X}", frame.id));
        }
        cmd.push_str(&format!("{:X}", frame.data.len()));
        cmd.push_str(&hex::encode_upper(&frame.data));
        cmd.push('\r');
        cmd
    }

    /// Decodes a `t`/`T` data-frame line into a [`Frame`]; returns `None` for
    /// any other line (channel acks, error bells already stripped by
    /// [`read_line`]).
    fn decode_frame(line: &[u8]) -> Option<Frame> {
        let line = std::str::from_utf8(line).ok()?;
        let (id_width, extended) = match line.chars().next()? {
            't' => (3, false),
            'T' => (8, true),
            _ => return None,
        };
        let rest = &line[1..];
        let id = u32::from_str_radix(rest.get(..id_width)?, 16).ok()?;
        let dlc_char = rest.get(id_width..id_width + 1)?;
        let dlc = u8::from_str_radix(dlc_char, 16).ok()? as usize;
        if dlc > 8 {
            return None;
        }
        let data_hex = rest.get(id_width + 1..id_width + 1 + dlc * 2)?;
        let data = hex::decode(data_hex).ok()?;
        let _ = extended;
        Some(Frame {
            id,
            data,
            timestamp: Some(Instant::now()),
        })
    }
}

impl Link for SerialLink {
    fn set_address(&mut self, address: Address) {
        self.address = address;
    }

    fn send(&mut self, frame: &Frame) -> Result<(), LinkError> {
        let cmd = Self::encode_frame(frame, self.address.extended);
        trace!(target: "slcan", "tx {}", cmd.trim_end());
        self.port
            .write_all(cmd.as_bytes())
            .map_err(|e| LinkError::new(LinkErrorKind::Io, e.to_string()))?;
        let ack = self.read_line(Duration::from_millis(100))?;
        if ack.is_empty() {
            Ok(())
        } else {
            warn!(target: "slcan", "unexpected transmit ack: {ack:?}");
            Ok(())
        }
    }

    fn receive(&mut self, deadline: Duration) -> Result<Frame, LinkError> {
        let deadline_at = Instant::now() + deadline;
        loop {
            let remaining = deadline_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LinkError::timeout());
            }
            let line = self.read_line(remaining)?;
            if let Some(frame) = Self::decode_frame(&line) {
                trace!(target: "slcan", "rx id=0x{:X} data={}", frame.id, hex::encode(&frame.data));
                return Ok(frame);
            }
        }
    }
}

impl Drop for SerialLink {
    /// Deterministically closes the SLCAN channel on teardown.
    fn drop(&mut self) {
        if let Err(err) = self.write_command("C\r") {
            warn!(target: "slcan", "failed to close channel on drop: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_standard_frame() {
        let frame = Frame::new(0x7E0, &[0x02, 0x10, 0x01]);
        assert_eq!(SerialLink::encode_frame(&frame, false), "t7E03021001\r");
    }

    #[test]
    fn encodes_extended_frame() {
        let frame = Frame::new(0x1234_5678, &[0xAA]);
        assert_eq!(SerialLink::encode_frame(&frame, true), "T123456781AA\r");
    }

    #[test]
    fn decodes_standard_frame() {
        let frame = SerialLink::decode_frame(b"t7E03021001").unwrap();
        assert_eq!(frame.id, 0x7E0);
        assert_eq!(frame.data, vec![0x02, 0x10, 0x01]);
    }

    #[test]
    fn decodes_extended_frame() {
        let frame = SerialLink::decode_frame(b"T123456781AA").unwrap();
        assert_eq!(frame.id, 0x1234_5678);
        assert_eq!(frame.data, vec![0xAA]);
    }

    #[test]
    fn ignores_non_frame_lines() {
        assert!(SerialLink::decode_frame(b"").is_none());
        assert!(SerialLink::decode_frame(b"z").is_none());
    }
}
