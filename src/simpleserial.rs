//! SimpleSerial framing
//!
//! The ASCII protocol spoken by ChipWhisperer capture hosts. A command is the
//! opcode character, its parameters as pairs of hex digits and a line
//! terminator:
//!
//! ```text
//! p00112233445566778899AABBCCDDEEFF\n
//! ```
//!
//! Replies are sent as `r` + hex payload + `\n`. Version 1.1 follows every
//! command with a `z` frame carrying the status byte.

use log::warn;
use nb::block;

use crate::{
    dispatch::{Params, Transport},
    hal::serial,
};

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Protocol revision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Version {
    /// No acknowledgement frames
    V1_0,
    /// Every command is acknowledged with a `z` frame
    V1_1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub version: Version,
}

impl Config {
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            version: Version::V1_1,
        }
    }
}

/// Extension trait to speak SimpleSerial over a serial port
pub trait SimpleSerialExt: Sized {
    fn simpleserial(self, config: Config) -> SimpleSerial<Self>;
}

impl<S, E> SimpleSerialExt for S
where
    S: serial::Read<u8, Error = E> + serial::Write<u8, Error = E>,
{
    fn simpleserial(self, config: Config) -> SimpleSerial<Self> {
        SimpleSerial::new(self, config)
    }
}

/// SimpleSerial endpoint on top of a byte-oriented serial port
pub struct SimpleSerial<S> {
    serial: S,
    config: Config,
}

impl<S, E> SimpleSerial<S>
where
    S: serial::Read<u8, Error = E> + serial::Write<u8, Error = E>,
{
    pub fn new(serial: S, config: Config) -> Self {
        SimpleSerial { serial, config }
    }

    /// Releases the serial port
    pub fn free(self) -> S {
        self.serial
    }

    fn getc(&mut self) -> Result<u8, E> {
        block!(self.serial.read())
    }

    fn putc(&mut self, byte: u8) -> Result<(), E> {
        block!(self.serial.write(byte))
    }

    fn put_hex(&mut self, byte: u8) -> Result<(), E> {
        self.putc(HEX[usize::from(byte >> 4)])?;
        self.putc(HEX[usize::from(byte & 0xf)])
    }

    /// Read `len` hex-encoded bytes and the terminator
    ///
    /// Returns `false` if the frame is malformed. An early terminator ends
    /// the frame right away, otherwise exactly `2 * len + 1` characters are
    /// consumed.
    fn read_params(&mut self, len: usize, params: &mut Params) -> Result<bool, E> {
        let mut valid = true;
        for _ in 0..len {
            let hi = self.getc()?;
            if is_terminator(hi) {
                return Ok(false);
            }
            let lo = self.getc()?;
            if is_terminator(lo) {
                return Ok(false);
            }
            match (hex_value(hi), hex_value(lo)) {
                (Some(hi), Some(lo)) => valid &= params.push(hi << 4 | lo).is_ok(),
                _ => valid = false,
            }
        }

        let end = self.getc()?;
        Ok(valid && is_terminator(end))
    }
}

impl<S, E> Transport for SimpleSerial<S>
where
    S: serial::Read<u8, Error = E> + serial::Write<u8, Error = E>,
{
    type Error = E;

    fn receive(
        &mut self,
        param_len: fn(u8) -> Option<usize>,
        params: &mut Params,
    ) -> Result<u8, E> {
        loop {
            let opcode = self.getc()?;
            let len = match param_len(opcode) {
                Some(len) => len,
                // Line noise, stray terminators and unknown commands
                None => continue,
            };

            params.clear();
            if self.read_params(len, params)? {
                return Ok(opcode);
            }
            warn!("dropped malformed {:?} frame", opcode as char);
        }
    }

    fn begin_reply(&mut self) -> Result<(), E> {
        self.putc(b'r')
    }

    fn reply_data(&mut self, data: &[u8]) -> Result<(), E> {
        for byte in data {
            self.put_hex(*byte)?;
        }
        Ok(())
    }

    fn end_reply(&mut self) -> Result<(), E> {
        self.putc(b'\n')?;
        block!(self.serial.flush())
    }

    fn acknowledge(&mut self, status: u8) -> Result<(), E> {
        if self.config.version == Version::V1_0 {
            return Ok(());
        }
        self.putc(b'z')?;
        self.put_hex(status)?;
        self.putc(b'\n')?;
        block!(self.serial.flush())
    }
}

fn is_terminator(c: u8) -> bool {
    c == b'\n' || c == b'\r'
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
