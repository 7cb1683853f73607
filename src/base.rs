//! Base communication implementation for interacting with Ms5607 device
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

use embedded_hal::blocking::i2c;

use crate::{Error};
use crate::device::*;

/// Base API for reading and writing to the device
/// This should not be required by consumers, but is exposed to support alternate transports (eg. SPI)
pub trait Base<Err> {
    /// Write a single command byte to the device
    fn write_command(&mut self, address: u8, command: Command) -> Result<(), Error<Err>>;
    /// Write a command byte then read the response from the device
    fn read_command(&mut self, address: u8, command: Command, data: &mut [u8]) -> Result<(), Error<Err>>;
}

/// Helper for device CRC-4 calculation over the eight PROM words
///
/// The received CRC (low nibble of word 7) is masked out prior to calculation,
/// so the raw PROM contents may be passed directly.
pub fn crc4(prom: &[u16; PROM_WORDS]) -> u8 {
    let mut rem: u16 = 0;

    // For each byte, MSB first
    for cnt in 0..PROM_WORDS * 2 {
        let mut word = prom[cnt >> 1];
        if cnt >> 1 == PROM_WORDS - 1 {
            word &= 0xFF00;
        }

        rem ^= match cnt % 2 {
            0 => word >> 8,
            _ => word & 0x00FF,
        };

        for _bit in 0..8 {
            if rem & 0x8000 != 0 {
                rem = (rem << 1) ^ 0x3000;
            } else {
                rem = rem << 1;
            }
        }
    }

    ((rem >> 12) & 0x000F) as u8
}

/// Base implementation for I2C devices
impl <Conn, Err> Base<Err> for Conn where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Err: Debug,
{
    fn write_command(&mut self, address: u8, command: Command) -> Result<(), Error<Err>> {
        let c = command.value();

        trace!("Writing command: {:?} ({:#04x})", command, c);

        self.write(address, &[c]).map_err(|e| Error::Conn(e) )
    }

    fn read_command(&mut self, address: u8, command: Command, data: &mut [u8]) -> Result<(), Error<Err>> {
        // Write command to select the response
        self.write_command(address, command)?;

        // Then, read the data back
        self.read(address, data)
            .map_err(|e| Error::Conn(e) )?;

        // Note: the device requires a stop between command and read, so no repeated-start write_read

        trace!("Read data: {:x?}", data);

        Ok(())
    }
}
