//! Ms5607 device definitions
//!
//! Copyright 2019 Ryan Kurte

use core::fmt;
use core::str::FromStr;

/// Ms5607 default I2C address (CSB pulled high)
pub const DEFAULT_ADDRESS: u8 = 0x76;

/// Ms5607 alternate I2C address (CSB pulled low)
pub const ALTERNATE_ADDRESS: u8 = 0x77;

/// Number of 16-bit words in the factory PROM
/// Word 0 is factory data, words 1..=6 are C1..C6, word 7 carries the CRC-4 in its low nibble
pub const PROM_WORDS: usize = 8;

/// Time to wait after a reset before the PROM can be read, in microseconds
/// (datasheet reset time is 2.8ms)
pub const RESET_TIME_US: u32 = 5_000;

/// Ms5607 I2C Command
/// Commands are single bytes, responses are big endian
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Command {
    /// Reset the device and reload the PROM into the internal register
    /// No associated data
    Reset,

    /// Read a 16-bit PROM word at the given address (0..=7)
    ReadProm(u8),

    /// Start an ADC conversion on the given channel at the given oversampling rate
    /// The result must not be read before the conversion time has elapsed
    StartConversion(Channel, Oversampling),

    /// Read the 24-bit result of the last conversion
    ReadAdc,
}

impl Command {
    /// Fetch the command byte written to the device
    pub fn value(&self) -> u8 {
        match self {
            Command::Reset => 0x1E,
            Command::ReadProm(addr) => 0xA0 | ((addr & 0x07) << 1),
            Command::StartConversion(channel, osr) => channel.base() | osr.command_offset(),
            Command::ReadAdc => 0x00,
        }
    }
}

/// ADC channel selected by a conversion command
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Channel {
    /// Digital pressure value (D1)
    Pressure,
    /// Digital temperature value (D2)
    Temperature,
}

impl Channel {
    fn base(&self) -> u8 {
        match self {
            Channel::Pressure => 0x40,
            Channel::Temperature => 0x50,
        }
    }
}

/// Oversampling rate for a conversion
/// Higher rates give better resolution at the cost of a longer conversion
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Oversampling {
    Osr256,
    Osr512,
    Osr1024,
    Osr2048,
    Osr4096,
}

impl Oversampling {
    /// All supported rates, fastest first
    pub const ALL: [Oversampling; 5] = [
        Oversampling::Osr256,
        Oversampling::Osr512,
        Oversampling::Osr1024,
        Oversampling::Osr2048,
        Oversampling::Osr4096,
    ];

    /// Offset ORed into the channel base to form the conversion command
    pub fn command_offset(&self) -> u8 {
        match self {
            Oversampling::Osr256 => 0x00,
            Oversampling::Osr512 => 0x02,
            Oversampling::Osr1024 => 0x04,
            Oversampling::Osr2048 => 0x06,
            Oversampling::Osr4096 => 0x08,
        }
    }

    /// Number of samples taken per conversion
    pub fn ratio(&self) -> u16 {
        match self {
            Oversampling::Osr256 => 256,
            Oversampling::Osr512 => 512,
            Oversampling::Osr1024 => 1024,
            Oversampling::Osr2048 => 2048,
            Oversampling::Osr4096 => 4096,
        }
    }
}

impl fmt::Display for Oversampling {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.ratio())
    }
}

/// Error parsing an oversampling rate from a string
#[derive(PartialEq, Clone, Debug)]
pub struct ParseOversamplingError(pub String);

impl fmt::Display for ParseOversamplingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid oversampling rate '{}' (expected 256, 512, 1024, 2048 or 4096)", self.0)
    }
}

impl std::error::Error for ParseOversamplingError {}

impl FromStr for Oversampling {
    type Err = ParseOversamplingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let r = s.trim().parse::<u16>().map_err(|_| ParseOversamplingError(s.to_string()))?;

        Oversampling::ALL.iter()
            .find(|o| o.ratio() == r)
            .cloned()
            .ok_or_else(|| ParseOversamplingError(s.to_string()))
    }
}

/// Minimum wait between starting a conversion and reading the ADC, per oversampling rate
/// Values are in microseconds, defaults are the datasheet maximum conversion times.
/// Sensors of the same family with different timing can override these.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct ConversionTimes {
    pub osr256_us: u32,
    pub osr512_us: u32,
    pub osr1024_us: u32,
    pub osr2048_us: u32,
    pub osr4096_us: u32,
}

pub const OSR256_CONVERSION_US: u32 = 600;
pub const OSR512_CONVERSION_US: u32 = 1_170;
pub const OSR1024_CONVERSION_US: u32 = 2_280;
pub const OSR2048_CONVERSION_US: u32 = 4_540;
pub const OSR4096_CONVERSION_US: u32 = 9_040;

impl Default for ConversionTimes {
    fn default() -> Self {
        Self {
            osr256_us: OSR256_CONVERSION_US,
            osr512_us: OSR512_CONVERSION_US,
            osr1024_us: OSR1024_CONVERSION_US,
            osr2048_us: OSR2048_CONVERSION_US,
            osr4096_us: OSR4096_CONVERSION_US,
        }
    }
}

impl ConversionTimes {
    /// Fetch the minimum conversion time for an oversampling rate
    pub fn get(&self, osr: Oversampling) -> u32 {
        match osr {
            Oversampling::Osr256 => self.osr256_us,
            Oversampling::Osr512 => self.osr512_us,
            Oversampling::Osr1024 => self.osr1024_us,
            Oversampling::Osr2048 => self.osr2048_us,
            Oversampling::Osr4096 => self.osr4096_us,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_command_values() {
        let tests = &[
            (Command::Reset, 0x1E),
            (Command::ReadAdc, 0x00),
            (Command::ReadProm(0), 0xA0),
            (Command::ReadProm(1), 0xA2),
            (Command::ReadProm(6), 0xAC),
            (Command::ReadProm(7), 0xAE),
        ];

        for t in tests {
            assert_eq!(t.0.value(), t.1, "command {:?}", t.0);
        }
    }

    #[test]
    fn test_conversion_commands() {
        // (osr, pressure, temperature) from the datasheet command table
        let tests = &[
            (Oversampling::Osr256, 0x40, 0x50),
            (Oversampling::Osr512, 0x42, 0x52),
            (Oversampling::Osr1024, 0x44, 0x54),
            (Oversampling::Osr2048, 0x46, 0x56),
            (Oversampling::Osr4096, 0x48, 0x58),
        ];

        for t in tests {
            assert_eq!(Command::StartConversion(Channel::Pressure, t.0).value(), t.1);
            assert_eq!(Command::StartConversion(Channel::Temperature, t.0).value(), t.2);
        }
    }

    #[test]
    fn test_conversion_times_increase() {
        let times = ConversionTimes::default();

        for w in Oversampling::ALL.windows(2) {
            assert!(times.get(w[0]) < times.get(w[1]));
        }

        assert_eq!(times.get(Oversampling::Osr256), 600);
        assert_eq!(times.get(Oversampling::Osr4096), 9_040);
    }

    #[test]
    fn test_parse_oversampling() {
        for o in Oversampling::ALL.iter() {
            let s = o.to_string();
            assert_eq!(s.parse::<Oversampling>(), Ok(*o));
        }

        assert!("300".parse::<Oversampling>().is_err());
        assert!("8192".parse::<Oversampling>().is_err());
        assert!("fast".parse::<Oversampling>().is_err());
    }
}
