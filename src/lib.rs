//! Ms5607 barometric pressure and temperature sensor driver
//!
//! The driver resets the device and caches the factory calibration from PROM,
//! then triggers temperature and pressure conversions at a selectable
//! oversampling rate and compensates the raw results into millibar and
//! degrees celsius.
//!
//! Conversions may be read together via [`Ms5607::read_compensated`], or the
//! raw primitives may be used to mix resolutions and reuse a raw temperature
//! across multiple pressure reads.
//!
//! The bus is exclusively owned by the driver instance. Callers sharing a sensor
//! across threads should wrap the driver in a mutex.
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;
use core::marker::PhantomData;

#[macro_use]
extern crate log;

extern crate embedded_hal;
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c;

pub mod device;
use device::*;

pub mod base;
use base::*;

pub mod compensation;
use compensation::*;

pub mod altitude;
use altitude::pressure_altitude;

/// Ms5607 sensor object
/// This is generic over an I2C connector and associated error type
pub struct Ms5607<Conn, Err> {
    conn: Conn,
    config: Config,
    calibration: Option<Calibration>,
    pending: Option<(Channel, Oversampling)>,
    _err: PhantomData<Err>,
}

/// Ms5607 driver configuration
#[derive(PartialEq, Clone, Debug)]
pub struct Config {
    /// 7-bit I2C address of the device
    pub address: u8,
    /// Read the whole PROM and check the CRC-4 when loading calibration
    pub verify_crc: bool,
    /// Minimum conversion times per oversampling rate
    pub conversion_times: ConversionTimes,
    /// Pressure oversampling used when none is specified
    pub pressure_osr: Oversampling,
    /// Temperature oversampling used when none is specified
    pub temperature_osr: Oversampling,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            verify_crc: false,
            conversion_times: ConversionTimes::default(),
            pressure_osr: Oversampling::Osr4096,
            temperature_osr: Oversampling::Osr4096,
        }
    }
}

impl Config {
    /// Default configuration at the alternate (CSB low) address
    pub fn alternate() -> Self {
        Self {
            address: ALTERNATE_ADDRESS,
            ..Self::default()
        }
    }
}

/// Ms5607 session state
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum State {
    /// Calibration has not been (successfully) loaded
    Uninitialised,
    /// Calibration is loaded and no conversion is pending
    Ready,
    /// A conversion has been started and not yet read
    Converting(Channel, Oversampling),
}

/// Ms5607 error object
#[derive(Debug)]
pub enum Error<ConnErr> {
    /// Underlying transport error
    Conn(ConnErr),
    /// Device response was inconsistent with the protocol for the given command byte
    Protocol(u8),
    /// PROM CRC mismatch (calculated, received)
    Crc(u8, u8),
    /// Operation is not valid in the current session state
    Precondition(State),
    /// PROM word index out of range
    PromAddress(u8),
    /// Raw reading does not fit in 24 bits
    RawRange(u32),
}

impl <ConnErr> From<ConnErr> for Error<ConnErr> {
    fn from(conn_err: ConnErr) -> Self {
        Error::Conn(conn_err)
    }
}

/// Ms5607 measurement object
#[derive(PartialEq, Clone, Debug)]
pub struct Measurement {
    /// Pressure in millibar
    /// Range: 10 - 1200 mbar, 0.01 mbar resolution
    pub pressure: f32,
    /// Temperature in degrees celsius
    /// Range: -40 - 85 C, 0.01 C resolution
    pub temperature: f32,
}

impl From<Compensated> for Measurement {
    fn from(c: Compensated) -> Self {
        Measurement {
            pressure: c.pressure as f32 / 100.0,
            temperature: c.temperature as f32 / 100.0,
        }
    }
}

impl <Conn, Err> Ms5607 <Conn, Err> where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Err: Debug,
{
    /// Create a new Ms5607 sensor instance
    /// This does not communicate with the device, call `init` before reading
    pub fn new(conn: Conn, config: Config) -> Self {
        Ms5607{ conn, config, calibration: None, pending: None, _err: PhantomData }
    }

    /// Reset the device and load the factory calibration
    pub fn init<D: DelayUs<u32>>(&mut self, delay: &mut D) -> Result<(), Error<Err>> {
        self.reset()?;

        // The PROM is not readable until the reset completes
        delay.delay_us(RESET_TIME_US);

        self.load_calibration()?;

        debug!("Ms5607 at {:#04x} ready", self.config.address);

        Ok(())
    }

    /// Fetch the current session state
    pub fn state(&self) -> State {
        match (&self.calibration, self.pending) {
            (None, _) => State::Uninitialised,
            (Some(_), None) => State::Ready,
            (Some(_), Some((channel, osr))) => State::Converting(channel, osr),
        }
    }

    /// Fetch the cached calibration, if loaded
    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// Fetch the driver configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reset the underlying device
    /// Any pending conversion is abandoned
    pub fn reset(&mut self) -> Result<(), Error<Err>> {
        self.pending = None;
        self.conn.write_command(self.config.address, Command::Reset)
    }

    /// Read a single 16-bit PROM word (0..=7)
    pub fn read_calibration_word(&mut self, index: u8) -> Result<u16, Error<Err>> {
        if (index as usize) >= PROM_WORDS {
            return Err(Error::PromAddress(index));
        }

        let command = Command::ReadProm(index);
        let mut buff = [0u8; 2];

        self.conn.read_command(self.config.address, command, &mut buff)?;

        let v: u16 = (buff[0] as u16) << 8 | (buff[1] as u16);

        // Coefficients are never all zeros or all ones, this is a missing or misbehaving device
        if (1..=6).contains(&index) && (v == 0x0000 || v == 0xFFFF) {
            return Err(Error::Protocol(command.value()));
        }

        Ok(v)
    }

    /// Load calibration coefficients from the device PROM
    /// On failure the session is left uninitialised
    pub fn load_calibration(&mut self) -> Result<Calibration, Error<Err>> {
        self.calibration = None;
        self.pending = None;

        let mut prom = [0u16; PROM_WORDS];

        let words = match self.config.verify_crc {
            true => 0..PROM_WORDS,
            false => 1..7,
        };

        for i in words {
            prom[i] = self.read_calibration_word(i as u8)?;
        }

        if self.config.verify_crc {
            let crc = crc4(&prom);
            let received = (prom[PROM_WORDS - 1] & 0x000F) as u8;

            if crc != received {
                return Err(Error::Crc(crc, received));
            }
        }

        let calibration = Calibration::from_prom(&prom);

        debug!("Loaded calibration: {:?}", calibration);

        self.calibration = Some(calibration);

        Ok(calibration)
    }

    /// Start a conversion on the given channel
    /// The result is not valid until the conversion time for `osr` has elapsed, see `wait_conversion`
    pub fn start_conversion(&mut self, channel: Channel, osr: Oversampling) -> Result<(), Error<Err>> {
        match self.state() {
            State::Ready => (),
            s => return Err(Error::Precondition(s)),
        }

        self.conn.write_command(self.config.address, Command::StartConversion(channel, osr))?;

        self.pending = Some((channel, osr));

        Ok(())
    }

    /// Block for the minimum conversion time of the pending conversion
    pub fn wait_conversion<D: DelayUs<u32>>(&self, delay: &mut D) -> Result<(), Error<Err>> {
        let (_channel, osr) = match self.pending {
            Some(p) => p,
            None => return Err(Error::Precondition(self.state())),
        };

        delay.delay_us(self.config.conversion_times.get(osr));

        Ok(())
    }

    /// Read the raw 24-bit result of the pending conversion
    ///
    /// Reading before the conversion time has elapsed returns an invalid value.
    /// The session returns to `Ready` whether or not the read succeeds.
    pub fn read_raw(&mut self) -> Result<u32, Error<Err>> {
        let (channel, osr) = match self.pending.take() {
            Some(p) => p,
            None => return Err(Error::Precondition(self.state())),
        };

        let mut buff = [0u8; 3];

        self.conn.read_command(self.config.address, Command::ReadAdc, &mut buff)?;

        let v: u32 = (buff[0] as u32) << 16 | (buff[1] as u32) << 8 | (buff[2] as u32);

        trace!("Raw {:?} (OSR {}): {}", channel, osr, v);

        Ok(v)
    }

    /// Trigger a conversion, wait for it to complete, then read the raw result
    pub fn read_raw_channel<D: DelayUs<u32>>(&mut self, channel: Channel, osr: Oversampling, delay: &mut D) -> Result<u32, Error<Err>> {
        self.start_conversion(channel, osr)?;

        self.wait_conversion(delay)?;

        self.read_raw()
    }

    /// Read a raw (D2) temperature value
    pub fn read_raw_temperature<D: DelayUs<u32>>(&mut self, osr: Oversampling, delay: &mut D) -> Result<u32, Error<Err>> {
        self.read_raw_channel(Channel::Temperature, osr, delay)
    }

    /// Read a raw (D1) pressure value
    pub fn read_raw_pressure<D: DelayUs<u32>>(&mut self, osr: Oversampling, delay: &mut D) -> Result<u32, Error<Err>> {
        self.read_raw_channel(Channel::Pressure, osr, delay)
    }

    /// Convert a pair of raw readings into a compensated measurement using the cached calibration
    pub fn convert(&self, raw_temperature: u32, raw_pressure: u32) -> Result<Measurement, Error<Err>> {
        let calibration = match &self.calibration {
            Some(c) => c,
            None => return Err(Error::Precondition(State::Uninitialised)),
        };

        for raw in [raw_temperature, raw_pressure].iter() {
            if *raw > RAW_MAX {
                return Err(Error::RawRange(*raw));
            }
        }

        Ok(compensate(raw_temperature, raw_pressure, calibration).into())
    }

    /// Read temperature then pressure and return the compensated measurement
    /// Oversampling rates default to those in the driver configuration
    pub fn read_compensated<D: DelayUs<u32>>(&mut self, pressure_osr: Option<Oversampling>, temperature_osr: Option<Oversampling>, delay: &mut D) -> Result<Measurement, Error<Err>> {
        // Fail prior to bus access if the session is not usable
        match self.state() {
            State::Ready => (),
            s => return Err(Error::Precondition(s)),
        }

        let pressure_osr = pressure_osr.unwrap_or(self.config.pressure_osr);
        let temperature_osr = temperature_osr.unwrap_or(self.config.temperature_osr);

        let raw_temperature = self.read_raw_temperature(temperature_osr, delay)?;
        let raw_pressure = self.read_raw_pressure(pressure_osr, delay)?;

        self.convert(raw_temperature, raw_pressure)
    }

    /// Read `samples` measurements and return their mean
    /// Oversampling rates default to those in the driver configuration
    pub fn read_averaged<D: DelayUs<u32>>(&mut self, samples: usize, pressure_osr: Option<Oversampling>, temperature_osr: Option<Oversampling>, delay: &mut D) -> Result<Measurement, Error<Err>> {
        let samples = samples.max(1);
        let mut pressure = 0.0;
        let mut temperature = 0.0;

        for _i in 0..samples {
            let m = self.read_compensated(pressure_osr, temperature_osr, delay)?;
            pressure += m.pressure;
            temperature += m.temperature;
        }

        Ok(Measurement {
            pressure: pressure / samples as f32,
            temperature: temperature / samples as f32,
        })
    }

    /// Read the altitude in meters, averaging pressure over `samples` measurements
    pub fn read_altitude<D: DelayUs<u32>>(&mut self, sea_level_pressure: f32, samples: usize, pressure_osr: Option<Oversampling>, temperature_osr: Option<Oversampling>, delay: &mut D) -> Result<f32, Error<Err>> {
        let m = self.read_averaged(samples, pressure_osr, temperature_osr, delay)?;

        Ok(pressure_altitude(m.pressure, sea_level_pressure))
    }

    /// Release the underlying connection
    pub fn release(self) -> Conn {
        self.conn
    }
}
