//! Ms5607 command-line utility
//!
//! Copyright 2019 Ryan Kurte

extern crate linux_embedded_hal;
use linux_embedded_hal::{Delay, I2cdev};

extern crate structopt;
use structopt::StructOpt;

extern crate humantime;
use humantime::{Duration as HumanDuration};

#[macro_use] extern crate log;
extern crate simplelog;
use simplelog::{TermLogger, LevelFilter};

extern crate sensor_ms5607;
use sensor_ms5607::{Ms5607, Config, Error, State};
use sensor_ms5607::device::Oversampling;
use sensor_ms5607::altitude::pressure_altitude;

#[derive(StructOpt)]
#[structopt(name = "ms5607-util")]
/// A Command Line Interface (CLI) for interacting with a local Ms5607 barometric sensor over I2C
pub struct Options {

    /// Specify the i2c interface to use to connect to the ms5607 device
    #[structopt(short="d", long = "i2c", default_value = "/dev/i2c-1", env = "MS5607_I2C")]
    i2c: String,

    /// Use the alternate device address (0x77, CSB low)
    #[structopt(long = "alternate-address")]
    alternate_address: bool,

    /// Verify the PROM CRC when loading calibration
    #[structopt(long = "verify-crc")]
    verify_crc: bool,

    /// Pressure oversampling rate (256, 512, 1024, 2048 or 4096)
    #[structopt(long = "pressure-osr", default_value="4096")]
    pub pressure_osr: Oversampling,

    /// Temperature oversampling rate (256, 512, 1024, 2048 or 4096)
    #[structopt(long = "temperature-osr", default_value="4096")]
    pub temperature_osr: Oversampling,

    /// Specify period for taking measurements
    #[structopt(short = "p", long = "sample-period", default_value="1s")]
    pub period: HumanDuration,

    /// Number of measurements averaged for each reported sample
    #[structopt(short = "n", long = "samples", default_value="1")]
    pub samples: usize,

    /// Sea level pressure in millibar for altitude estimation
    #[structopt(long = "sea-level", default_value="1013.25")]
    pub sea_level: f32,

    /// Number of allowed consecutive I2C errors prior to exiting
    #[structopt(long = "allowed-errors", default_value="3")]
    pub allowed_errors: usize,

    /// Enable verbose logging
    #[structopt(long = "log-level", default_value = "info")]
    level: LevelFilter,
}

fn main() {
    // Load options
    let opts = Options::from_args();

    // Setup logging
    TermLogger::init(opts.level, simplelog::Config::default()).unwrap();

    let mut config = match opts.alternate_address {
        true => Config::alternate(),
        false => Config::default(),
    };
    config.verify_crc = opts.verify_crc;
    config.pressure_osr = opts.pressure_osr;
    config.temperature_osr = opts.temperature_osr;

    debug!("Connecting to I2C device");
    let i2c = match I2cdev::new(&opts.i2c) {
        Ok(v) => v,
        Err(e) => {
            error!("Error opening I2C device '{}': {:?}", &opts.i2c, e);
            std::process::exit(-1);
        }
    };

    let mut delay = Delay;

    debug!("Connecting to MS5607 at {:#04x}", config.address);
    let mut sensor = Ms5607::new(i2c, config);

    if let Err(e) = sensor.init(&mut delay) {
        error!("Error initialising MS5607: {:?}", e);
        std::process::exit(-2);
    }

    let mut errors = 0;

    loop {
        debug!("Starting sensor read cycle");

        match sensor.read_averaged(opts.samples, None, None, &mut delay) {
            Ok(m) => {
                let altitude = pressure_altitude(m.pressure, opts.sea_level);

                info!("Pressure: {:.2} mBar, Temperature: {:.2} C, Altitude: {:.2} m", m.pressure, m.temperature, altitude);
                errors = 0;
            },
            Err(Error::Precondition(State::Uninitialised)) => {
                warn!("Sensor uninitialised, re-initialising");
                if let Err(e) = sensor.init(&mut delay) {
                    warn!("Error initialising MS5607: {:?}", e);
                    errors += 1;
                }
            },
            Err(e) => {
                warn!("Error reading sensor data: {:?}", e);
                errors += 1;
            },
        }

        if errors > opts.allowed_errors {
            error!("Exceeded maximum allowed I2C errors");
            std::process::exit(-3);
        }

        // Wait for the next measurement period
        std::thread::sleep(*opts.period);
    }
}
