//! Ms5607 calibration and compensation
//!
//! Converts raw D1 (pressure) and D2 (temperature) ADC values into
//! temperature and pressure using the factory calibration coefficients,
//! following the first and second order algorithm from the datasheet.
//!
//! All intermediate values are 64-bit. Divisions by powers of two are
//! arithmetic shifts, and so round towards negative infinity.
//!
//! Copyright 2019 Ryan Kurte

use crate::device::PROM_WORDS;

/// Reference temperature in hundredths of a degree (20.00 C)
pub const REFERENCE_TEMP: i64 = 2000;

/// Below this (first order) temperature the very-low-temperature terms are applied (-15.00 C)
pub const VERY_LOW_TEMP: i64 = -1500;

/// Largest value the 24-bit ADC can produce
pub const RAW_MAX: u32 = 0x00FF_FFFF;

/// Factory calibration coefficients read from PROM
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct Calibration {
    /// C1: Pressure sensitivity | SENS_T1
    pub sens_t1: u16,
    /// C2: Pressure offset | OFF_T1
    pub off_t1: u16,
    /// C3: Temperature coefficient of pressure sensitivity | TCS
    pub tcs: u16,
    /// C4: Temperature coefficient of pressure offset | TCO
    pub tco: u16,
    /// C5: Reference temperature | T_REF
    pub t_ref: u16,
    /// C6: Temperature coefficient of the temperature | TEMPSENS
    pub temp_sens: u16,
}

impl Calibration {
    /// Build from coefficients C1..C6
    pub fn from_coefficients(c: [u16; 6]) -> Self {
        Self {
            sens_t1: c[0],
            off_t1: c[1],
            tcs: c[2],
            tco: c[3],
            t_ref: c[4],
            temp_sens: c[5],
        }
    }

    /// Build from the full PROM contents, factory data (word 0) and CRC (word 7) are dropped
    pub fn from_prom(prom: &[u16; PROM_WORDS]) -> Self {
        Self::from_coefficients([prom[1], prom[2], prom[3], prom[4], prom[5], prom[6]])
    }

    /// Fetch coefficients as C1..C6
    pub fn coefficients(&self) -> [u16; 6] {
        [self.sens_t1, self.off_t1, self.tcs, self.tco, self.t_ref, self.temp_sens]
    }
}

/// First order values at the actual temperature
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct FirstOrder {
    /// Difference between actual and reference temperature (dT)
    pub delta_t: i64,
    /// Temperature in hundredths of a degree (TEMP)
    pub temp: i64,
    /// Pressure offset (OFF)
    pub off: i64,
    /// Pressure sensitivity (SENS)
    pub sens: i64,
}

/// Second order correction terms, subtracted from the first order values
#[derive(PartialEq, Clone, Copy, Debug, Default)]
pub struct Correction {
    pub t2: i64,
    pub off2: i64,
    pub sens2: i64,
}

/// Compensated output in fixed point
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Compensated {
    /// Temperature in hundredths of a degree celsius
    pub temperature: i32,
    /// Pressure in hundredths of a millibar
    pub pressure: i32,
}

/// dT = D2 - T_REF = D2 - C5 * 2^8
pub fn delta_t(raw_temperature: u32, cal: &Calibration) -> i64 {
    raw_temperature as i64 - ((cal.t_ref as i64) << 8)
}

/// Compute first order temperature, offset and sensitivity from a raw temperature
pub fn first_order(raw_temperature: u32, cal: &Calibration) -> FirstOrder {
    let delta_t = delta_t(raw_temperature, cal);

    // TEMP = 20C + dT * TEMPSENS = 2000 + dT * C6 / 2^23
    let temp = REFERENCE_TEMP + ((delta_t * cal.temp_sens as i64) >> 23);

    // OFF = OFF_T1 + TCO * dT = C2 * 2^17 + (C4 * dT) / 2^6
    let off = ((cal.off_t1 as i64) << 17) + ((cal.tco as i64 * delta_t) >> 6);

    // SENS = SENS_T1 + TCS * dT = C1 * 2^16 + (C3 * dT) / 2^7
    let sens = ((cal.sens_t1 as i64) << 16) + ((cal.tcs as i64 * delta_t) >> 7);

    FirstOrder { delta_t, temp, off, sens }
}

/// Compute second order correction terms for a first order temperature
/// These are all zero at or above 20.00 C
pub fn correction(delta_t: i64, temp: i64) -> Correction {
    if temp >= REFERENCE_TEMP {
        return Correction::default();
    }

    let low = (temp - REFERENCE_TEMP) * (temp - REFERENCE_TEMP);

    let mut c = Correction {
        t2: (delta_t * delta_t) >> 31,
        off2: (61 * low) >> 4,
        sens2: 2 * low,
    };

    if temp < VERY_LOW_TEMP {
        let very_low = (temp - VERY_LOW_TEMP) * (temp - VERY_LOW_TEMP);

        c.off2 += 15 * very_low;
        c.sens2 += 8 * very_low;
    }

    c
}

/// Convert a raw temperature and pressure pair into compensated values
///
/// This is a pure function, any pair of previously captured raw values may be combined.
/// Raw values are 24-bit, bits above [`RAW_MAX`] are ignored.
pub fn compensate(raw_temperature: u32, raw_pressure: u32, cal: &Calibration) -> Compensated {
    let raw_temperature = raw_temperature & RAW_MAX;
    let raw_pressure = raw_pressure & RAW_MAX;

    let f = first_order(raw_temperature, cal);
    let c = correction(f.delta_t, f.temp);

    let temp = f.temp - c.t2;
    let off = f.off - c.off2;
    let sens = f.sens - c.sens2;

    // P = D1 * SENS - OFF = (D1 * SENS / 2^21 - OFF) / 2^15
    let pressure = (((raw_pressure as i64 * sens) >> 21) - off) >> 15;

    Compensated {
        temperature: temp as i32,
        pressure: pressure as i32,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Coefficients from the example calculation in the datasheet
    fn sample_calibration() -> Calibration {
        Calibration::from_coefficients([46372, 43981, 29059, 27842, 31553, 28165])
    }

    const SAMPLE_D1: u32 = 6465444;
    const SAMPLE_D2: u32 = 8077636;

    /// D2 value where dT is zero for the sample calibration
    const REFERENCE_D2: u32 = 31553 << 8;

    #[test]
    fn test_sample_first_order() {
        let cal = sample_calibration();

        let f = first_order(SAMPLE_D2, &cal);
        assert_eq!(f.delta_t, 68);
        assert_eq!(f.temp, 2000);
        assert_eq!(f.off, 5_764_707_214);
        assert_eq!(f.sens, 3_039_050_829);
    }

    #[test]
    fn test_sample_compensation() {
        let cal = sample_calibration();

        let c = compensate(SAMPLE_D2, SAMPLE_D1, &cal);
        assert_eq!(c, Compensated{ temperature: 2000, pressure: 110002 });
    }

    #[test]
    fn test_compensation_raw_limits() {
        let cal = sample_calibration();

        let max = compensate(RAW_MAX, RAW_MAX, &cal);
        assert_eq!(max, Compensated{ temperature: 31209, pressure: 932714 });

        // Only the low 24 bits are significant
        assert_eq!(compensate(u32::MAX, u32::MAX, &cal), max);
        assert_eq!(compensate(SAMPLE_D2 | 0xFF00_0000, SAMPLE_D1 | 0x0100_0000, &cal),
            Compensated{ temperature: 2000, pressure: 110002 });
    }

    #[test]
    fn test_compensation_is_deterministic() {
        let cal = sample_calibration();

        let pairs = &[
            (SAMPLE_D2, SAMPLE_D1),
            (REFERENCE_D2 - 595_676, 5_000_000),
            (REFERENCE_D2 + 2_000_000, 7_000_000),
        ];

        for p in pairs {
            assert_eq!(compensate(p.0, p.1, &cal), compensate(p.0, p.1, &cal));
        }
    }

    #[test]
    fn test_no_correction_at_reference() {
        let cal = sample_calibration();

        // Exactly 20.00 C uses the first order path
        let f = first_order(REFERENCE_D2, &cal);
        assert_eq!(f.temp, 2000);
        assert_eq!(correction(f.delta_t, f.temp), Correction::default());

        // As does anything warmer
        let f = first_order(REFERENCE_D2 + 2_000_000, &cal);
        assert_eq!(f.temp, 8715);
        assert_eq!(correction(f.delta_t, f.temp), Correction::default());
        assert_eq!(compensate(REFERENCE_D2 + 2_000_000, SAMPLE_D1, &cal).pressure, 126169);
    }

    #[test]
    fn test_low_temperature_threshold() {
        let cal = sample_calibration();

        // One count below reference is 19.99 C
        let f = first_order(REFERENCE_D2 - 1, &cal);
        assert_eq!(f.delta_t, -1);
        assert_eq!(f.temp, 1999);

        let c = correction(f.delta_t, f.temp);
        assert_eq!(c, Correction{ t2: 0, off2: 3, sens2: 2 });

        let v = compensate(REFERENCE_D2 - 1, SAMPLE_D1, &cal);
        assert_eq!(v, Compensated{ temperature: 1999, pressure: 110002 });

        // Continuous across the threshold
        let above = compensate(REFERENCE_D2, SAMPLE_D1, &cal);
        assert_eq!(above.temperature - v.temperature, 1);
        assert!((above.pressure - v.pressure).abs() <= 1);
    }

    #[test]
    fn test_low_temperature_correction() {
        let cal = sample_calibration();

        // First order temperature of 0.00 C
        let d2 = REFERENCE_D2 - 595_676;
        let f = first_order(d2, &cal);
        assert_eq!(f.temp, 0);

        let c = correction(f.delta_t, f.temp);
        assert_eq!(c, Correction{ t2: 165, off2: 15_250_000, sens2: 8_000_000 });

        let v = compensate(d2, SAMPLE_D1, &cal);
        assert_eq!(v, Compensated{ temperature: -165, pressure: 104900 });
    }

    #[test]
    fn test_very_low_temperature_threshold() {
        let cal = sample_calibration();

        // First order temperature of exactly -15.00 C, very low terms vanish
        let d2 = REFERENCE_D2 - 1_042_433;
        let f = first_order(d2, &cal);
        assert_eq!(f.temp, -1500);

        let c = correction(f.delta_t, f.temp);
        assert_eq!(c, Correction{ t2: 506, off2: 46_703_125, sens2: 24_500_000 });

        let at = compensate(d2, SAMPLE_D1, &cal);
        assert_eq!(at, Compensated{ temperature: -2006, pressure: 100696 });

        // -15.01 C adds the very low terms
        let d2 = REFERENCE_D2 - 1_042_434;
        let f = first_order(d2, &cal);
        assert_eq!(f.temp, -1501);

        let c = correction(f.delta_t, f.temp);
        // 61 * 3501^2 / 2^4 + 15 * 1^2, 2 * 3501^2 + 8 * 1^2
        assert_eq!(c, Correction{ t2: 506, off2: 46_729_831, sens2: 24_514_010 });

        let below = compensate(d2, SAMPLE_D1, &cal);
        assert_eq!(below, Compensated{ temperature: -2007, pressure: 100695 });

        // Continuous across the threshold
        assert_eq!(at.temperature - below.temperature, 1);
        assert!((at.pressure - below.pressure).abs() <= 1);
    }

    #[test]
    fn test_calibration_from_prom() {
        let prom = [0x0061, 46372, 43981, 29059, 27842, 31553, 28165, 0x4B26];
        let cal = Calibration::from_prom(&prom);

        assert_eq!(cal, sample_calibration());
        assert_eq!(cal.coefficients(), [46372, 43981, 29059, 27842, 31553, 28165]);
    }
}
