//! Raw-to-physical conversion formulas
//!
//! Pure functions, no I/O. The formulas match deployed instruments digit
//! for digit.

/// ADC full-scale reference voltage in millivolts.
pub const ADC_VREF_MV: f32 = 3300.0;
/// Largest code of a 12-bit converter.
pub const ADC_MAX_CODE: f32 = 4095.0;

/// TMP36 output at 0 °C.
const TMP36_OFFSET_MV: f32 = 500.0;
/// TMP36 slope.
const TMP36_MV_PER_DEGREE: f32 = 10.0;

/// Full scale of the SHT31-D's 16-bit words.
const SHT31_FULL_SCALE: f32 = 65535.0;

/// Edges counted per blade pass. The optical sensor sees one light-dark-light
/// cycle per blade but triggers on a single polarity; the factor is a
/// calibration constant of this sensing geometry.
pub const EDGES_PER_BLADE: u32 = 2;

pub fn adc_millivolts(raw: u16) -> f32 {
    f32::from(raw) * ADC_VREF_MV / ADC_MAX_CODE
}

pub fn tmp36_celsius(raw: u16) -> f32 {
    (adc_millivolts(raw) - TMP36_OFFSET_MV) / TMP36_MV_PER_DEGREE
}

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * (9.0 / 5.0) + 32.0
}

pub fn tmp36_fahrenheit(raw: u16) -> f32 {
    celsius_to_fahrenheit(tmp36_celsius(raw))
}

pub fn sht31_celsius(raw_temp: u16) -> f32 {
    175.0 * f32::from(raw_temp) / SHT31_FULL_SCALE - 45.0
}

/// Direct Fahrenheit formula from the SHT31-D datasheet.
///
/// Algebraically identical to `sht31_celsius` followed by
/// `celsius_to_fahrenheit` (175 * 9/5 = 315, -45 * 9/5 + 32 = -49), but
/// computed in one step.
pub fn sht31_fahrenheit(raw_temp: u16) -> f32 {
    315.0 * f32::from(raw_temp) / SHT31_FULL_SCALE - 49.0
}

pub fn sht31_humidity(raw_humidity: u16) -> f32 {
    100.0 * f32::from(raw_humidity) / SHT31_FULL_SCALE
}

/// Rotational speed from one interval's edge count.
///
/// `blade_count` and `interval_s` are validated non-zero by the session
/// configuration, so a zero count always yields zero.
pub fn rpm(count: u32, blade_count: u16, interval_s: u32) -> f32 {
    let edges_per_rev = EDGES_PER_BLADE as f32 * f32::from(blade_count);
    count as f32 * 60.0 / (edges_per_rev * interval_s as f32)
}
