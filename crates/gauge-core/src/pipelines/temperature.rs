use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::deferred::Acquisition;
use crate::error::SensorError;
use crate::hal::{AdcChannel, Clock};
use crate::record::{MeasurementRecord, Quantity, RecordFormat};
use crate::sensors::{SampleSource, Sht31d, TemperatureUnit, Tmp36};

pub const TEMPERATURE_FORMAT: RecordFormat = RecordFormat {
    header: "Time, Elapsed(s), TMP36(F), SHT31D(F)",
    separator: ", ",
};

/// TMP36 and SHT31-D side by side, both reported in Fahrenheit with a
/// wall-clock timestamp.
pub struct TemperatureStation<A, I, D, C> {
    tmp36: Tmp36<A>,
    sht31d: Sht31d<I, D>,
    clock: C,
}

impl<A, I, D, C> TemperatureStation<A, I, D, C>
where
    A: AdcChannel,
    I: I2c,
    D: DelayNs,
    C: Clock,
{
    pub fn new(tmp36: Tmp36<A>, sht31d: Sht31d<I, D>, clock: C) -> Self {
        Self {
            tmp36,
            sht31d,
            clock,
        }
    }
}

impl<A, I, D, C> Acquisition for TemperatureStation<A, I, D, C>
where
    A: AdcChannel,
    I: I2c,
    D: DelayNs,
    C: Clock,
{
    const FORMAT: RecordFormat = TEMPERATURE_FORMAT;

    async fn acquire(&mut self, elapsed_s: u32) -> Result<MeasurementRecord, SensorError> {
        let timestamp = self.clock.now();
        let analog = self
            .tmp36
            .temperature(SampleSource::Fresh, TemperatureUnit::Fahrenheit)
            .await?;
        let digital = self
            .sht31d
            .temperature(SampleSource::Fresh, TemperatureUnit::Fahrenheit)
            .await?;

        Ok(MeasurementRecord::new(elapsed_s)
            .with_timestamp(timestamp)
            .with(Quantity::Fahrenheit, analog)
            .with(Quantity::Fahrenheit, digital))
    }
}
