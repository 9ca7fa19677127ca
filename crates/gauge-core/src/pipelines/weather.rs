use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::deferred::Acquisition;
use crate::error::SensorError;
use crate::record::{MeasurementRecord, Quantity, RecordFormat};
use crate::sensors::{SampleSource, Sht31d, TemperatureUnit};

pub const WEATHER_FORMAT: RecordFormat = RecordFormat {
    header: "Elapsed(s), Temp(C), Humi(%)",
    separator: ", ",
};

/// SHT31-D temperature in Celsius and relative humidity, both from one
/// measurement frame.
pub struct WeatherStation<I, D> {
    sht31d: Sht31d<I, D>,
}

impl<I: I2c, D: DelayNs> WeatherStation<I, D> {
    pub fn new(sht31d: Sht31d<I, D>) -> Self {
        Self { sht31d }
    }
}

impl<I: I2c, D: DelayNs> Acquisition for WeatherStation<I, D> {
    const FORMAT: RecordFormat = WEATHER_FORMAT;

    async fn acquire(&mut self, elapsed_s: u32) -> Result<MeasurementRecord, SensorError> {
        let (celsius, humidity) = self
            .sht31d
            .measure(SampleSource::Fresh, TemperatureUnit::Celsius)
            .await?;
        log::debug!("Temp : {:.2} C, Humi : {:.2} %", celsius, humidity);

        Ok(MeasurementRecord::new(elapsed_s)
            .with(Quantity::Celsius, celsius)
            .with(Quantity::RelativeHumidity, humidity))
    }
}
