use embassy_time::{Duration, with_timeout};

use crate::config::SENSOR_TIMEOUT_MS;
use crate::convert;
use crate::error::SensorError;
use crate::hal::AdcChannel;
use crate::sensors::{SampleSource, TemperatureUnit};

/// Raw 12-bit ADC code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcSample(pub u16);

/// Analog Devices TMP36 on an ADC input.
pub struct Tmp36<A> {
    adc: A,
    timeout: Duration,
}

impl<A: AdcChannel> Tmp36<A> {
    pub fn new(adc: A) -> Self {
        Self {
            adc,
            timeout: Duration::from_millis(SENSOR_TIMEOUT_MS),
        }
    }

    /// Bound each conversion by `timeout` instead of the default.
    pub fn with_conversion_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn read(&mut self) -> Result<AdcSample, SensorError> {
        match with_timeout(self.timeout, self.adc.read_raw()).await {
            Ok(Ok(raw)) => Ok(AdcSample(raw)),
            Ok(Err(e)) => {
                log::error!("TMP36 conversion failed: {:?}", e);
                Err(SensorError::ReadFailed {
                    sensor: "TMP36",
                    operation: "sample ADC",
                    details: "ADC conversion error",
                })
            }
            Err(_) => {
                log::error!("TMP36 conversion timed out");
                Err(SensorError::Timeout {
                    sensor: "TMP36",
                    operation: "sample ADC",
                })
            }
        }
    }

    pub async fn temperature(
        &mut self,
        source: SampleSource<AdcSample>,
        unit: TemperatureUnit,
    ) -> Result<f32, SensorError> {
        let AdcSample(raw) = match source {
            SampleSource::Provided(sample) => sample,
            SampleSource::Fresh => self.read().await?,
        };

        Ok(match unit {
            TemperatureUnit::Celsius => convert::tmp36_celsius(raw),
            TemperatureUnit::Fahrenheit => convert::tmp36_fahrenheit(raw),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    struct FakeAdc {
        code: Option<u16>,
        reads: usize,
    }

    impl AdcChannel for FakeAdc {
        type Error = ();

        async fn read_raw(&mut self) -> Result<u16, ()> {
            self.reads += 1;
            self.code.ok_or(())
        }
    }

    /// Converter whose end-of-conversion flag never sets.
    struct StuckAdc;

    impl AdcChannel for StuckAdc {
        type Error = ();

        async fn read_raw(&mut self) -> Result<u16, ()> {
            core::future::pending().await
        }
    }

    #[test]
    fn test_provided_sample_skips_bus() {
        let mut tmp36 = Tmp36::new(FakeAdc {
            code: Some(4095),
            reads: 0,
        });
        let celsius =
            block_on(tmp36.temperature(AdcSample(0).into(), TemperatureUnit::Celsius)).unwrap();
        assert!((celsius + 50.0).abs() < 1e-4);
        assert_eq!(tmp36.adc.reads, 0);
    }

    #[test]
    fn test_fresh_sample_reads_adc() {
        let mut tmp36 = Tmp36::new(FakeAdc {
            code: Some(4095),
            reads: 0,
        });
        let celsius =
            block_on(tmp36.temperature(SampleSource::Fresh, TemperatureUnit::Celsius)).unwrap();
        assert!((celsius - 280.0).abs() < 1e-3);
        assert_eq!(tmp36.adc.reads, 1);
    }

    #[test]
    fn test_zero_code_is_a_real_sample() {
        // A provided code of zero must be converted, not treated as "read again".
        let mut tmp36 = Tmp36::new(FakeAdc {
            code: None,
            reads: 0,
        });
        let f = block_on(tmp36.temperature(AdcSample(0).into(), TemperatureUnit::Fahrenheit))
            .unwrap();
        assert!((f + 58.0).abs() < 1e-3);
    }

    #[test]
    fn test_adc_failure_maps_to_sensor_error() {
        let mut tmp36 = Tmp36::new(FakeAdc {
            code: None,
            reads: 0,
        });
        let err = block_on(tmp36.temperature(SampleSource::Fresh, TemperatureUnit::Celsius))
            .unwrap_err();
        assert!(matches!(err, SensorError::ReadFailed { sensor: "TMP36", .. }));
    }

    #[test]
    fn test_stuck_conversion_is_timeout() {
        let mut tmp36 = Tmp36::new(StuckAdc).with_conversion_timeout(Duration::from_millis(10));
        let err = block_on(tmp36.read()).unwrap_err();
        assert!(matches!(err, SensorError::Timeout { sensor: "TMP36", .. }));
    }
}
