use embassy_time::{Duration, TimeoutError, with_timeout};
use embedded_hal::i2c::Error;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::config::SENSOR_TIMEOUT_MS;
use crate::convert;
use crate::error::{ConfigError, SensorError};
use crate::sensors::{SampleSource, TemperatureUnit};

/// Single-shot measurement, high repeatability, clock stretching disabled.
const MEASURE_HIGH_REPEATABILITY: [u8; 2] = [0x24, 0x00];
/// Conversion takes at most 15 ms at high repeatability.
const MEASUREMENT_WAIT_MS: u32 = 50;

/// Raw 6-byte reply: temperature word, CRC, humidity word, CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sht31Frame(pub [u8; 6]);

impl Sht31Frame {
    pub const fn raw_temperature(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    pub const fn raw_humidity(&self) -> u16 {
        u16::from_be_bytes([self.0[3], self.0[4]])
    }
}

/// Sensirion SHT31-D temperature and humidity sensor
pub struct Sht31d<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    timeout: Duration,
}

impl<I: I2c, D: DelayNs> Sht31d<I, D> {
    /// Bind the driver to a 7-bit address. Fails fast on an address that
    /// cannot exist on the bus.
    pub fn new(i2c: I, delay: D, address: u8) -> Result<Self, ConfigError> {
        if address == 0 || address > 0x7F {
            return Err(ConfigError::InvalidAddress(address));
        }
        Ok(Self {
            i2c,
            delay,
            address,
            timeout: Duration::from_millis(SENSOR_TIMEOUT_MS),
        })
    }

    /// Bound each bus transaction by `timeout` instead of the default.
    pub fn with_bus_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Trigger a one-shot measurement and read back the raw frame.
    pub async fn read(&mut self) -> Result<Sht31Frame, SensorError> {
        let started = with_timeout(
            self.timeout,
            self.i2c.write(self.address, &MEASURE_HIGH_REPEATABILITY),
        )
        .await;
        bus_result(
            started,
            "start single shot measurement",
            "I2C communication error or sensor not responding",
        )?;

        self.delay.delay_ms(MEASUREMENT_WAIT_MS).await;

        let mut frame = [0u8; 6];
        let read = with_timeout(self.timeout, self.i2c.read(self.address, &mut frame)).await;
        bus_result(read, "read measurement", "I2C communication error")?;

        Ok(Sht31Frame(frame))
    }

    async fn frame(&mut self, source: SampleSource<Sht31Frame>) -> Result<Sht31Frame, SensorError> {
        match source {
            SampleSource::Provided(frame) => Ok(frame),
            SampleSource::Fresh => self.read().await,
        }
    }

    pub async fn temperature(
        &mut self,
        source: SampleSource<Sht31Frame>,
        unit: TemperatureUnit,
    ) -> Result<f32, SensorError> {
        let frame = self.frame(source).await?;
        Ok(temperature_of(&frame, unit))
    }

    pub async fn humidity(&mut self, source: SampleSource<Sht31Frame>) -> Result<f32, SensorError> {
        let frame = self.frame(source).await?;
        Ok(convert::sht31_humidity(frame.raw_humidity()))
    }

    /// Temperature and relative humidity from a single frame.
    pub async fn measure(
        &mut self,
        source: SampleSource<Sht31Frame>,
        unit: TemperatureUnit,
    ) -> Result<(f32, f32), SensorError> {
        let frame = self.frame(source).await?;
        Ok((
            temperature_of(&frame, unit),
            convert::sht31_humidity(frame.raw_humidity()),
        ))
    }
}

fn bus_result<E: Error>(
    result: Result<Result<(), E>, TimeoutError>,
    operation: &'static str,
    details: &'static str,
) -> Result<(), SensorError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            log::error!("SHT31D {} failed: {:?}", operation, e.kind());
            Err(SensorError::ReadFailed {
                sensor: "SHT31D",
                operation,
                details,
            })
        }
        Err(_) => {
            log::error!("SHT31D {} timed out", operation);
            Err(SensorError::Timeout {
                sensor: "SHT31D",
                operation,
            })
        }
    }
}

fn temperature_of(frame: &Sht31Frame, unit: TemperatureUnit) -> f32 {
    match unit {
        TemperatureUnit::Celsius => convert::sht31_celsius(frame.raw_temperature()),
        TemperatureUnit::Fahrenheit => convert::sht31_fahrenheit(frame.raw_temperature()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_hal_async::i2c::{ErrorKind, ErrorType, Operation};

    /// Scripted bus: answers every read with `reply`, records writes.
    pub(crate) struct FakeBus {
        pub reply: Option<[u8; 6]>,
        pub hang: bool,
        pub writes: std::vec::Vec<(u8, std::vec::Vec<u8>)>,
        pub reads: usize,
    }

    impl FakeBus {
        pub fn replying(reply: [u8; 6]) -> Self {
            Self {
                reply: Some(reply),
                hang: false,
                writes: std::vec::Vec::new(),
                reads: 0,
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                hang: false,
                writes: std::vec::Vec::new(),
                reads: 0,
            }
        }

        /// A bus whose transactions never complete, e.g. a stuck SDA line.
        pub fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::replying([0; 6])
            }
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), ErrorKind> {
            if self.hang {
                core::future::pending::<()>().await;
            }
            let reply = self.reply.ok_or(ErrorKind::Other)?;
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buf) => {
                        self.reads += 1;
                        buf.copy_from_slice(&reply[..buf.len()]);
                    }
                }
            }
            Ok(())
        }
    }

    pub(crate) struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    const FORTY_PERCENT: [u8; 6] = [0x66, 0x66, 0x00, 0x66, 0x66, 0x00];

    #[test]
    fn test_invalid_address_rejected() {
        assert!(matches!(
            Sht31d::new(FakeBus::failing(), NoDelay, 0),
            Err(ConfigError::InvalidAddress(0))
        ));
        assert!(matches!(
            Sht31d::new(FakeBus::failing(), NoDelay, 0x80),
            Err(ConfigError::InvalidAddress(0x80))
        ));
    }

    #[test]
    fn test_frame_words() {
        let frame = Sht31Frame([0x12, 0x34, 0xAA, 0x56, 0x78, 0xBB]);
        assert_eq!(frame.raw_temperature(), 0x1234);
        assert_eq!(frame.raw_humidity(), 0x5678);
    }

    #[test]
    fn test_provided_frame() {
        let mut sht = Sht31d::new(FakeBus::failing(), NoDelay, 0x44).unwrap();
        let (celsius, humidity) = block_on(sht.measure(
            Sht31Frame(FORTY_PERCENT).into(),
            TemperatureUnit::Celsius,
        ))
        .unwrap();
        assert!((celsius - 25.0).abs() < 0.1);
        assert!((humidity - 40.0).abs() < 0.1);
        assert!(sht.i2c.writes.is_empty());
    }

    #[test]
    fn test_fresh_read_protocol() {
        let mut sht = Sht31d::new(FakeBus::replying(FORTY_PERCENT), NoDelay, 0x45).unwrap();
        let f = block_on(sht.temperature(SampleSource::Fresh, TemperatureUnit::Fahrenheit))
            .unwrap();
        assert!((f - 77.0).abs() < 0.1);
        assert_eq!(sht.i2c.writes, std::vec![(0x45, std::vec![0x24, 0x00])]);
        assert_eq!(sht.i2c.reads, 1);
    }

    #[test]
    fn test_humidity_fresh() {
        let mut sht = Sht31d::new(FakeBus::replying(FORTY_PERCENT), NoDelay, 0x44).unwrap();
        let humidity = block_on(sht.humidity(SampleSource::Fresh)).unwrap();
        assert!((humidity - 40.0).abs() < 0.1);
    }

    #[test]
    fn test_bus_failure_is_transient_error() {
        let mut sht = Sht31d::new(FakeBus::failing(), NoDelay, 0x44).unwrap();
        let err = block_on(sht.measure(SampleSource::Fresh, TemperatureUnit::Celsius)).unwrap_err();
        assert!(matches!(err, SensorError::ReadFailed { sensor: "SHT31D", .. }));
    }

    #[test]
    fn test_stuck_bus_is_timeout() {
        let mut sht = Sht31d::new(FakeBus::hanging(), NoDelay, 0x44)
            .unwrap()
            .with_bus_timeout(Duration::from_millis(10));
        let err = block_on(sht.read()).unwrap_err();
        assert_eq!(
            err,
            SensorError::Timeout {
                sensor: "SHT31D",
                operation: "start single shot measurement",
            }
        );
    }
}
