//! Compiled-in configuration for the three instruments
//!
//! There is no configuration file. Every parameter is a constant below and
//! is validated once, when the session config is built. Publish credentials
//! can be overridden at build time with `GAUGE_CHANNEL_ID` and
//! `GAUGE_WRITE_KEY` (see `build.rs`).

use core::fmt::Write;
use core::num::{NonZeroU16, NonZeroU32};

use crate::cadence::{Cadence, StopRule};
use crate::error::ConfigError;
use crate::hal::Edge;

pub const TACHOMETER_INTERVAL_S: u32 = 2;
pub const TACHOMETER_BLADES: u16 = 5;
pub const TACHOMETER_MAX_DURATION_S: u32 = 300;

pub const TEMPERATURE_INTERVAL_S: u32 = 10;
pub const TEMPERATURE_CEILING_S: u32 = 1000;

/// SHT31-D with ADDR tied low.
pub const SHT31D_ADDRESS: u8 = 0x44;
/// SHT31-D with ADDR tied high, as wired on the weather station.
pub const SHT31D_ALT_ADDRESS: u8 = 0x45;

pub const WEATHER_INTERVAL_S: u32 = 60;

pub const PUBLISH_SERVER: &str = "mqtt.thingspeak.com";
pub const PUBLISH_CLIENT_ID: &str = "umqtt_client";
pub const PUBLISH_CHANNEL_ID: &str = match option_env!("GAUGE_CHANNEL_ID") {
    Some(id) => id,
    None => "888456",
};
pub const PUBLISH_WRITE_KEY: &str = match option_env!("GAUGE_WRITE_KEY") {
    Some(key) => key,
    None => "IDXXXXXXXXXXX",
};

/// Capacity of the publish topic string.
pub const MAX_TOPIC_LEN: usize = 96;

/// Longest a single bus transaction may take before the read is abandoned.
pub const SENSOR_TIMEOUT_MS: u64 = 500;
/// Longest a single broker call (connect, publish, disconnect) may take.
pub const PUBLISH_CALL_TIMEOUT_MS: u64 = 3_000;
/// Longest any one destination may take to accept a line. Covers a full
/// connect / publish / disconnect cycle.
pub const DESTINATION_DEADLINE_MS: u64 = 10_000;

/// Cadence parameters shared by every session type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    interval_s: NonZeroU32,
    stop: StopRule,
}

impl SessionConfig {
    pub fn new(interval_s: u32, stop: StopRule) -> Result<Self, ConfigError> {
        let interval_s = NonZeroU32::new(interval_s).ok_or(ConfigError::ZeroInterval)?;
        if let StopRule::WholeIntervals { max_duration_s } = stop {
            if max_duration_s < interval_s.get() {
                log::warn!(
                    "Max duration {}s is shorter than one {}s interval; session will report nothing",
                    max_duration_s,
                    interval_s
                );
            }
        }
        Ok(Self { interval_s, stop })
    }

    /// Timer-driven temperature station defaults.
    pub fn temperature() -> Result<Self, ConfigError> {
        Self::new(
            TEMPERATURE_INTERVAL_S,
            StopRule::ExceedsCeiling {
                ceiling_s: TEMPERATURE_CEILING_S,
            },
        )
    }

    /// Weather station defaults. Runs until power is removed.
    pub fn weather() -> Result<Self, ConfigError> {
        Self::new(WEATHER_INTERVAL_S, StopRule::Never)
    }

    pub const fn interval_s(&self) -> u32 {
        self.interval_s.get()
    }

    pub const fn stop(&self) -> StopRule {
        self.stop
    }

    /// A fresh cadence starting at zero elapsed seconds.
    pub const fn cadence(&self) -> Cadence {
        Cadence::new(self.interval_s, self.stop)
    }
}

/// Tachometer session parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TachometerConfig {
    pub session: SessionConfig,
    pub blade_count: NonZeroU16,
    pub edge: Edge,
}

impl TachometerConfig {
    pub fn new(
        interval_s: u32,
        blade_count: u16,
        max_duration_s: u32,
        edge: Edge,
    ) -> Result<Self, ConfigError> {
        let session = SessionConfig::new(interval_s, StopRule::WholeIntervals { max_duration_s })?;
        let blade_count = NonZeroU16::new(blade_count).ok_or(ConfigError::ZeroBlades)?;
        Ok(Self {
            session,
            blade_count,
            edge,
        })
    }

    pub fn from_defaults() -> Result<Self, ConfigError> {
        Self::new(
            TACHOMETER_INTERVAL_S,
            TACHOMETER_BLADES,
            TACHOMETER_MAX_DURATION_S,
            Edge::Falling,
        )
    }
}

/// Remote publish endpoint with its topic pre-rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    pub server: &'static str,
    pub client_id: &'static str,
    topic: heapless::String<MAX_TOPIC_LEN>,
}

impl PublishConfig {
    pub fn new(
        server: &'static str,
        client_id: &'static str,
        channel_id: &str,
        write_key: &str,
    ) -> Result<Self, ConfigError> {
        if channel_id.is_empty() || write_key.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }

        let mut topic = heapless::String::new();
        write!(topic, "channels/{}/publish/{}", channel_id, write_key)
            .map_err(|_| ConfigError::TopicTooLong(MAX_TOPIC_LEN))?;

        Ok(Self {
            server,
            client_id,
            topic,
        })
    }

    pub fn from_defaults() -> Result<Self, ConfigError> {
        Self::new(
            PUBLISH_SERVER,
            PUBLISH_CLIENT_ID,
            PUBLISH_CHANNEL_ID,
            PUBLISH_WRITE_KEY,
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}
