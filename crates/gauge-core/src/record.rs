//! Measurement records and their text layout

use core::fmt::{self, Write};

use crate::error::SinkError;

/// Most quantities a single record carries.
pub const MAX_READINGS: usize = 4;

/// Capacity of one formatted text line.
pub const LINE_CAPACITY: usize = 128;

pub type Line = heapless::String<LINE_CAPACITY>;

/// Local calendar time, as reported by a [`Clock`](crate::hal::Clock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Physical quantity a reading is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Rpm,
    Celsius,
    Fahrenheit,
    RelativeHumidity,
}

impl Quantity {
    /// Short label for the display
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rpm => "RPM ",
            Self::Celsius | Self::Fahrenheit => "Temp",
            Self::RelativeHumidity => "Humi",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
            Self::RelativeHumidity => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub quantity: Quantity,
    pub value: f32,
}

/// Header and field separator of one pipeline's text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFormat {
    pub header: &'static str,
    pub separator: &'static str,
}

/// Snapshot of one reporting interval. Built once, reported, dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    elapsed_s: u32,
    timestamp: Option<Timestamp>,
    readings: heapless::Vec<Reading, MAX_READINGS>,
}

impl MeasurementRecord {
    pub const fn new(elapsed_s: u32) -> Self {
        Self {
            elapsed_s,
            timestamp: None,
            readings: heapless::Vec::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: Option<Timestamp>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Append a reading. Readings beyond [`MAX_READINGS`] are dropped.
    pub fn with(mut self, quantity: Quantity, value: f32) -> Self {
        if self.readings.push(Reading { quantity, value }).is_err() {
            log::warn!("Record full, dropping {:?} reading", quantity);
        }
        self
    }

    pub const fn elapsed_s(&self) -> u32 {
        self.elapsed_s
    }

    pub const fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// First reading of the given quantity.
    pub fn value(&self, quantity: Quantity) -> Option<f32> {
        self.readings
            .iter()
            .find(|r| r.quantity == quantity)
            .map(|r| r.value)
    }

    /// Render the separated data line, without a line terminator.
    pub fn write_line<W: Write>(&self, out: &mut W, format: &RecordFormat) -> fmt::Result {
        if let Some(timestamp) = self.timestamp {
            write!(out, "{}{}", timestamp, format.separator)?;
        }
        write!(out, "{}", self.elapsed_s)?;
        for reading in &self.readings {
            write!(out, "{}{:.2}", format.separator, reading.value)?;
        }
        Ok(())
    }

    pub fn to_line(&self, format: &RecordFormat) -> Result<Line, SinkError> {
        let mut line = Line::new();
        self.write_line(&mut line, format)
            .map_err(|_| SinkError::LineOverflow)?;
        Ok(line)
    }
}
