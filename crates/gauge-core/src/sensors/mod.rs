//! Raw sensor readers
//!
//! Each driver performs one blocking-style acquisition and hands back an
//! opaque raw sample. Conversion helpers accept either a sample captured
//! earlier or read a fresh one, see [`SampleSource`].

mod sht31d;
mod tmp36;

pub use sht31d::{Sht31Frame, Sht31d};
pub use tmp36::{AdcSample, Tmp36};

#[cfg(test)]
pub(crate) use sht31d::tests as sht31d_fakes;

/// Where a conversion takes its raw input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource<T> {
    /// Perform a new acquisition.
    Fresh,
    /// Convert a sample captured earlier.
    Provided(T),
}

impl<T> From<T> for SampleSource<T> {
    fn from(sample: T) -> Self {
        Self::Provided(sample)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}
