//! Narrow hardware interface consumed by the sampling core
//!
//! Board crates implement these traits on top of their HAL. The core never
//! configures pins or peripherals itself; it only asks for raw readings and
//! for interrupt sources to be switched on and off around a session.
//!
//! I2C access goes through [`embedded_hal_async::i2c::I2c`] directly, serial
//! output through [`embedded_io_async::Write`].

use core::fmt::Debug;
use core::future::Future;

use crate::error::ConfigError;

/// Polarity of the transition that counts as one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// A single 12-bit ADC input.
pub trait AdcChannel {
    type Error: Debug;

    /// Perform one conversion and return the raw code.
    fn read_raw(&mut self) -> impl Future<Output = Result<u16, Self::Error>>;
}

/// A sense line wired to an edge interrupt.
///
/// The board's interrupt handler must call
/// [`EdgeCounter::on_edge`](crate::tachometer::EdgeCounter::on_edge) and
/// nothing else.
pub trait EdgeInterrupt {
    /// Unmask the interrupt for the given polarity.
    fn enable(&mut self, edge: Edge) -> Result<(), ConfigError>;

    /// Mask the interrupt.
    fn disable(&mut self);
}

/// A hardware timer firing a periodic interrupt.
///
/// The board's interrupt handler must call
/// [`DeferredRequest::request`](crate::deferred::DeferredRequest::request)
/// and nothing else.
pub trait PeriodicTimer {
    /// Start firing every `period_s` seconds.
    fn start(&mut self, period_s: u32) -> Result<(), ConfigError>;

    /// Stop the timer. No interrupt fires after this returns.
    fn stop(&mut self);
}

/// Wall-clock source for timestamped records.
pub trait Clock {
    /// Current local time, or `None` when the clock has not been set.
    fn now(&self) -> Option<crate::record::Timestamp>;
}
