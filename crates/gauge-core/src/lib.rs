//! Hardware-independent sampling core for gauge
//!
//! This crate contains the platform-agnostic logic for three small
//! instruments: an optical fan tachometer, a timer-driven temperature
//! station and a networked weather station. Each one counts or requests
//! work from interrupt context, then converts and reports from task
//! context on a fixed cadence.
//!
//! It is `#![no_std]` and allocation-free so it compiles on embedded targets
//! and on desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

pub mod cadence;
pub mod config;
pub mod convert;
pub mod deferred;
pub mod error;
pub mod hal;
pub mod pipelines;
pub mod record;
pub mod report;
pub mod sensors;
pub mod tachometer;

pub use cadence::{Cadence, StopRule};
pub use deferred::{DeferredRequest, DeferredSampler};
pub use error::{ConfigError, SensorError, SinkError};
pub use record::{MeasurementRecord, Quantity, RecordFormat};
pub use report::{Delivery, ReportingSink, SessionSummary};
pub use tachometer::{EdgeCounter, TachometerSession};
