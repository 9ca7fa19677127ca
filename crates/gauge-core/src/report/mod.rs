//! Reporting sink
//!
//! A sink is a fixed set of [`Destination`]s, written as a tuple:
//! `(ConsoleSink, SerialSink<U>, PublishSink<C>)`. Every destination is
//! written on every interval. One destination failing is logged and
//! counted, and never stops the others from receiving the record. A
//! destination that does not finish within its [`Destination::deadline`]
//! counts as failed.

mod console;
mod display;
mod publish;
mod serial;

pub use console::ConsoleSink;
pub use display::{DisplaySink, OledFrame, Panel, OLED_HEIGHT, OLED_WIDTH};
pub use publish::{PublishClient, PublishSink};
pub use serial::SerialSink;

use core::future::Future;

use embassy_time::{Duration, with_timeout};
use log::{info, warn};

use crate::config::DESTINATION_DEADLINE_MS;
use crate::error::SinkError;
use crate::record::{MeasurementRecord, RecordFormat};

/// One output of a reporting sink.
pub trait Destination {
    fn name(&self) -> &'static str;

    /// Upper bound on one header or record write.
    fn deadline(&self) -> Duration {
        Duration::from_millis(DESTINATION_DEADLINE_MS)
    }

    /// Emitted once, before the first record of a session.
    fn write_header(&mut self, format: &RecordFormat) -> impl Future<Output = Result<(), SinkError>>;

    fn write_record(
        &mut self,
        format: &RecordFormat,
        record: &MeasurementRecord,
    ) -> impl Future<Output = Result<(), SinkError>>;
}

/// Outcome of writing to every destination of a sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: u8,
    pub failed: u8,
}

impl Delivery {
    fn note(&mut self, destination: &'static str, result: Result<(), SinkError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(e) => {
                warn!("Destination {} failed: {}", destination, e);
                self.failed += 1;
            }
        }
    }

    pub const fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

async fn within<F>(destination: &'static str, deadline: Duration, write: F) -> Result<(), SinkError>
where
    F: Future<Output = Result<(), SinkError>>,
{
    with_timeout(deadline, write)
        .await
        .unwrap_or(Err(SinkError::Timeout { destination }))
}

/// Fan-out over a tuple of destinations.
pub trait ReportingSink {
    fn header(&mut self, format: &RecordFormat) -> impl Future<Output = Delivery>;

    fn report(
        &mut self,
        format: &RecordFormat,
        record: &MeasurementRecord,
    ) -> impl Future<Output = Delivery>;
}

macro_rules! impl_reporting_sink {
    ($($dest:ident $idx:tt),+) => {
        impl<$($dest: Destination),+> ReportingSink for ($($dest,)+) {
            async fn header(&mut self, format: &RecordFormat) -> Delivery {
                let mut delivery = Delivery::default();
                $(
                    let name = self.$idx.name();
                    let deadline = self.$idx.deadline();
                    let result = within(name, deadline, self.$idx.write_header(format)).await;
                    delivery.note(name, result);
                )+
                delivery
            }

            async fn report(
                &mut self,
                format: &RecordFormat,
                record: &MeasurementRecord,
            ) -> Delivery {
                let mut delivery = Delivery::default();
                $(
                    let name = self.$idx.name();
                    let deadline = self.$idx.deadline();
                    let result =
                        within(name, deadline, self.$idx.write_record(format, record)).await;
                    delivery.note(name, result);
                )+
                delivery
            }
        }
    };
}

impl_reporting_sink!(A 0);
impl_reporting_sink!(A 0, B 1);
impl_reporting_sink!(A 0, B 1, C 2);
impl_reporting_sink!(A 0, B 1, C 2, D 3);

/// Totals for one finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Intervals that completed, reported or not.
    pub cycles: u32,
    /// Intervals whose record could not be acquired.
    pub skipped: u32,
    /// Failed destination writes, summed over all intervals.
    pub delivery_failures: u32,
}

impl SessionSummary {
    pub(crate) fn record_delivery(&mut self, delivery: Delivery) {
        self.delivery_failures += u32::from(delivery.failed);
    }

    pub(crate) fn log(&self, session: &str) {
        info!(
            "{} finished: {} cycles, {} skipped, {} failed deliveries",
            session, self.cycles, self.skipped, self.delivery_failures
        );
    }
}
