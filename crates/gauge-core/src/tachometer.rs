//! Edge-counting tachometer
//!
//! The sense-line interrupt calls [`EdgeCounter::on_edge`]; once per
//! interval the session loop takes the count with
//! [`EdgeCounter::read_and_reset`] and converts it to RPM.
//!
//! ```rust,ignore
//! static EDGES: EdgeCounter = EdgeCounter::new();
//!
//! #[handler]
//! fn sense_line() {
//!     EDGES.on_edge();
//! }
//! ```

use core::cell::Cell;

use critical_section::Mutex;
use log::{debug, info};

use crate::cadence::IntervalTimer;
use crate::config::TachometerConfig;
use crate::convert;
use crate::error::ConfigError;
use crate::hal::EdgeInterrupt;
use crate::record::{MeasurementRecord, Quantity, RecordFormat};
use crate::report::{ReportingSink, SessionSummary};

pub const TACHOMETER_FORMAT: RecordFormat = RecordFormat {
    header: "Seconds, RPM",
    separator: ",",
};

/// Edges seen since the last reset, shared between one interrupt handler
/// and one task-context reader.
pub struct EdgeCounter {
    count: Mutex<Cell<u32>>,
}

impl Default for EdgeCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeCounter {
    pub const fn new() -> Self {
        Self {
            count: Mutex::new(Cell::new(0)),
        }
    }

    /// Count one edge. Interrupt context; bounded, never blocks.
    #[inline]
    pub fn on_edge(&self) {
        critical_section::with(|cs| {
            let count = self.count.borrow(cs);
            count.set(count.get().saturating_add(1));
        });
    }

    /// Take the count and reset it to zero in one critical section.
    ///
    /// Task context only, single consumer. An edge arriving while the
    /// section is held is latched by the interrupt controller and counted
    /// after it, in the next interval.
    pub fn read_and_reset(&self) -> u32 {
        critical_section::with(|cs| self.count.borrow(cs).replace(0))
    }

    pub fn peek(&self) -> u32 {
        critical_section::with(|cs| self.count.borrow(cs).get())
    }
}

/// Fixed-interval RPM reporting over an [`EdgeCounter`].
pub struct TachometerSession {
    config: TachometerConfig,
}

impl TachometerSession {
    pub const fn new(config: TachometerConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &TachometerConfig {
        &self.config
    }

    /// Run the session to completion.
    ///
    /// Edges counted before the session starts, including while the header
    /// is written, are discarded, and the first interval starts only after
    /// that. The interrupt is masked again once the last interval has been
    /// reported.
    pub async fn run<E, T, S>(
        &self,
        edges: &EdgeCounter,
        interrupt: &mut E,
        timer: &mut T,
        sink: &mut S,
    ) -> Result<SessionSummary, ConfigError>
    where
        E: EdgeInterrupt,
        T: IntervalTimer,
        S: ReportingSink,
    {
        let interval_s = self.config.session.interval_s();
        let blades = self.config.blade_count.get();
        let mut cadence = self.config.session.cadence();
        let mut summary = SessionSummary::default();

        info!(
            "Tachometer: {} blades, {}s interval, {:?} cycles",
            blades,
            interval_s,
            cadence.planned_cycles()
        );

        interrupt.enable(self.config.edge)?;
        summary.record_delivery(sink.header(&TACHOMETER_FORMAT).await);
        edges.read_and_reset();
        timer.restart();

        while !cadence.is_finished() {
            timer.wait_interval().await;

            let count = edges.read_and_reset();
            let rpm = convert::rpm(count, blades, interval_s);
            debug!("{} edges in {}s: {} rpm", count, interval_s, rpm);

            let record = MeasurementRecord::new(cadence.elapsed_s()).with(Quantity::Rpm, rpm);
            let delivery = sink.report(&TACHOMETER_FORMAT, &record).await;
            summary.record_delivery(delivery);

            cadence.advance();
            summary.cycles = cadence.cycles();
        }

        interrupt.disable();
        summary.log("Tachometer");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::Edge;
    use crate::report::tests::Recorder;
    use embassy_futures::block_on;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_read_and_reset_twice() {
        let counter = EdgeCounter::new();
        for _ in 0..7 {
            counter.on_edge();
        }
        assert_eq!(counter.read_and_reset(), 7);
        assert_eq!(counter.read_and_reset(), 0);
    }

    #[test]
    fn test_peek_does_not_reset() {
        let counter = EdgeCounter::new();
        counter.on_edge();
        assert_eq!(counter.peek(), 1);
        assert_eq!(counter.peek(), 1);
        assert_eq!(counter.read_and_reset(), 1);
    }

    #[test]
    fn test_concurrent_edges_never_lost() {
        const EDGES: u32 = 200_000;
        let counter = EdgeCounter::new();
        let done = AtomicBool::new(false);
        let mut total = 0u32;

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..EDGES {
                    counter.on_edge();
                    if i % 1000 == 0 {
                        std::thread::yield_now();
                    }
                }
                done.store(true, Ordering::Release);
            });

            while !done.load(Ordering::Acquire) {
                total += counter.read_and_reset();
                std::thread::yield_now();
            }
        });
        total += counter.read_and_reset();

        assert_eq!(total, EDGES);
    }

    /// Edge source that fires a scripted number of edges per interval.
    struct ScriptedFan<'a> {
        counter: &'a EdgeCounter,
        per_interval: std::vec::Vec<u32>,
        waits: usize,
        events: std::vec::Vec<&'static str>,
    }

    impl<'a> ScriptedFan<'a> {
        fn new(counter: &'a EdgeCounter, per_interval: std::vec::Vec<u32>) -> Self {
            Self {
                counter,
                per_interval,
                waits: 0,
                events: std::vec::Vec::new(),
            }
        }
    }

    impl IntervalTimer for ScriptedFan<'_> {
        fn restart(&mut self) {
            self.events.push("restart");
        }

        async fn wait_interval(&mut self) {
            self.events.push("wait");
            let edges = self.per_interval.get(self.waits).copied().unwrap_or(0);
            for _ in 0..edges {
                self.counter.on_edge();
            }
            self.waits += 1;
        }
    }

    #[derive(Default)]
    struct FakeLine {
        enabled: Option<Edge>,
        disabled: bool,
    }

    impl EdgeInterrupt for FakeLine {
        fn enable(&mut self, edge: Edge) -> Result<(), ConfigError> {
            self.enabled = Some(edge);
            Ok(())
        }

        fn disable(&mut self) {
            self.disabled = true;
        }
    }

    struct DeadLine;

    impl EdgeInterrupt for DeadLine {
        fn enable(&mut self, _edge: Edge) -> Result<(), ConfigError> {
            Err(ConfigError::Attach("sense line"))
        }

        fn disable(&mut self) {}
    }

    #[test]
    fn test_session_reports_floor_intervals() {
        let counter = EdgeCounter::new();
        let config = TachometerConfig::new(10, 5, 25, Edge::Falling).unwrap();
        let mut fan = ScriptedFan::new(&counter, std::vec![100, 50, 25]);
        let mut line = FakeLine::default();
        let mut sink = (Recorder::new("console"),);

        let summary = block_on(TachometerSession::new(config).run(
            &counter,
            &mut line,
            &mut fan,
            &mut sink,
        ))
        .unwrap();

        // floor(25 / 10) = 2 cycles; 100 edges * 60 / (2 * 5 * 10) = 60 rpm
        assert_eq!(summary.cycles, 2);
        assert_eq!(fan.waits, 2);
        assert_eq!(fan.events, ["restart", "wait", "wait"]);
        assert_eq!(sink.0.lines, ["Seconds, RPM", "0,60.00", "10,30.00"]);
        assert_eq!(line.enabled, Some(Edge::Falling));
        assert!(line.disabled);
    }

    #[test]
    fn test_edges_before_start_discarded() {
        let counter = EdgeCounter::new();
        for _ in 0..1000 {
            counter.on_edge();
        }
        let config = TachometerConfig::new(2, 5, 2, Edge::Rising).unwrap();
        let mut fan = ScriptedFan::new(&counter, std::vec![0]);
        let mut sink = (Recorder::new("console"),);

        block_on(TachometerSession::new(config).run(
            &counter,
            &mut FakeLine::default(),
            &mut fan,
            &mut sink,
        ))
        .unwrap();

        assert_eq!(sink.0.lines, ["Seconds, RPM", "0,0.00"]);
    }

    /// Destination whose header write takes long enough for the fan to
    /// keep spinning.
    struct SlowHeader<'a> {
        counter: &'a EdgeCounter,
    }

    impl crate::report::Destination for SlowHeader<'_> {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn write_header(
            &mut self,
            _format: &RecordFormat,
        ) -> Result<(), crate::error::SinkError> {
            for _ in 0..700 {
                self.counter.on_edge();
            }
            Ok(())
        }

        async fn write_record(
            &mut self,
            _format: &RecordFormat,
            _record: &MeasurementRecord,
        ) -> Result<(), crate::error::SinkError> {
            Ok(())
        }
    }

    #[test]
    fn test_first_interval_excludes_header_time() {
        let counter = EdgeCounter::new();
        let config = TachometerConfig::new(1, 1, 2, Edge::Falling).unwrap();
        let mut fan = ScriptedFan::new(&counter, std::vec![1000, 1000]);
        let mut sink = (SlowHeader { counter: &counter }, Recorder::new("console"));

        block_on(TachometerSession::new(config).run(
            &counter,
            &mut FakeLine::default(),
            &mut fan,
            &mut sink,
        ))
        .unwrap();

        // Every interval sees a full window: 1000 * 60 / 2 = 30000 rpm.
        assert_eq!(
            sink.1.lines,
            ["Seconds, RPM", "0,30000.00", "1,30000.00"]
        );
        assert_eq!(fan.events.first(), Some(&"restart"));
    }

    #[test]
    fn test_failing_destination_does_not_stop_session() {
        let counter = EdgeCounter::new();
        let config = TachometerConfig::new(1, 1, 3, Edge::Falling).unwrap();
        let mut fan = ScriptedFan::new(&counter, std::vec![1, 2, 3]);
        let mut sink = (Recorder::failing("publish"), Recorder::new("serial"));

        let summary = block_on(TachometerSession::new(config).run(
            &counter,
            &mut FakeLine::default(),
            &mut fan,
            &mut sink,
        ))
        .unwrap();

        assert_eq!(summary.cycles, 3);
        // Header plus three records.
        assert_eq!(summary.delivery_failures, 4);
        assert_eq!(
            sink.1.lines,
            ["Seconds, RPM", "0,30.00", "1,60.00", "2,90.00"]
        );
    }

    #[test]
    fn test_attach_failure_is_fatal() {
        let counter = EdgeCounter::new();
        let config = TachometerConfig::new(1, 1, 3, Edge::Falling).unwrap();
        let mut fan = ScriptedFan::new(&counter, std::vec::Vec::new());
        let mut sink = (Recorder::new("console"),);

        let result = block_on(TachometerSession::new(config).run(
            &counter,
            &mut DeadLine,
            &mut fan,
            &mut sink,
        ));

        assert_eq!(result, Err(ConfigError::Attach("sense line")));
        assert_eq!(fan.waits, 0);
        assert!(sink.0.lines.is_empty());
    }
}
