//! "Do work every T, stop after N*T"
//!
//! Both the tachometer and the deferred sampler pace themselves with a
//! [`Cadence`]. Elapsed time is a running total of nominal intervals, not a
//! wall-clock measurement: if a cycle runs late, the reported seconds drift
//! from real time. Downstream consumers rely on the nominal cadence.

use core::future::Future;
use core::num::NonZeroU32;

use embassy_time::{Duration, Ticker};

/// When a session stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRule {
    /// Run `max_duration_s / interval` cycles, rounded down. A remainder
    /// shorter than one interval is dropped.
    WholeIntervals { max_duration_s: u32 },
    /// Stop once the elapsed counter, advanced after each cycle, is greater
    /// than `ceiling_s`. A cycle at exactly the ceiling still runs.
    ExceedsCeiling { ceiling_s: u32 },
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    interval_s: NonZeroU32,
    stop: StopRule,
    elapsed_s: u32,
    cycles: u32,
}

impl Cadence {
    pub const fn new(interval_s: NonZeroU32, stop: StopRule) -> Self {
        Self {
            interval_s,
            stop,
            elapsed_s: 0,
            cycles: 0,
        }
    }

    pub const fn interval_s(&self) -> u32 {
        self.interval_s.get()
    }

    /// Nominal seconds elapsed before the current cycle.
    pub const fn elapsed_s(&self) -> u32 {
        self.elapsed_s
    }

    /// Number of completed cycles.
    pub const fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Total cycles this cadence will run, if bounded by a cycle count.
    pub const fn planned_cycles(&self) -> Option<u32> {
        match self.stop {
            StopRule::WholeIntervals { max_duration_s } => {
                Some(max_duration_s / self.interval_s.get())
            }
            _ => None,
        }
    }

    pub const fn is_finished(&self) -> bool {
        match self.stop {
            StopRule::WholeIntervals { max_duration_s } => {
                self.cycles >= max_duration_s / self.interval_s.get()
            }
            StopRule::ExceedsCeiling { ceiling_s } => self.elapsed_s > ceiling_s,
            StopRule::Never => false,
        }
    }

    /// Close the current cycle.
    pub fn advance(&mut self) {
        self.elapsed_s = self.elapsed_s.saturating_add(self.interval_s.get());
        self.cycles = self.cycles.saturating_add(1);
    }
}

/// Suspends task context for one reporting interval.
pub trait IntervalTimer {
    /// Start a fresh interval now. The next [`wait_interval`] returns one
    /// full period after this call.
    ///
    /// [`wait_interval`]: IntervalTimer::wait_interval
    fn restart(&mut self);

    fn wait_interval(&mut self) -> impl Future<Output = ()>;
}

/// [`IntervalTimer`] backed by an embassy [`Ticker`].
///
/// Ticks are scheduled from the previous deadline, so time spent reporting
/// does not stretch the interval.
pub struct TickerInterval {
    ticker: Ticker,
}

impl TickerInterval {
    pub fn new(period: Duration) -> Self {
        Self {
            ticker: Ticker::every(period),
        }
    }
}

impl IntervalTimer for TickerInterval {
    fn restart(&mut self) {
        self.ticker.reset();
    }

    async fn wait_interval(&mut self) {
        self.ticker.next().await;
    }
}
