//! Timer-triggered deferred sampling
//!
//! The periodic timer interrupt only calls [`DeferredRequest::request`].
//! The slow part (bus reads, formatting, network) runs in task context in
//! [`DeferredSampler::run`], woken by that request.
//!
//! At most one run is outstanding. The pending flag is set by the interrupt
//! and cleared when the run completes, so ticks that arrive while a run is
//! pending or in progress are coalesced into it. Under sustained overload
//! sample periods are silently skipped instead of queueing up.

use core::future::{Future, poll_fn};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use core::task::Poll;

use embassy_sync::waitqueue::AtomicWaker;
use log::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{ConfigError, SensorError};
use crate::hal::PeriodicTimer;
use crate::record::{MeasurementRecord, RecordFormat};
use crate::report::{ReportingSink, SessionSummary};

/// Single-slot, coalescing request for deferred work.
pub struct DeferredRequest {
    pending: AtomicBool,
    active: AtomicBool,
    coalesced: AtomicU32,
    waker: AtomicWaker,
}

impl Default for DeferredRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredRequest {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            active: AtomicBool::new(false),
            coalesced: AtomicU32::new(0),
            waker: AtomicWaker::new(),
        }
    }

    /// Ask for one deferred run. Interrupt context; never blocks.
    ///
    /// Returns `true` if this call queued a run, `false` if it was coalesced
    /// into an outstanding one or the sampler is not active.
    pub fn request(&self) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        if self.pending.swap(true, Ordering::AcqRel) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.waker.wake();
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Requests absorbed by an outstanding run since activation.
    pub fn coalesced(&self) -> u32 {
        self.coalesced.load(Ordering::Relaxed)
    }

    fn activate(&self) {
        self.pending.store(false, Ordering::Release);
        self.coalesced.store(0, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        self.pending.store(false, Ordering::Release);
    }

    fn wait(&self) -> impl Future<Output = ()> + '_ {
        poll_fn(|cx| {
            if self.is_pending() {
                return Poll::Ready(());
            }
            self.waker.register(cx.waker());
            // A request may have landed between the check and the register.
            if self.is_pending() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
    }

    fn complete(&self) {
        self.pending.store(false, Ordering::Release);
    }
}

/// Task-context work for one interval: read every sensor and build the
/// record.
pub trait Acquisition {
    const FORMAT: RecordFormat;

    fn acquire(
        &mut self,
        elapsed_s: u32,
    ) -> impl Future<Output = Result<MeasurementRecord, SensorError>>;
}

/// Runs an [`Acquisition`] once per timer request until the session's stop
/// rule is met.
pub struct DeferredSampler<A> {
    acquisition: A,
    config: SessionConfig,
}

impl<A: Acquisition> DeferredSampler<A> {
    pub const fn new(acquisition: A, config: SessionConfig) -> Self {
        Self {
            acquisition,
            config,
        }
    }

    pub fn acquisition(&self) -> &A {
        &self.acquisition
    }

    /// Start the timer and serve its requests.
    ///
    /// The elapsed counter advances by the nominal interval after each run,
    /// whether or not the run produced a record. Once it passes the stop
    /// rule the timer is stopped and no further runs happen.
    pub async fn run<T, S>(
        &mut self,
        request: &DeferredRequest,
        timer: &mut T,
        sink: &mut S,
    ) -> Result<SessionSummary, ConfigError>
    where
        T: PeriodicTimer,
        S: ReportingSink,
    {
        let mut cadence = self.config.cadence();
        let mut summary = SessionSummary::default();

        request.activate();
        if let Err(e) = timer.start(self.config.interval_s()) {
            request.deactivate();
            return Err(e);
        }
        summary.record_delivery(sink.header(&A::FORMAT).await);

        info!(
            "Deferred sampler started: {}s interval, stop {:?}",
            cadence.interval_s(),
            self.config.stop()
        );

        while !cadence.is_finished() {
            request.wait().await;

            match self.acquisition.acquire(cadence.elapsed_s()).await {
                Ok(record) => {
                    let delivery = sink.report(&A::FORMAT, &record).await;
                    summary.record_delivery(delivery);
                }
                Err(e) => {
                    warn!("Skipping interval at {}s: {}", cadence.elapsed_s(), e);
                    summary.skipped += 1;
                }
            }

            cadence.advance();
            summary.cycles = cadence.cycles();
            request.complete();
            debug!("Deferred run done, {} requests coalesced", request.coalesced());
        }

        timer.stop();
        request.deactivate();
        info!("Finished collecting data after {}s", cadence.elapsed_s());
        summary.log("Deferred sampler");
        Ok(summary)
    }
}
