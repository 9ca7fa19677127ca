//! Simulated board peripherals.
//!
//! Interrupt sources are std threads that call the same entry points a
//! board's handlers would: `EdgeCounter::on_edge` and
//! `DeferredRequest::request`. Everything else runs on the main thread.

use core::convert::Infallible;
use std::any::Any;
use std::io::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{Datelike, Local, Timelike};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use gauge_core::convert::{ADC_MAX_CODE, ADC_VREF_MV};
use gauge_core::error::ConfigError;
use gauge_core::hal::{AdcChannel, Clock, Edge, EdgeInterrupt, PeriodicTimer};
use gauge_core::record::Timestamp;
use gauge_core::report::{OLED_HEIGHT, OLED_WIDTH, OledFrame, Panel, PublishClient};
use gauge_core::{DeferredRequest, EdgeCounter};

/// Real time that stands for one simulated second.
#[derive(Debug, Clone, Copy)]
pub struct TimeScale(pub Duration);

impl TimeScale {
    pub fn seconds(self, s: u32) -> Duration {
        self.0 * s
    }

    /// The same span as an embassy duration, for tickers.
    pub fn interval(self, s: u32) -> embassy_time::Duration {
        let micros = u64::try_from(self.seconds(s).as_micros()).unwrap_or(u64::MAX);
        embassy_time::Duration::from_micros(micros)
    }
}

/// Background thread with a cooperative stop flag.
struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn(name: &str, body: impl FnOnce(Arc<AtomicBool>) + Send + 'static) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || body(flag))
            .unwrap_or_else(|e| panic!("failed to spawn {name} thread: {e}"));
        Self { stop, handle }
    }

    fn join(self) {
        self.stop.store(true, Ordering::Release);
        let name = self.handle.thread().name().unwrap_or("worker").to_owned();
        if let Err(panic) = self.handle.join() {
            error!("{} thread panicked: {}", name, panic_reason(panic.as_ref()));
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

// ---------------------------------------------------------------------------
// Tachometer
// ---------------------------------------------------------------------------

/// A fan whose speed ramps between two values, interrupting the light
/// beam once per blade.
pub struct SimFan {
    edges: &'static EdgeCounter,
    blades: u16,
    scale: TimeScale,
    worker: Option<Worker>,
}

impl SimFan {
    pub fn new(edges: &'static EdgeCounter, blades: u16, scale: TimeScale) -> Self {
        Self {
            edges,
            blades,
            scale,
            worker: None,
        }
    }

    /// Simulated speed at `t` simulated seconds.
    fn rpm_at(t: f64) -> f64 {
        1200.0 + 300.0 * (t / 7.0).sin()
    }
}

impl EdgeInterrupt for SimFan {
    fn enable(&mut self, edge: Edge) -> Result<(), ConfigError> {
        info!("Sense line armed for {:?} edges", edge);
        let edges = self.edges;
        let blades = f64::from(self.blades);
        let second = self.scale.0.as_secs_f64();

        self.worker = Some(Worker::spawn("fan", move |stop| {
            let start = Instant::now();
            let mut owed = 0.0f64;
            let mut last = start;
            while !stop.load(Ordering::Acquire) {
                thread::sleep(Duration::from_micros(500));
                let now = Instant::now();
                let t = now.duration_since(start).as_secs_f64() / second;
                let dt = now.duration_since(last).as_secs_f64() / second;
                last = now;

                // One counted edge per blade pass, see the tachometer formula.
                owed += Self::rpm_at(t) / 60.0 * blades * 2.0 * dt;
                while owed >= 1.0 {
                    edges.on_edge();
                    owed -= 1.0;
                }
            }
        }));
        Ok(())
    }

    fn disable(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Periodic timer
// ---------------------------------------------------------------------------

pub struct SimTimer {
    request: &'static DeferredRequest,
    scale: TimeScale,
    worker: Option<Worker>,
}

impl SimTimer {
    pub fn new(request: &'static DeferredRequest, scale: TimeScale) -> Self {
        Self {
            request,
            scale,
            worker: None,
        }
    }
}

impl PeriodicTimer for SimTimer {
    fn start(&mut self, period_s: u32) -> Result<(), ConfigError> {
        let request = self.request;
        let period = self.scale.seconds(period_s);
        self.worker = Some(Worker::spawn("timer", move |stop| {
            while !stop.load(Ordering::Acquire) {
                thread::sleep(period);
                if !request.request() {
                    debug!("Timer tick coalesced");
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// TMP36 hovering around room temperature.
#[derive(Default)]
pub struct SimAdc {
    conversions: u32,
}

impl AdcChannel for SimAdc {
    type Error = Infallible;

    async fn read_raw(&mut self) -> Result<u16, Self::Error> {
        self.conversions += 1;
        let celsius = 22.0 + 1.5 * (f64::from(self.conversions) / 3.0).sin();
        let millivolts = celsius * 10.0 + 500.0;
        Ok((millivolts * f64::from(ADC_MAX_CODE) / f64::from(ADC_VREF_MV)) as u16)
    }
}

/// SHT31-D that misses every fifth acknowledge.
pub struct SimSht31 {
    address: u8,
    measurements: u32,
    armed: bool,
}

impl SimSht31 {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            measurements: 0,
            armed: false,
        }
    }

    fn frame(&self) -> [u8; 6] {
        let t = f64::from(self.measurements);
        let celsius = 23.0 + 2.0 * (t / 4.0).sin();
        let humidity = 45.0 + 8.0 * (t / 6.0).cos();

        let raw_t = (((celsius + 45.0) / 175.0) * 65535.0) as u16;
        let raw_h = ((humidity / 100.0) * 65535.0) as u16;
        let [t0, t1] = raw_t.to_be_bytes();
        let [h0, h1] = raw_h.to_be_bytes();
        [t0, t1, crc8(&[t0, t1]), h0, h1, crc8(&[h0, h1])]
    }
}

/// Sensirion CRC-8: polynomial 0x31, init 0xFF.
fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0xFFu8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

impl ErrorType for SimSht31 {
    type Error = ErrorKind;
}

impl I2c for SimSht31 {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), ErrorKind> {
        if address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    self.measurements += 1;
                    if self.measurements % 5 == 0 {
                        return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
                    }
                    self.armed = *bytes == [0x24, 0x00];
                }
                Operation::Read(buf) => {
                    if !self.armed {
                        return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
                    }
                    let frame = self.frame();
                    let n = buf.len().min(frame.len());
                    buf[..n].copy_from_slice(&frame[..n]);
                    self.armed = false;
                }
            }
        }
        Ok(())
    }
}

pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> Option<Timestamp> {
        let now = Local::now();
        Some(Timestamp {
            year: u16::try_from(now.year()).ok()?,
            month: now.month() as u8,
            day: now.day() as u8,
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
        })
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Serial port that lands on stdout. Log output goes to stderr, so the
/// serial stream can be piped on its own.
pub struct StdoutSerial;

impl embedded_io::ErrorType for StdoutSerial {
    type Error = embedded_io::ErrorKind;
}

impl embedded_io_async::Write for StdoutSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::stdout()
            .write(buf)
            .map_err(|_| embedded_io::ErrorKind::BrokenPipe)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::stdout()
            .flush()
            .map_err(|_| embedded_io::ErrorKind::BrokenPipe)
    }
}

/// Broker client that drops every third connection attempt.
#[derive(Default)]
pub struct FlakyBroker {
    attempts: u32,
    connected: bool,
}

impl PublishClient for FlakyBroker {
    type Error = &'static str;

    async fn connect(&mut self, server: &str, client_id: &str) -> Result<(), Self::Error> {
        self.attempts += 1;
        if self.attempts % 3 == 0 {
            return Err("connection timed out");
        }
        debug!("{} connected to {}", client_id, server);
        self.connected = true;
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        if !self.connected {
            return Err("not connected");
        }
        info!(
            "PUBLISH {} {}",
            topic,
            core::str::from_utf8(payload).unwrap_or("<binary>")
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        Ok(())
    }
}

/// OLED panel that prints each shown frame to the log, downsampled 2x2.
#[derive(Default)]
pub struct TerminalPanel {
    frame: OledFrame,
}

impl TerminalPanel {
    fn render(&self) -> String {
        let mut out = String::new();
        for y in (0..OLED_HEIGHT).step_by(2) {
            for x in (0..OLED_WIDTH).step_by(2) {
                let lit = self.frame.is_lit(x, y)
                    || self.frame.is_lit(x + 1, y)
                    || self.frame.is_lit(x, y + 1)
                    || self.frame.is_lit(x + 1, y + 1);
                out.push(if lit { '#' } else { ' ' });
            }
            out.push('\n');
        }
        out
    }
}

impl OriginDimensions for TerminalPanel {
    fn size(&self) -> Size {
        self.frame.size()
    }
}

impl DrawTarget for TerminalPanel {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.frame.draw_iter(pixels)
    }
}

impl Panel for TerminalPanel {
    fn show(&mut self) -> Result<(), Infallible> {
        self.frame.show()?;
        info!(
            "OLED frame {}:\n{}",
            self.frame.frames_shown(),
            self.render()
        );
        Ok(())
    }
}
