//! Desktop simulator for the gauge sampling pipelines.
//!
//! Runs each instrument with its deployed configuration against simulated
//! peripherals, with simulated time running 50x faster than wall time.
//! Interrupt sources are std threads; the sampling loop runs on the main
//! thread.
//!
//! # Usage
//!
//! ```text
//! gauge-simulator [tachometer|temperature|weather|all]
//! ```
//!
//! The weather station has no stop rule and runs until interrupted, so
//! `all` runs it last. Serial output goes to stdout, logs (including the
//! console sink and OLED frames) to stderr. Set `RUST_LOG=debug` for
//! per-interval detail.

mod peripherals;

use std::process::ExitCode;
use std::time::Duration;

use embassy_futures::block_on;
use embassy_time::Delay;
use log::{error, info};

use gauge_core::cadence::TickerInterval;
use gauge_core::config::{
    PublishConfig, SHT31D_ADDRESS, SHT31D_ALT_ADDRESS, SessionConfig, TachometerConfig,
};
use gauge_core::pipelines::{TemperatureStation, WeatherStation};
use gauge_core::report::{ConsoleSink, DisplaySink, PublishSink, SerialSink};
use gauge_core::sensors::{Sht31d, Tmp36};
use gauge_core::{ConfigError, DeferredRequest, DeferredSampler, EdgeCounter, TachometerSession};

use peripherals::{
    FlakyBroker, LocalClock, SimAdc, SimFan, SimSht31, SimTimer, StdoutSerial, TerminalPanel,
    TimeScale,
};

// ---------------------------------------------------------------------------
// Shared interrupt state
// ---------------------------------------------------------------------------

static EDGES: EdgeCounter = EdgeCounter::new();
static TICKS: DeferredRequest = DeferredRequest::new();

/// Wall time per simulated second.
const SCALE: TimeScale = TimeScale(Duration::from_millis(20));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instrument {
    Tachometer,
    Temperature,
    Weather,
}

impl Instrument {
    fn parse(arg: &str) -> Option<&'static [Instrument]> {
        match arg {
            "tachometer" => Some(&[Instrument::Tachometer]),
            "temperature" => Some(&[Instrument::Temperature]),
            "weather" => Some(&[Instrument::Weather]),
            "all" => Some(&[
                Instrument::Tachometer,
                Instrument::Temperature,
                Instrument::Weather,
            ]),
            _ => None,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let arg = std::env::args().nth(1).unwrap_or_else(|| "all".into());
    let Some(instruments) = Instrument::parse(&arg) else {
        eprintln!("usage: gauge-simulator [tachometer|temperature|weather|all]");
        return ExitCode::FAILURE;
    };

    for instrument in instruments {
        info!("=== {:?} ===", instrument);
        let result = match instrument {
            Instrument::Tachometer => run_tachometer(),
            Instrument::Temperature => run_temperature(),
            Instrument::Weather => run_weather(),
        };
        if let Err(e) = result {
            error!("{:?} session could not start: {}", instrument, e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

fn run_tachometer() -> Result<(), ConfigError> {
    let config = TachometerConfig::from_defaults()?;
    let mut fan = SimFan::new(&EDGES, config.blade_count.get(), SCALE);
    let mut interval = TickerInterval::new(SCALE.interval(config.session.interval_s()));
    let mut sink = (ConsoleSink, SerialSink::new(StdoutSerial));

    let session = TachometerSession::new(config);
    block_on(session.run(&EDGES, &mut fan, &mut interval, &mut sink))?;
    Ok(())
}

fn run_temperature() -> Result<(), ConfigError> {
    let sht31d = Sht31d::new(SimSht31::new(SHT31D_ADDRESS), Delay, SHT31D_ADDRESS)?;
    let station = TemperatureStation::new(Tmp36::new(SimAdc::default()), sht31d, LocalClock);

    let mut timer = SimTimer::new(&TICKS, SCALE);
    let mut sink = (ConsoleSink, SerialSink::new(StdoutSerial));

    let mut sampler = DeferredSampler::new(station, SessionConfig::temperature()?);
    block_on(sampler.run(&TICKS, &mut timer, &mut sink))?;
    Ok(())
}

fn run_weather() -> Result<(), ConfigError> {
    let sht31d = Sht31d::new(SimSht31::new(SHT31D_ALT_ADDRESS), Delay, SHT31D_ALT_ADDRESS)?;
    let publish = PublishSink::new(FlakyBroker::default(), PublishConfig::from_defaults()?);

    let mut timer = SimTimer::new(&TICKS, SCALE);
    let mut sink = (
        ConsoleSink,
        DisplaySink::new(TerminalPanel::default()),
        publish,
    );

    let mut sampler = DeferredSampler::new(WeatherStation::new(sht31d), SessionConfig::weather()?);
    block_on(sampler.run(&TICKS, &mut timer, &mut sink))?;
    Ok(())
}
