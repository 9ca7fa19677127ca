//! Concrete timer-driven instruments

mod temperature;
mod weather;

pub use temperature::{TEMPERATURE_FORMAT, TemperatureStation};
pub use weather::{WEATHER_FORMAT, WeatherStation};
