//! Weather provider adapters.

mod openweather;

pub use openweather::{OpenWeatherConfig, OpenWeatherService};
