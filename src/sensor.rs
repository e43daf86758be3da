//! Mock environmental sensor backing the dashboard endpoints.

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;

/// One simulated reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Hectopascals.
    pub pressure: f64,
}

/// Produces random readings within plausible indoor ranges.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorGenerator;

impl SensorGenerator {
    pub const TEMPERATURE_RANGE: (f64, f64) = (20.0, 30.0);
    pub const HUMIDITY_RANGE: (f64, f64) = (30.0, 70.0);
    pub const PRESSURE_RANGE: (f64, f64) = (980.0, 1020.0);

    pub fn new() -> Self {
        Self
    }

    pub fn reading(&self) -> SensorReading {
        let mut rng = rand::thread_rng();
        SensorReading {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            temperature: sample(&mut rng, Self::TEMPERATURE_RANGE),
            humidity: sample(&mut rng, Self::HUMIDITY_RANGE),
            pressure: sample(&mut rng, Self::PRESSURE_RANGE),
        }
    }
}

/// Uniform sample in `[lo, hi]`, rounded to two decimals.
fn sample(rng: &mut impl Rng, (lo, hi): (f64, f64)) -> f64 {
    let v = rng.gen_range(lo..=hi);
    ((v * 100.0).round() / 100.0).clamp(lo, hi)
}
