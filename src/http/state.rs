//! Application state for the HTTP server.

use std::time::Duration;

use crate::ingestion::IngestionService;
use crate::sensor::SensorGenerator;

/// Shared application state passed to all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Ingestion service behind `/api/parse`.
    pub service: IngestionService,
    pub sensor: SensorGenerator,
    /// Interval between `/api/stream` events.
    pub sensor_interval: Duration,
}

impl AppState {
    pub fn new(service: IngestionService) -> Self {
        Self {
            service,
            sensor: SensorGenerator::new(),
            sensor_interval: Duration::from_secs(2),
        }
    }

    pub fn with_sensor_interval(mut self, interval: Duration) -> Self {
        self.sensor_interval = interval;
        self
    }
}
