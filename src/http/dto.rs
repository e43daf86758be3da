//! Data Transfer Objects for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::ingestion::RecordSet;
use crate::types::Schema;

pub use crate::sensor::SensorReading;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Response of `GET /api`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Accepted upload extensions, with the leading dot.
    pub formats: Vec<String>,
}

/// Response of `POST /api/parse`.
#[derive(Debug, Clone, Serialize)]
pub struct ParseResponse {
    /// Uploaded filename.
    pub file: String,
    /// Always `"parsed"`.
    pub status: &'static str,
    /// Column names and inferred types, in order.
    pub columns: Schema,
    pub row_count: usize,
    /// One object per row, keyed by column name.
    pub data: RecordSet,
}
