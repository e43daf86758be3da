//! HTTP handlers for the REST API.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use tracing::{debug, warn};

use super::dto::{HealthResponse, ParseResponse, SensorReading, WelcomeResponse};
use super::error::AppError;
use super::state::AppState;
use crate::types::UploadPayload;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// GET /api
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the Sensor Dashboard API".to_string(),
    })
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        formats: state
            .service
            .registry()
            .supported()
            .iter()
            .map(|t| format!(".{t}"))
            .collect(),
    })
}

/// POST /api/parse
///
/// Multipart upload; the first field carrying a filename is parsed. The format is chosen from
/// the filename's extension.
pub async fn parse_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> HandlerResult<ParseResponse> {
    let payload = read_upload(multipart?).await?;
    let filename = payload.filename.clone();

    let ingested = state
        .service
        .try_ingest(payload)
        .await
        .map_err(|e| AppError::ingestion(&filename, e))?;

    Ok(Json(ParseResponse {
        file: ingested.filename,
        status: "parsed",
        row_count: ingested.records.len(),
        columns: ingested.columns,
        data: ingested.records,
    }))
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadPayload, AppError> {
    while let Some(field) = multipart.next_field().await? {
        let filename = match field.file_name() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => {
                debug!(field = ?field.name(), "skipping multipart field without a filename");
                continue;
            }
        };
        let bytes = field.bytes().await?;
        return Ok(UploadPayload::new(filename, bytes));
    }
    Err(AppError::BadRequest(
        "no file uploaded: expected a multipart field with a filename".to_string(),
    ))
}

/// GET /api/current
pub async fn current_reading(State(state): State<AppState>) -> Json<SensorReading> {
    Json(state.sensor.reading())
}

/// GET /api/stream
///
/// Server-sent events: one `sensor_update` per interval until the client disconnects.
pub async fn stream_readings(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let sensor = state.sensor;
    let mut ticker = tokio::time::interval(state.sensor_interval);

    let stream = async_stream::stream! {
        loop {
            ticker.tick().await;
            match Event::default().event("sensor_update").json_data(sensor.reading()) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!(error = %e, "failed to encode sensor reading"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
