use std::error::Error as StdError;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::ingestion::observability::IngestionSeverity;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Client-facing classification of an [`IngestionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The filename's extension is not one of the supported formats.
    UnsupportedFormat,
    /// The payload was recognized but is malformed for its declared format.
    DecodeError,
    /// The upload exceeds a configured bound.
    LimitExceeded,
    /// Bridge, I/O, timeout or other server-side failure.
    InternalError,
}

impl ErrorKind {
    /// `true` for kinds caused by the uploaded input rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::InternalError)
    }
}

/// Error type returned by decoders and the ingestion service.
///
/// This is a single error enum shared across every format decoder.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (temporary file staging, bridge pipes, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Excel ingestion error.
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV/TSV ingestion error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet ingestion error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON / JSON-lines ingestion error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input is structurally invalid for its format (ragged rows, no header, ...).
    #[error("malformed input: {message}")]
    Malformed { message: String },

    /// The filename's extension does not map to a registered decoder.
    #[error("unsupported file extension '{extension}'; supported: {}", .supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },

    /// The statistical bridge ran but rejected the payload.
    #[error("statistical bridge failed: {message}")]
    Bridge { message: String },

    /// The statistical bridge exited successfully but its output could not be read.
    #[error("statistical bridge returned unreadable output: {message}")]
    BridgeOutput { message: String },

    /// The statistical bridge executable could not be started.
    #[error("statistical bridge '{program}' could not be started: {source}")]
    BridgeUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The upload exceeds the configured size bound.
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    /// Decoding did not finish within the configured timeout.
    #[error("decode timed out after {0:?}")]
    Timeout(Duration),

    /// A blocking decode task panicked or was cancelled.
    #[error("decode task failed: {message}")]
    Task { message: String },
}

impl IngestionError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Classify the error for the client.
    ///
    /// Format-library errors are client errors unless an I/O failure sits in their source chain.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestionError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            IngestionError::TooLarge { .. } => ErrorKind::LimitExceeded,
            IngestionError::Malformed { .. }
            | IngestionError::Bridge { .. }
            | IngestionError::Json(_) => ErrorKind::DecodeError,
            IngestionError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => ErrorKind::InternalError,
                _ => ErrorKind::DecodeError,
            },
            IngestionError::Parquet(err) => {
                if error_chain_contains_io(err) {
                    ErrorKind::InternalError
                } else {
                    ErrorKind::DecodeError
                }
            }
            IngestionError::Excel(err) => match err {
                calamine::Error::Io(_) => ErrorKind::InternalError,
                _ => ErrorKind::DecodeError,
            },
            IngestionError::Io(_)
            | IngestionError::BridgeUnavailable { .. }
            | IngestionError::BridgeOutput { .. }
            | IngestionError::Timeout(_)
            | IngestionError::Task { .. } => ErrorKind::InternalError,
        }
    }

    /// Severity used for observer callbacks and alerting thresholds.
    pub fn severity(&self) -> IngestionSeverity {
        match self.kind() {
            ErrorKind::InternalError => IngestionSeverity::Critical,
            ErrorKind::LimitExceeded => IngestionSeverity::Warning,
            ErrorKind::UnsupportedFormat | ErrorKind::DecodeError => IngestionSeverity::Error,
        }
    }

    /// Name of the error variant, reported alongside internal failures.
    pub fn variant_name(&self) -> &'static str {
        match self {
            IngestionError::Io(_) => "Io",
            IngestionError::Excel(_) => "Excel",
            IngestionError::Csv(_) => "Csv",
            IngestionError::Parquet(_) => "Parquet",
            IngestionError::Json(_) => "Json",
            IngestionError::Malformed { .. } => "Malformed",
            IngestionError::UnsupportedFormat { .. } => "UnsupportedFormat",
            IngestionError::Bridge { .. } => "Bridge",
            IngestionError::BridgeUnavailable { .. } => "BridgeUnavailable",
            IngestionError::BridgeOutput { .. } => "BridgeOutput",
            IngestionError::TooLarge { .. } => "TooLarge",
            IngestionError::Timeout(_) => "Timeout",
            IngestionError::Task { .. } => "Task",
        }
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}
