//! The ingestion service: filename to format, decode, normalize, report.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{ErrorKind, IngestionError, IngestionResult};
use crate::types::{DecodedTable, Schema, UploadPayload};

use super::format::FormatToken;
use super::normalize::{RecordSet, normalize};
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, TracingObserver};
use super::registry::{DecoderRegistry, run_blocking, with_decode_permit};

/// Default upload size bound: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Default bound on one decode, including the wait for a decode permit.
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(120);

/// Resource bounds applied to every ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionLimits {
    /// Largest accepted payload, in bytes.
    pub max_upload_bytes: usize,
    /// Upper bound on permit wait + decode + normalize.
    pub decode_timeout: Duration,
    /// Number of decodes allowed to run at once.
    pub max_concurrent_decodes: usize,
}

impl Default for IngestionLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            decode_timeout: DEFAULT_DECODE_TIMEOUT,
            max_concurrent_decodes: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// A successfully ingested upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub filename: String,
    pub format: FormatToken,
    /// Column names and inferred types, in order.
    pub columns: Schema,
    pub records: RecordSet,
}

/// Result of one ingestion, as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestionOutcome {
    Success {
        filename: String,
        columns: Schema,
        records: RecordSet,
    },
    Failure {
        filename: String,
        kind: ErrorKind,
        message: String,
    },
}

impl IngestionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn filename(&self) -> &str {
        match self {
            Self::Success { filename, .. } | Self::Failure { filename, .. } => filename,
        }
    }
}

/// Orchestrates one upload from bytes to records.
///
/// Cheap to clone; clones share the registry, the decode permits and the observer.
#[derive(Clone)]
pub struct IngestionService {
    registry: DecoderRegistry,
    limits: IngestionLimits,
    permits: Arc<Semaphore>,
    observer: Arc<dyn IngestionObserver>,
    alert_at_or_above: IngestionSeverity,
}

impl IngestionService {
    /// A service reporting to [`TracingObserver`], alerting on critical failures.
    pub fn new(registry: DecoderRegistry, limits: IngestionLimits) -> Self {
        let permits = Arc::new(Semaphore::new(limits.max_concurrent_decodes.max(1)));
        Self {
            registry,
            limits,
            permits,
            observer: Arc::new(TracingObserver),
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }

    /// Replace the observer receiving success/failure/alert callbacks.
    pub fn with_observer(mut self, observer: Arc<dyn IngestionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Failures at or above `severity` are also reported through
    /// [`IngestionObserver::on_alert`].
    pub fn with_alert_threshold(mut self, severity: IngestionSeverity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn limits(&self) -> IngestionLimits {
        self.limits
    }

    /// Ingest `payload`, folding any error into [`IngestionOutcome::Failure`].
    pub async fn ingest(&self, payload: UploadPayload) -> IngestionOutcome {
        let filename = payload.filename.clone();
        match self.try_ingest(payload).await {
            Ok(ingested) => IngestionOutcome::Success {
                filename: ingested.filename,
                columns: ingested.columns,
                records: ingested.records,
            },
            Err(e) => IngestionOutcome::Failure {
                filename,
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }

    /// Ingest `payload`, returning the error itself on failure.
    ///
    /// The observer sees every attempt, successful or not.
    pub async fn try_ingest(&self, payload: UploadPayload) -> IngestionResult<Ingested> {
        let mut ctx = IngestionContext {
            filename: payload.filename.clone(),
            format: None,
        };
        let result = self.run(payload, &mut ctx).await;
        match &result {
            Ok(ingested) => self.observer.on_success(
                &ctx,
                IngestionStats {
                    rows: ingested.records.len(),
                    columns: ingested.columns.len(),
                },
            ),
            Err(e) => {
                let severity = e.severity();
                self.observer.on_failure(&ctx, severity, e);
                if severity >= self.alert_at_or_above {
                    self.observer.on_alert(&ctx, severity, e);
                }
            }
        }
        result
    }

    async fn run(&self, payload: UploadPayload, ctx: &mut IngestionContext) -> IngestionResult<Ingested> {
        if payload.len() > self.limits.max_upload_bytes {
            return Err(IngestionError::TooLarge {
                size: payload.len(),
                limit: self.limits.max_upload_bytes,
            });
        }

        let (format, decoder) = self.registry.resolve_filename(&payload.filename)?;
        ctx.format = Some(format);

        let timeout = self.limits.decode_timeout;
        let permits = Arc::clone(&self.permits);
        let work = async move {
            let permit = permits.acquire_owned().await.map_err(|e| IngestionError::Task {
                message: e.to_string(),
            })?;
            debug!(filename = %payload.filename, %format, bytes = payload.len(), "decoding upload");
            with_decode_permit(permit, async move {
                let table = decoder.decode(payload.bytes).await?;
                run_blocking(move || {
                    let records = normalize(&table);
                    let DecodedTable { schema, .. } = table;
                    Ok((schema, records))
                })
                .await
            })
            .await
        };

        let (columns, records) = tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| IngestionError::Timeout(timeout))??;

        Ok(Ingested {
            filename: ctx.filename.clone(),
            format,
            columns,
            records,
        })
    }
}

impl std::fmt::Debug for IngestionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionService")
            .field("registry", &self.registry)
            .field("limits", &self.limits)
            .field("available_permits", &self.permits.available_permits())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}
