//! Decoder capability trait and the registry that dispatches formats to decoders.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::OwnedSemaphorePermit;

use crate::error::{IngestionError, IngestionResult};
use crate::types::DecodedTable;

use super::csv::DelimitedDecoder;
use super::excel::ExcelDecoder;
use super::format::{FormatToken, infer_format};
use super::json::JsonDecoder;
use super::parquet::ParquetDecoder;
use super::sas::{SasFormat, StatisticalBridge, StatisticalDecoder};

/// A format-specific decoding capability.
///
/// Implementations must be pure given fixed bytes: decoding the same payload twice yields the
/// same table.
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Decode a complete in-memory payload into a [`DecodedTable`].
    async fn decode(&self, bytes: Bytes) -> IngestionResult<DecodedTable>;
}

tokio::task_local! {
    static DECODE_PERMIT: Arc<OwnedSemaphorePermit>;
}

/// Run `fut` while holding `permit`.
///
/// Blocking work started through [`run_blocking`] inside `fut` keeps the permit alive until it
/// finishes, even when `fut` itself is dropped first (timeout, client disconnect).
pub(crate) async fn with_decode_permit<F: Future>(permit: OwnedSemaphorePermit, fut: F) -> F::Output {
    DECODE_PERMIT.scope(Arc::new(permit), fut).await
}

/// Run CPU-bound decode work on the blocking pool, off the request path.
///
/// Custom [`Decoder`]s should offload through this function so the service's concurrency bound
/// covers their work for as long as it actually runs.
pub async fn run_blocking<T, F>(f: F) -> IngestionResult<T>
where
    F: FnOnce() -> IngestionResult<T> + Send + 'static,
    T: Send + 'static,
{
    let permit = DECODE_PERMIT.try_with(Arc::clone).ok();
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        f()
    })
    .await
    .map_err(|e| IngestionError::Task {
        message: e.to_string(),
    })?
}

/// Maps each [`FormatToken`] to exactly one [`Decoder`].
///
/// Lookups never fall back: a token without an entry (or a filename without a recognized
/// extension) is reported as unsupported.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: BTreeMap<FormatToken, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with one decoder for every [`FormatToken`].
    ///
    /// `bridge` serves both SAS formats.
    pub fn with_defaults(bridge: Arc<dyn StatisticalBridge>) -> Self {
        Self::new()
            .register(FormatToken::Csv, Arc::new(DelimitedDecoder::csv()))
            .register(FormatToken::Tsv, Arc::new(DelimitedDecoder::tsv()))
            .register(FormatToken::Xlsx, Arc::new(ExcelDecoder))
            .register(FormatToken::Xls, Arc::new(ExcelDecoder))
            .register(FormatToken::Json, Arc::new(JsonDecoder::document()))
            .register(FormatToken::Jsonl, Arc::new(JsonDecoder::lines()))
            .register(FormatToken::Parquet, Arc::new(ParquetDecoder))
            .register(
                FormatToken::Xpt,
                Arc::new(StatisticalDecoder::new(SasFormat::Xport, Arc::clone(&bridge))),
            )
            .register(
                FormatToken::Sas7bdat,
                Arc::new(StatisticalDecoder::new(SasFormat::Sas7bdat, bridge)),
            )
    }

    /// Add (or replace) the decoder for `token`.
    pub fn register(mut self, token: FormatToken, decoder: Arc<dyn Decoder>) -> Self {
        self.decoders.insert(token, decoder);
        self
    }

    /// The decoder registered for `token`, if any.
    pub fn resolve(&self, token: FormatToken) -> Option<Arc<dyn Decoder>> {
        self.decoders.get(&token).cloned()
    }

    /// Derive the format of `filename` and resolve its decoder.
    pub fn resolve_filename(&self, filename: &str) -> IngestionResult<(FormatToken, Arc<dyn Decoder>)> {
        let supported = self.supported();
        let token = infer_format(filename, &supported)?;
        let decoder = self.resolve(token).ok_or_else(|| IngestionError::UnsupportedFormat {
            extension: format!(".{token}"),
            supported: supported.iter().map(|t| format!(".{t}")).collect(),
        })?;
        Ok((token, decoder))
    }

    /// Registered tokens, in declaration order.
    pub fn supported(&self) -> Vec<FormatToken> {
        self.decoders.keys().copied().collect()
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("formats", &self.supported())
            .finish()
    }
}
