//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`IngestionService`], which:
//!
//! - derives the format from the upload's filename extension ([`FormatToken`])
//! - dispatches to the [`Decoder`] registered for that format in a [`DecoderRegistry`]
//! - normalizes the decoded table into JSON records ([`normalize()`])
//! - reports success/failure/alerts to an [`IngestionObserver`]
//!
//! Format-specific functions are also available under:
//! - [`csv`] (`.csv`, `.tsv`)
//! - [`excel`] (`.xlsx`, `.xls`)
//! - [`json`] (`.json`, `.jsonl`)
//! - [`parquet`] (`.parquet`)
//! - [`sas`] (`.xpt`, `.sas7bdat`, through a [`StatisticalBridge`])

pub mod csv;
pub mod excel;
pub mod format;
pub mod infer;
pub mod json;
pub mod normalize;
pub mod observability;
pub mod parquet;
pub mod registry;
pub mod sas;
pub mod service;

pub use format::{FormatToken, extension_of, infer_format};
pub use normalize::{Record, RecordSet, normalize};
pub use observability::{
    CompositeObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, TracingObserver,
};
pub use registry::{Decoder, DecoderRegistry, run_blocking};
pub use sas::{CommandBridge, SasFormat, StatisticalBridge, StatisticalDecoder};
pub use service::{Ingested, IngestionLimits, IngestionOutcome, IngestionService};
