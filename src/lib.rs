//! `clinical-data-ingest` decodes uploaded clinical dataset files into JSON row records.
//!
//! The primary entrypoint is [`ingestion::IngestionService`], which derives the format from the
//! upload's filename extension, dispatches to the matching decoder, and normalizes the decoded
//! table into records. The `http-server` feature (on by default) exposes it as an axum API.
//!
//! ## What you can ingest
//!
//! **File formats (selected by extension, case-insensitive):**
//!
//! - **Delimited text**: `.csv`, `.tsv`
//! - **Spreadsheets**: `.xlsx`, `.xls` (first sheet only)
//! - **JSON**: `.json` (array of records, or a single object) and `.jsonl` (one record per line)
//! - **Parquet**: `.parquet`
//! - **SAS**: `.xpt`, `.sas7bdat` (through an external statistics runtime, see
//!   [`ingestion::sas`])
//!
//! Any other extension is rejected as [`error::ErrorKind::UnsupportedFormat`]; there is no
//! fallback decoder.
//!
//! **Column types** are inferred from the data: [`types::DataType::Bool`],
//! [`types::DataType::Int64`], [`types::DataType::Float64`], [`types::DataType::Utf8`], plus
//! [`types::DataType::Null`] for all-null columns and [`types::DataType::Mixed`] for columns whose
//! values disagree. Across formats, empty cells, NA markers and explicit JSON `null` become
//! [`types::Value::Null`], and every record carries every column.
//!
//! ## Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use clinical_data_ingest::ingestion::{
//!     CommandBridge, DecoderRegistry, IngestionLimits, IngestionOutcome, IngestionService,
//! };
//! use clinical_data_ingest::types::UploadPayload;
//!
//! # async fn run() {
//! let registry = DecoderRegistry::with_defaults(Arc::new(CommandBridge::rscript()));
//! let service = IngestionService::new(registry, IngestionLimits::default());
//!
//! let outcome = service
//!     .ingest(UploadPayload::new("vitals.csv", "a,b\n1,2\n3,\n"))
//!     .await;
//! if let IngestionOutcome::Success { records, .. } = outcome {
//!     println!("rows={}", records.len());
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: format dispatch, per-format decoders, normalization, observability
//! - [`types`]: schema + decoded table types
//! - [`error`]: error types used across ingestion
//! - [`config`]: environment-driven server configuration
//! - [`sensor`]: mock sensor readings for the dashboard endpoints
//! - `http`: axum router and handlers (feature `http-server`)

pub mod config;
pub mod error;
#[cfg(feature = "http-server")]
pub mod http;
pub mod ingestion;
pub mod sensor;
pub mod types;

pub use error::{ErrorKind, IngestionError, IngestionResult};
