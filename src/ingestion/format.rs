//! File-format tokens derived from upload filenames.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::{IngestionError, IngestionResult};

/// Supported ingestion formats, one per accepted file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatToken {
    /// Comma-separated values.
    Csv,
    /// Tab-separated values.
    Tsv,
    /// Office Open XML workbook.
    Xlsx,
    /// Legacy binary Excel workbook.
    Xls,
    /// JSON array-of-records or a single object.
    Json,
    /// Newline-delimited JSON records.
    Jsonl,
    /// Apache Parquet.
    Parquet,
    /// SAS transport (XPORT) file.
    Xpt,
    /// SAS dataset.
    Sas7bdat,
}

impl FormatToken {
    /// Every token, in declaration order.
    pub const ALL: [FormatToken; 9] = [
        Self::Csv,
        Self::Tsv,
        Self::Xlsx,
        Self::Xls,
        Self::Json,
        Self::Jsonl,
        Self::Parquet,
        Self::Xpt,
        Self::Sas7bdat,
    ];

    /// Parse a token from a file extension (case-insensitive, without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "json" => Some(Self::Json),
            "jsonl" => Some(Self::Jsonl),
            "parquet" => Some(Self::Parquet),
            "xpt" => Some(Self::Xpt),
            "sas7bdat" => Some(Self::Sas7bdat),
            _ => None,
        }
    }

    /// Canonical extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Json => "json",
            Self::Jsonl => "jsonl",
            Self::Parquet => "parquet",
            Self::Xpt => "xpt",
            Self::Sas7bdat => "sas7bdat",
        }
    }

    /// `true` for the two SAS formats that go through the statistical bridge.
    pub fn is_statistical(&self) -> bool {
        matches!(self, Self::Xpt | Self::Sas7bdat)
    }
}

impl fmt::Display for FormatToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Returns the lower-cased extension of `filename`, if it has one.
///
/// Only the final path component is considered, so client-supplied directory parts are ignored.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
}

/// Derive the [`FormatToken`] for `filename`.
///
/// Unknown or missing extensions are an [`IngestionError::UnsupportedFormat`] listing `supported`.
pub fn infer_format(filename: &str, supported: &[FormatToken]) -> IngestionResult<FormatToken> {
    let ext = extension_of(filename);
    ext.as_deref()
        .and_then(FormatToken::from_extension)
        .filter(|token| supported.contains(token))
        .ok_or_else(|| IngestionError::UnsupportedFormat {
            extension: match ext {
                Some(ext) => format!(".{ext}"),
                None => "(none)".to_string(),
            },
            supported: supported.iter().map(|t| format!(".{t}")).collect(),
        })
}
