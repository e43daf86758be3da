//! SAS dataset decoding (`.xpt`, `.sas7bdat`) through an external statistics runtime.
//!
//! The binary layouts are not decoded in-process. A [`StatisticalBridge`] reads a file from disk
//! and returns a table; [`StatisticalDecoder`] stages the upload into a scoped temporary file
//! for the duration of one call.
//!
//! The default bridge, [`CommandBridge::rscript`], runs R's `haven` package and prints the
//! dataset as column-oriented JSON (`{"COL": [v1, v2, ...], ...}`) on stdout.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Map;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DecodedTable, Value};

use super::infer::table_from_rows;
use super::json::convert_json_value;
use super::registry::{Decoder, run_blocking};

/// R program used by [`CommandBridge::rscript`].
///
/// Arguments after the expression: `<format> <path>`.
pub const HAVEN_SCRIPT: &str = r#"args <- commandArgs(trailingOnly = TRUE)
df <- if (args[[1]] == "xpt") haven::read_xpt(args[[2]]) else haven::read_sas(args[[2]])
df <- haven::zap_labels(haven::zap_formats(df))
cat(jsonlite::toJSON(df, dataframe = "columns", na = "null", digits = NA, Date = "ISO8601", POSIXt = "ISO8601"))"#;

/// Longest bridge stderr excerpt carried into an error message.
const MAX_STDERR_CHARS: usize = 2_000;

/// The two SAS sub-formats, distinguished by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SasFormat {
    /// SAS transport (XPORT) file.
    Xport,
    /// Native SAS dataset.
    Sas7bdat,
}

impl SasFormat {
    /// File extension, also passed to the bridge as the format argument.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xport => "xpt",
            Self::Sas7bdat => "sas7bdat",
        }
    }
}

impl fmt::Display for SasFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Capability that decodes a SAS file that exists on disk.
#[async_trait]
pub trait StatisticalBridge: Send + Sync {
    /// Decode the SAS file at `path`.
    async fn read(&self, format: SasFormat, path: &Path) -> IngestionResult<DecodedTable>;
}

/// A bridge that runs an external program per decode.
///
/// The program is invoked as `<program> <args...> <format> <path>` and must print the dataset
/// as a JSON object mapping each column name to an array of values, in column order. A non-zero
/// exit status means the payload was rejected; its stderr becomes the error message.
#[derive(Debug, Clone)]
pub struct CommandBridge {
    program: String,
    args: Vec<String>,
}

impl CommandBridge {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `Rscript` (found on `PATH`) running [`HAVEN_SCRIPT`].
    pub fn rscript() -> Self {
        Self::rscript_at("Rscript")
    }

    /// Like [`Self::rscript`], with an explicit `Rscript` executable.
    pub fn rscript_at(program: impl Into<String>) -> Self {
        Self::new(
            program,
            vec!["--vanilla".to_string(), "-e".to_string(), HAVEN_SCRIPT.to_string()],
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl StatisticalBridge for CommandBridge {
    async fn read(&self, format: SasFormat, path: &Path) -> IngestionResult<DecodedTable> {
        debug!(program = %self.program, %format, path = %path.display(), "invoking statistical bridge");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(format.extension())
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| IngestionError::BridgeUnavailable {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(IngestionError::Bridge {
                message: format!("{} ({})", stderr_excerpt(&output.stderr), output.status),
            });
        }

        let stdout = output.stdout;
        run_blocking(move || decode_columnar_json(&stdout)).await
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return "no diagnostic output".to_string();
    }
    let char_count = text.chars().count();
    if char_count <= MAX_STDERR_CHARS {
        text.to_string()
    } else {
        // Keep the tail: runtimes print the actual error last.
        let tail: String = text.chars().skip(char_count - MAX_STDERR_CHARS).collect();
        format!("...{tail}")
    }
}

/// Decode column-oriented JSON (`{"A": [..], "B": [..]}`) printed by a bridge.
pub fn decode_columnar_json(input: &[u8]) -> IngestionResult<DecodedTable> {
    let columns: Map<String, serde_json::Value> =
        serde_json::from_slice(input).map_err(|e| IngestionError::BridgeOutput {
            message: e.to_string(),
        })?;

    let mut names = Vec::with_capacity(columns.len());
    let mut values: Vec<Vec<serde_json::Value>> = Vec::with_capacity(columns.len());
    for (name, column) in columns {
        match column {
            serde_json::Value::Array(items) => {
                names.push(name);
                values.push(items);
            }
            _ => {
                return Err(IngestionError::BridgeOutput {
                    message: format!("column '{name}' is not an array"),
                });
            }
        }
    }

    let row_count = values.first().map(Vec::len).unwrap_or(0);
    if let Some((idx, col)) = values.iter().enumerate().find(|(_, c)| c.len() != row_count) {
        return Err(IngestionError::BridgeOutput {
            message: format!(
                "column '{}' has {} values, expected {row_count}",
                names[idx],
                col.len()
            ),
        });
    }

    let rows: Vec<Vec<Value>> = (0..row_count)
        .map(|r| values.iter().map(|col| convert_json_value(&col[r])).collect())
        .collect();
    Ok(table_from_rows(names, rows))
}

/// [`Decoder`] for one SAS sub-format, backed by a [`StatisticalBridge`].
///
/// The upload is written to a temporary file that lives exactly as long as the decode call. It
/// is removed when the call returns (success or failure), when it unwinds, and when the decode
/// future is dropped before completion.
pub struct StatisticalDecoder {
    format: SasFormat,
    bridge: Arc<dyn StatisticalBridge>,
    staging_dir: Option<PathBuf>,
}

impl StatisticalDecoder {
    pub fn new(format: SasFormat, bridge: Arc<dyn StatisticalBridge>) -> Self {
        Self {
            format,
            bridge,
            staging_dir: None,
        }
    }

    /// Stage uploads under `dir` instead of the system temporary directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn format(&self) -> SasFormat {
        self.format
    }
}

impl fmt::Debug for StatisticalDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatisticalDecoder")
            .field("format", &self.format)
            .field("staging_dir", &self.staging_dir)
            .finish()
    }
}

fn stage_upload(dir: Option<&Path>, format: SasFormat, bytes: &[u8]) -> IngestionResult<NamedTempFile> {
    let suffix = format!(".{}", format.extension());
    let mut builder = tempfile::Builder::new();
    builder.prefix("upload-").suffix(&suffix);
    let mut staged = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    staged.write_all(bytes)?;
    staged.as_file().sync_data()?;
    Ok(staged)
}

#[async_trait]
impl Decoder for StatisticalDecoder {
    async fn decode(&self, bytes: Bytes) -> IngestionResult<DecodedTable> {
        let dir = self.staging_dir.clone();
        let format = self.format;
        let staged = run_blocking(move || stage_upload(dir.as_deref(), format, &bytes)).await?;
        let path = staged.path().to_path_buf();
        debug!(path = %path.display(), %format, "staged upload for statistical bridge");

        let result = self.bridge.read(format, &path).await;

        if let Err(e) = staged.close() {
            warn!(path = %path.display(), error = %e, "failed to remove staged upload");
        }
        result
    }
}
