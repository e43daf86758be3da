//! Delimited-text (CSV/TSV) decoding.

use std::io::Read;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataType, DecodedTable, Field, Schema, Value};

use super::infer::{dedupe_column_names, infer_column_type};
use super::registry::{Decoder, run_blocking};

/// Cell texts treated as missing values (in addition to empty cells).
const NA_MARKERS: &[&str] = &["NA", "N/A", "n/a", "NULL", "null", "NaN", "nan", "#N/A", "<NA>"];

/// Decode delimited text into a [`DecodedTable`].
///
/// Rules:
///
/// - The first row is the header.
/// - Rows shorter than the header are padded with nulls; longer rows are rejected.
/// - Column types are inferred from the cells; a column whose cells disagree falls back to
///   strings holding the original cell text.
pub fn decode_delimited(bytes: &[u8], delimiter: u8) -> IngestionResult<DecodedTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);
    decode_from_reader(&mut rdr)
}

/// Decode delimited text from an existing CSV reader.
///
/// The reader must be configured with `has_headers(true)`.
pub fn decode_from_reader<R: Read>(rdr: &mut csv::Reader<R>) -> IngestionResult<DecodedTable> {
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(IngestionError::malformed("input is empty (no header row)"));
    }
    let names: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            if idx == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();
    let width = names.len();

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;
        let record = result?;
        if record.len() > width {
            return Err(IngestionError::malformed(format!(
                "row {user_row} has {} fields, expected at most {width}",
                record.len()
            )));
        }
        let mut row: Vec<String> = record.iter().map(str::to_owned).collect();
        row.resize(width, String::new());
        raw_rows.push(row);
    }

    let mut rows: Vec<Vec<Value>> = (0..raw_rows.len()).map(|_| Vec::with_capacity(width)).collect();
    let mut fields = Vec::with_capacity(width);
    for (col, name) in dedupe_column_names(names).into_iter().enumerate() {
        let parsed: Vec<Value> = raw_rows.iter().map(|r| parse_text_cell(&r[col])).collect();
        let data_type = match infer_column_type(&parsed) {
            DataType::Mixed => DataType::Utf8,
            other => other,
        };
        for ((out, raw), value) in rows.iter_mut().zip(&raw_rows).zip(parsed) {
            out.push(coerce_text_cell(data_type, &raw[col], value));
        }
        fields.push(Field::new(name, data_type));
    }

    Ok(DecodedTable::new(Schema::new(fields), rows))
}

/// Parse one cell into its natural scalar type.
fn parse_text_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NA_MARKERS.contains(&trimmed) {
        return Value::Null;
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Value::Int64(v);
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        if v.is_finite() {
            return Value::Float64(v);
        }
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::Utf8(trimmed.to_owned())
}

fn coerce_text_cell(data_type: DataType, raw: &str, parsed: Value) -> Value {
    match (data_type, parsed) {
        (_, Value::Null) => Value::Null,
        (DataType::Float64, Value::Int64(v)) => Value::Float64(v as f64),
        (DataType::Utf8, Value::Utf8(s)) => Value::Utf8(s),
        (DataType::Utf8, _) => Value::Utf8(raw.trim().to_owned()),
        (_, v) => v,
    }
}

/// Delimited-text [`Decoder`]: `,` for CSV, tab for TSV.
#[derive(Debug, Clone, Copy)]
pub struct DelimitedDecoder {
    delimiter: u8,
}

impl DelimitedDecoder {
    pub fn csv() -> Self {
        Self { delimiter: b',' }
    }

    pub fn tsv() -> Self {
        Self { delimiter: b'\t' }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

#[async_trait]
impl Decoder for DelimitedDecoder {
    async fn decode(&self, bytes: Bytes) -> IngestionResult<DecodedTable> {
        let delimiter = self.delimiter;
        run_blocking(move || decode_delimited(&bytes, delimiter)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_cell_recognizes_scalars() {
        assert_eq!(parse_text_cell("42"), Value::Int64(42));
        assert_eq!(parse_text_cell(" -3.5 "), Value::Float64(-3.5));
        assert_eq!(parse_text_cell("TRUE"), Value::Bool(true));
        assert_eq!(parse_text_cell("false"), Value::Bool(false));
        assert_eq!(parse_text_cell("NA"), Value::Null);
        assert_eq!(parse_text_cell(""), Value::Null);
        assert_eq!(parse_text_cell("inf"), Value::Utf8("inf".to_string()));
        assert_eq!(parse_text_cell("SCREENING"), Value::Utf8("SCREENING".to_string()));
    }

    #[test]
    fn mixed_column_falls_back_to_raw_text() {
        let t = decode_delimited(b"visit\n1\nWEEK 2\n007\n", b',').unwrap();
        assert_eq!(t.schema.fields[0].data_type, DataType::Utf8);
        assert_eq!(
            t.rows,
            vec![
                vec![Value::Utf8("1".to_string())],
                vec![Value::Utf8("WEEK 2".to_string())],
                vec![Value::Utf8("007".to_string())],
            ]
        );
    }

    #[test]
    fn short_rows_are_padded_with_nulls() {
        let t = decode_delimited(b"a,b,c\n1\n", b',').unwrap();
        assert_eq!(t.rows[0], vec![Value::Int64(1), Value::Null, Value::Null]);
        assert_eq!(t.schema.fields[1].data_type, DataType::Null);
    }

    #[test]
    fn long_rows_are_rejected() {
        let err = decode_delimited(b"a,b\n1,2,3\n", b',').unwrap_err();
        assert!(err.to_string().contains("row 2 has 3 fields, expected at most 2"));
    }

    #[test]
    fn empty_input_is_malformed() {
        let err = decode_delimited(b"", b',').unwrap_err();
        assert!(matches!(err, IngestionError::Malformed { .. }));
    }

    #[test]
    fn bom_is_stripped_from_first_header() {
        let t = decode_delimited("\u{feff}STUDYID,USUBJID\nS1,001\n".as_bytes(), b',').unwrap();
        assert_eq!(t.schema.fields[0].name, "STUDYID");
    }
}
