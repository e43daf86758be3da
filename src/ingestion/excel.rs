//! Spreadsheet decoding (`.xlsx`, `.xls`).

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use calamine::{Data, Reader, open_workbook_auto_from_rs};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DecodedTable, Value};

use super::infer::table_from_rows;
use super::registry::{Decoder, run_blocking};

/// Largest float that converts to `i64` without losing precision.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Decode the first sheet of an in-memory workbook into a [`DecodedTable`].
///
/// Behavior:
/// - The workbook kind (xlsx/xls/...) is detected from the bytes
/// - Only the first sheet is read
/// - The first non-empty row is the header row
/// - Fully empty rows below the header are skipped
pub fn decode_workbook(bytes: Bytes) -> IngestionResult<DecodedTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestionError::malformed("workbook has no sheets"))??;
    decode_sheet_range(&range)
}

fn decode_sheet_range(range: &calamine::Range<Data>) -> IngestionResult<DecodedTable> {
    let mut rows_iter = range
        .rows()
        .skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));

    let header = rows_iter
        .next()
        .ok_or_else(|| IngestionError::malformed("sheet has no non-empty rows (no header row found)"))?;
    let names: Vec<String> = header.iter().map(cell_to_header_string).collect();
    let width = names.len();

    let rows: Vec<Vec<Value>> = rows_iter
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| {
            (0..width)
                .map(|idx| convert_cell(row.get(idx).unwrap_or(&Data::Empty)))
                .collect()
        })
        .collect();

    Ok(table_from_rows(names, rows))
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
    }
}

fn convert_cell(c: &Data) -> Value {
    match c {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::Utf8(s.clone()),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT {
                Value::Int64(*f as i64)
            } else {
                Value::Float64(*f)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => Value::Utf8(ts.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => Value::Float64(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Utf8(s.clone()),
    }
}

/// Spreadsheet [`Decoder`] for `.xlsx` and `.xls` uploads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcelDecoder;

#[async_trait]
impl Decoder for ExcelDecoder {
    async fn decode(&self, bytes: Bytes) -> IngestionResult<DecodedTable> {
        run_blocking(move || decode_workbook(bytes)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_floats_become_integers() {
        assert_eq!(convert_cell(&Data::Float(3.0)), Value::Int64(3));
        assert_eq!(convert_cell(&Data::Float(3.25)), Value::Float64(3.25));
        assert_eq!(convert_cell(&Data::Float(1e300)), Value::Float64(1e300));
    }

    #[test]
    fn blank_and_error_cells_are_null() {
        assert_eq!(convert_cell(&Data::Empty), Value::Null);
        assert_eq!(convert_cell(&Data::String("  ".to_string())), Value::Null);
        assert_eq!(
            convert_cell(&Data::Error(calamine::CellErrorType::NA)),
            Value::Null
        );
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let err = decode_workbook(Bytes::from_static(b"definitely not a workbook")).unwrap_err();
        assert!(matches!(err, IngestionError::Excel(_)));
    }
}
