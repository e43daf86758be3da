//! Parquet decoding.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate};
use parquet::basic::{ConvertedType, Type as PhysicalType};
use parquet::file::reader::{ChunkReader, FileReader};
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::Field as ParquetField;
use parquet::schema::types::Type as SchemaType;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataType, DecodedTable, Field, Schema, Value};

use super::infer::dedupe_column_names;
use super::registry::{Decoder, run_blocking};

/// Decode an in-memory Parquet file into a [`DecodedTable`].
///
/// Notes:
/// - Columns and their types come from the file's root schema fields
/// - Rows are read through the Parquet record API (`RowIter`)
/// - Dates and timestamps become ISO-8601 strings; nested values become their display text
pub fn decode_parquet(bytes: Bytes) -> IngestionResult<DecodedTable> {
    let reader = SerializedFileReader::new(bytes)?;
    let root_fields = root_schema_fields(&reader);
    let width = root_fields.len();

    let names = dedupe_column_names(root_fields.iter().map(|(name, _)| name.clone()).collect());
    let schema = Schema::new(
        names
            .into_iter()
            .zip(root_fields.iter())
            .map(|(name, (_, data_type))| Field::new(name, *data_type))
            .collect(),
    );

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx0, row_res) in reader.get_row_iter(None)?.enumerate() {
        let row_num = idx0 + 1;
        let row = row_res?;

        let mut out_row: Vec<Value> = Vec::with_capacity(width);
        for (_, field) in row.get_column_iter() {
            out_row.push(convert_parquet_field(field));
        }
        if out_row.len() != width {
            return Err(IngestionError::malformed(format!(
                "row {row_num} has {} columns, schema declares {width}",
                out_row.len()
            )));
        }
        rows.push(out_row);
    }

    Ok(DecodedTable::new(schema, rows))
}

fn root_schema_fields<R: ChunkReader + 'static>(reader: &SerializedFileReader<R>) -> Vec<(String, DataType)> {
    reader
        .metadata()
        .file_metadata()
        .schema()
        .get_fields()
        .iter()
        .map(|t| (t.name().to_string(), data_type_for(t)))
        .collect()
}

fn data_type_for(t: &SchemaType) -> DataType {
    if !t.is_primitive() {
        return DataType::Utf8;
    }
    let converted = t.get_basic_info().converted_type();
    match t.get_physical_type() {
        PhysicalType::BOOLEAN => DataType::Bool,
        PhysicalType::INT32 | PhysicalType::INT64 => match converted {
            ConvertedType::DATE
            | ConvertedType::TIME_MILLIS
            | ConvertedType::TIME_MICROS
            | ConvertedType::TIMESTAMP_MILLIS
            | ConvertedType::TIMESTAMP_MICROS
            | ConvertedType::DECIMAL => DataType::Utf8,
            _ => DataType::Int64,
        },
        PhysicalType::FLOAT | PhysicalType::DOUBLE => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn convert_parquet_field(f: &ParquetField) -> Value {
    match f {
        ParquetField::Null => Value::Null,
        ParquetField::Bool(b) => Value::Bool(*b),
        ParquetField::Byte(v) => Value::Int64(i64::from(*v)),
        ParquetField::Short(v) => Value::Int64(i64::from(*v)),
        ParquetField::Int(v) => Value::Int64(i64::from(*v)),
        ParquetField::Long(v) => Value::Int64(*v),
        ParquetField::UByte(v) => Value::Int64(i64::from(*v)),
        ParquetField::UShort(v) => Value::Int64(i64::from(*v)),
        ParquetField::UInt(v) => Value::Int64(i64::from(*v)),
        ParquetField::ULong(v) => match i64::try_from(*v) {
            Ok(v) => Value::Int64(v),
            Err(_) => Value::Float64(*v as f64),
        },
        ParquetField::Float(v) => Value::Float64(f64::from(*v)),
        ParquetField::Double(v) => Value::Float64(*v),
        ParquetField::Str(s) => Value::Utf8(s.clone()),
        ParquetField::Date(days) => date_from_epoch_days(*days)
            .map(|d| Value::Utf8(d.format("%Y-%m-%d").to_string()))
            .unwrap_or_else(|| Value::Utf8(f.to_string())),
        ParquetField::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map(|ts| Value::Utf8(ts.naive_utc().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()))
            .unwrap_or_else(|| Value::Utf8(f.to_string())),
        ParquetField::TimestampMicros(us) => DateTime::from_timestamp_micros(*us)
            .map(|ts| Value::Utf8(ts.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()))
            .unwrap_or_else(|| Value::Utf8(f.to_string())),
        other => Value::Utf8(other.to_string()),
    }
}

fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(i64::from(days)))
}

/// Parquet [`Decoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetDecoder;

#[async_trait]
impl Decoder for ParquetDecoder {
    async fn decode(&self, bytes: Bytes) -> IngestionResult<DecodedTable> {
        run_blocking(move || decode_parquet(bytes)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_render_as_iso_strings() {
        assert_eq!(
            convert_parquet_field(&ParquetField::Date(19_723)),
            Value::Utf8("2024-01-01".to_string())
        );
        assert_eq!(
            convert_parquet_field(&ParquetField::TimestampMillis(1_704_067_200_000)),
            Value::Utf8("2024-01-01T00:00:00.000".to_string())
        );
    }

    #[test]
    fn unsigned_overflow_widens_to_float() {
        assert_eq!(
            convert_parquet_field(&ParquetField::ULong(u64::MAX)),
            Value::Float64(u64::MAX as f64)
        );
    }

    #[test]
    fn truncated_file_is_a_decode_error() {
        let err = decode_parquet(Bytes::from_static(b"PAR1 not really")).unwrap_err();
        assert!(matches!(err, IngestionError::Parquet(_)));
        assert!(err.kind().is_client_error());
    }
}
