//! Conversion of a [`DecodedTable`] into JSON-serializable records.

use rayon::prelude::*;
use serde_json::{Map, Number};

use crate::types::{DecodedTable, Value};

/// One row: column name to JSON value, in column order.
pub type Record = Map<String, serde_json::Value>;

/// Ordered rows of a table.
pub type RecordSet = Vec<Record>;

/// Convert every row of `table` into a [`Record`].
///
/// Each record carries every column of the table, in schema order. Rows are converted in
/// parallel; output order matches row order.
pub fn normalize(table: &DecodedTable) -> RecordSet {
    let names: Vec<&str> = table.schema.field_names().collect();
    table
        .rows
        .par_iter()
        .map(|row| {
            names
                .iter()
                .zip(row.iter())
                .map(|(name, value)| ((*name).to_string(), value_to_json(value)))
                .collect::<Record>()
        })
        .collect()
}

/// JSON form of a single [`Value`]. NaN and infinities have no JSON form and become `null`.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int64(i) => serde_json::Value::Number((*i).into()),
        Value::Float64(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Utf8(s) => serde_json::Value::String(s.clone()),
    }
}
