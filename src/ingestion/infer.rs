//! Column type inference and column-name cleanup shared by the decoders.

use std::collections::HashSet;

use crate::types::{DataType, DecodedTable, Field, Schema, Value};

/// Combine two observed types into the narrowest type that holds both.
///
/// Nulls never widen a column; integers widen to floats; anything else that disagrees is
/// [`DataType::Mixed`].
pub fn unify(a: DataType, b: DataType) -> DataType {
    match (a, b) {
        (DataType::Null, t) | (t, DataType::Null) => t,
        (x, y) if x == y => x,
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => DataType::Float64,
        _ => DataType::Mixed,
    }
}

/// Infer the type of a column from its observed values.
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = &'a Value>) -> DataType {
    values
        .into_iter()
        .fold(DataType::Null, |acc, v| unify(acc, v.data_type()))
}

/// Build a [`DecodedTable`] from column names and natively typed rows.
///
/// Each column's type is inferred from its values; integer values in a float column are widened
/// so the column is homogeneous. Mixed columns keep every value as decoded.
pub fn table_from_rows(names: Vec<String>, mut rows: Vec<Vec<Value>>) -> DecodedTable {
    let names = dedupe_column_names(names);
    let mut fields = Vec::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        let data_type = infer_column_type(rows.iter().map(|r| &r[idx]));
        if data_type == DataType::Float64 {
            for row in rows.iter_mut() {
                if let Value::Int64(v) = row[idx] {
                    row[idx] = Value::Float64(v as f64);
                }
            }
        }
        fields.push(Field::new(name, data_type));
    }
    DecodedTable::new(Schema::new(fields), rows)
}

/// Make column names unique and non-empty.
///
/// - empty (or whitespace-only) names become `Unnamed: <index>`
/// - repeated names get a `.1`, `.2`, ... suffix in order of appearance
pub fn dedupe_column_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {idx}")
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
