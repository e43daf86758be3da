//! JSON decoding.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]` (one row per element)
//! - A single JSON object: one row per leaf path, with `path` and `value` columns
//! - JSON lines: `{"a":1}\n{"a":2}\n` (one row per non-blank line)
//!
//! Nested objects inside records are flattened into dot-separated column names
//! (e.g. `subject.arm`). Arrays are kept as their JSON text.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Map;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DecodedTable, Value};

use super::infer::table_from_rows;
use super::registry::{Decoder, run_blocking};

/// Decode a JSON document (array of records or a single object).
pub fn decode_json_document(input: &[u8]) -> IngestionResult<DecodedTable> {
    if input.iter().all(u8::is_ascii_whitespace) {
        return Err(IngestionError::malformed("json input is empty"));
    }

    match serde_json::from_slice::<serde_json::Value>(input)? {
        serde_json::Value::Array(items) => {
            let mut records = Vec::with_capacity(items.len());
            for (idx0, item) in items.into_iter().enumerate() {
                match item {
                    serde_json::Value::Object(obj) => records.push(obj),
                    _ => {
                        return Err(IngestionError::malformed(format!(
                            "element {} is not a json object",
                            idx0 + 1
                        )));
                    }
                }
            }
            records_to_table(&records)
        }
        serde_json::Value::Object(obj) => Ok(object_to_path_table(&obj)),
        _ => Err(IngestionError::malformed(
            "json must be an object or an array of objects",
        )),
    }
}

/// Decode JSON lines: one object per non-blank line.
pub fn decode_json_lines(input: &[u8]) -> IngestionResult<DecodedTable> {
    let text = std::str::from_utf8(input)
        .map_err(|e| IngestionError::malformed(format!("json lines input is not utf-8: {e}")))?;

    let mut records = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
            IngestionError::malformed(format!("invalid json at line {}: {}", i + 1, e))
        })?;
        match v {
            serde_json::Value::Object(obj) => records.push(obj),
            _ => {
                return Err(IngestionError::malformed(format!(
                    "line {} is not a json object",
                    i + 1
                )));
            }
        }
    }
    records_to_table(&records)
}

/// One row per record; columns in order of first appearance across all records.
///
/// A record whose flattened paths collide (`{"a.b": 1, "a": {"b": 2}}`) is rejected.
fn records_to_table(records: &[Map<String, serde_json::Value>]) -> IngestionResult<DecodedTable> {
    let mut names: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(records.len());

    for (idx0, record) in records.iter().enumerate() {
        let mut leaves = Vec::new();
        flatten_object(None, record, &mut leaves);

        let mut seen = HashSet::with_capacity(leaves.len());
        if let Some((path, _)) = leaves.iter().find(|(path, _)| !seen.insert(path.as_str())) {
            return Err(IngestionError::malformed(format!(
                "record {}: field path '{path}' appears more than once",
                idx0 + 1
            )));
        }

        let mut row = vec![Value::Null; names.len()];
        for (path, value) in leaves {
            let idx = *positions.entry(path.clone()).or_insert_with(|| {
                names.push(path);
                names.len() - 1
            });
            if idx >= row.len() {
                row.resize(idx + 1, Value::Null);
            }
            row[idx] = value;
        }
        rows.push(row);
    }

    for row in rows.iter_mut() {
        row.resize(names.len(), Value::Null);
    }
    Ok(table_from_rows(names, rows))
}

fn object_to_path_table(obj: &Map<String, serde_json::Value>) -> DecodedTable {
    let mut leaves = Vec::new();
    flatten_object(None, obj, &mut leaves);
    let rows = leaves
        .into_iter()
        .map(|(path, value)| vec![Value::Utf8(path), value])
        .collect();
    table_from_rows(vec!["path".to_string(), "value".to_string()], rows)
}

fn flatten_object(prefix: Option<&str>, obj: &Map<String, serde_json::Value>, out: &mut Vec<(String, Value)>) {
    for (key, v) in obj {
        let path = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        match v {
            serde_json::Value::Object(inner) if !inner.is_empty() => flatten_object(Some(&path), inner, out),
            _ => out.push((path, convert_json_value(v))),
        }
    }
}

pub(crate) fn convert_json_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int64(i)
            } else {
                n.as_f64().map(Value::Float64).unwrap_or(Value::Null)
            }
        }
        serde_json::Value::String(s) => Value::Utf8(s.clone()),
        serde_json::Value::Object(obj) if obj.is_empty() => Value::Null,
        other => Value::Utf8(other.to_string()),
    }
}

/// JSON [`Decoder`]: a whole document for `.json`, one record per line for `.jsonl`.
#[derive(Debug, Clone, Copy)]
pub struct JsonDecoder {
    lines: bool,
}

impl JsonDecoder {
    pub fn document() -> Self {
        Self { lines: false }
    }

    pub fn lines() -> Self {
        Self { lines: true }
    }
}

#[async_trait]
impl Decoder for JsonDecoder {
    async fn decode(&self, bytes: Bytes) -> IngestionResult<DecodedTable> {
        let lines = self.lines;
        run_blocking(move || {
            if lines {
                decode_json_lines(&bytes)
            } else {
                decode_json_document(&bytes)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn colliding_dot_paths_are_rejected() {
        let err = decode_json_document(br#"[{"id":1},{"a.b":1,"a":{"b":2}}]"#).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DecodeError);
        assert!(err.to_string().contains("record 2: field path 'a.b' appears more than once"), "{err}");

        let err = decode_json_lines(b"{\"a\":{\"b\":2},\"a.b\":1}\n").unwrap_err();
        assert!(err.to_string().contains("'a.b'"), "{err}");
    }

    #[test]
    fn nested_records_flatten_to_dot_paths() {
        let t = decode_json_document(br#"[{"id":1,"subject":{"arm":"A","site":{"no":7}}}]"#).unwrap();
        assert_eq!(
            t.schema.field_names().collect::<Vec<_>>(),
            vec!["id", "subject.arm", "subject.site.no"]
        );
        assert_eq!(t.rows[0][2], Value::Int64(7));
    }

    #[test]
    fn sparse_records_get_explicit_nulls() {
        let t = decode_json_document(br#"[{"a":1},{"b":"x"},{"a":2,"b":null}]"#).unwrap();
        assert_eq!(t.column_count(), 2);
        assert_eq!(t.rows[0], vec![Value::Int64(1), Value::Null]);
        assert_eq!(t.rows[1], vec![Value::Null, Value::Utf8("x".to_string())]);
        assert_eq!(t.rows[2], vec![Value::Int64(2), Value::Null]);
    }

    #[test]
    fn single_object_becomes_one_row_per_leaf_path() {
        let t = decode_json_document(br#"{"study":{"id":"S1","arms":2},"open":true}"#).unwrap();
        assert_eq!(t.schema.field_names().collect::<Vec<_>>(), vec!["path", "value"]);
        assert_eq!(t.schema.fields[1].data_type, DataType::Mixed);
        assert_eq!(
            t.rows,
            vec![
                vec![Value::Utf8("study.id".to_string()), Value::Utf8("S1".to_string())],
                vec![Value::Utf8("study.arms".to_string()), Value::Int64(2)],
                vec![Value::Utf8("open".to_string()), Value::Bool(true)],
            ]
        );
    }

    #[test]
    fn arrays_are_kept_as_json_text() {
        let t = decode_json_document(br#"[{"tags":[1,2]}]"#).unwrap();
        assert_eq!(t.rows[0][0], Value::Utf8("[1,2]".to_string()));
    }

    #[test]
    fn json_lines_errors_name_the_line() {
        let err = decode_json_lines(b"{\"a\":1}\n\n{\"a\":\n").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn scalar_documents_are_rejected() {
        let err = decode_json_document(b"42").unwrap_err();
        assert!(matches!(err, IngestionError::Malformed { .. }));
        assert!(decode_json_document(b"   ").is_err());
        assert!(decode_json_document(b"[1,2]").is_err());
    }

    #[test]
    fn syntax_errors_are_json_errors() {
        let err = decode_json_document(b"[{\"a\":1}").unwrap_err();
        assert!(matches!(err, IngestionError::Json(_)));
    }
}
