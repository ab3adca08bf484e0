//! Blob encoding for cached artifacts.
//!
//! A value saved under a `.csv` name that is a flat numeric array, or a
//! rectangular numeric matrix, is written as plain comma separated text.
//! Everything else is CBOR behind [`BINARY_MAGIC`], which is how a blob is
//! recognised on load regardless of the name it was saved under.

use serde_json::{Number, Value};

pub const BINARY_MAGIC: &[u8] = b"STEPLOG-CBOR\x01\n";

const CSV_SUFFIX: &str = ".csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobFormat {
    Csv,
    Binary,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cbor encoding failed: {0}")]
    CborEncode(String),
    #[error("cbor decoding failed: {0}")]
    CborDecode(String),
    #[error("csv line {line}: {reason}")]
    Csv { line: usize, reason: String },
    #[error("csv blob is not utf-8")]
    CsvEncoding,
}

pub fn choose_format(filename: &str, value: &Value) -> BlobFormat {
    if filename.ends_with(CSV_SUFFIX) && is_tabular(value) {
        BlobFormat::Csv
    } else {
        BlobFormat::Binary
    }
}

pub fn encode(filename: &str, value: &Value) -> Result<Vec<u8>, CodecError> {
    match choose_format(filename, value) {
        BlobFormat::Csv => Ok(encode_csv(value).into_bytes()),
        BlobFormat::Binary => encode_binary(value),
    }
}

pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    match bytes.strip_prefix(BINARY_MAGIC) {
        Some(body) => ciborium::de::from_reader(body)
            .map_err(|err| CodecError::CborDecode(err.to_string())),
        None => {
            let text = std::str::from_utf8(bytes).map_err(|_| CodecError::CsvEncoding)?;
            decode_csv(text)
        }
    }
}

fn encode_binary(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut out = BINARY_MAGIC.to_vec();
    ciborium::ser::into_writer(value, &mut out)
        .map_err(|err| CodecError::CborEncode(err.to_string()))?;
    Ok(out)
}

/// Single-column matrices are not tabular: their CSV text is the same as a
/// flat vector's and would reload as one.
fn is_tabular(value: &Value) -> bool {
    let Value::Array(items) = value else {
        return false;
    };
    if items.iter().all(Value::is_number) {
        return true;
    }
    let mut width = None;
    for item in items {
        let Value::Array(row) = item else {
            return false;
        };
        if row.is_empty() || !row.iter().all(Value::is_number) {
            return false;
        }
        match width {
            None => width = Some(row.len()),
            Some(expected) if expected != row.len() => return false,
            Some(_) => {}
        }
    }
    width != Some(1)
}

fn encode_csv(value: &Value) -> String {
    let mut out = String::new();
    if let Value::Array(items) = value {
        for item in items {
            match item {
                Value::Array(row) => {
                    let line = row.iter().map(Value::to_string).collect::<Vec<_>>();
                    out.push_str(&line.join(","));
                }
                other => out.push_str(&other.to_string()),
            }
            out.push('\n');
        }
    }
    out
}

fn decode_csv(text: &str) -> Result<Value, CodecError> {
    let mut rows = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields = line
            .split(',')
            .map(|field| parse_number(field.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| CodecError::Csv {
                line: index + 1,
                reason,
            })?;
        rows.push(fields);
    }

    if rows.iter().all(|row| row.len() == 1) {
        return Ok(Value::Array(
            rows.into_iter().flatten().map(Value::Number).collect(),
        ));
    }
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if let Some(row) = rows.iter().position(|row| row.len() != width) {
        return Err(CodecError::Csv {
            line: row + 1,
            reason: format!("expected {width} columns"),
        });
    }
    Ok(Value::Array(
        rows.into_iter()
            .map(|row| Value::Array(row.into_iter().map(Value::Number).collect()))
            .collect(),
    ))
}

fn parse_number(field: &str) -> Result<Number, String> {
    if let Ok(value) = field.parse::<i64>() {
        return Ok(Number::from(value));
    }
    if let Ok(value) = field.parse::<u64>() {
        return Ok(Number::from(value));
    }
    field
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| format!("`{field}` is not a number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_is_used_only_for_numeric_arrays_under_csv_names() {
        assert_eq!(choose_format("X.csv", &json!([1, 2, 3])), BlobFormat::Csv);
        assert_eq!(
            choose_format("X.csv", &json!([[1, 2], [3, 4]])),
            BlobFormat::Csv
        );
        assert_eq!(choose_format("X.bin", &json!([1, 2])), BlobFormat::Binary);
        assert_eq!(choose_format("X.csv", &json!(["a"])), BlobFormat::Binary);
        assert_eq!(
            choose_format("X.csv", &json!([[1, 2], [3]])),
            BlobFormat::Binary
        );
        assert_eq!(choose_format("X.csv", &json!({"a": 1})), BlobFormat::Binary);
        assert_eq!(
            choose_format("X.csv", &json!([[1], [2], [3]])),
            BlobFormat::Binary
        );
    }

    #[test]
    fn csv_keeps_integers_and_floats_apart() {
        let value = json!([1, 2.5, -3, 4.0]);
        let bytes = encode("y.csv", &value).expect("encode");
        assert_eq!(
            String::from_utf8(bytes.clone()).expect("utf8"),
            "1\n2.5\n-3\n4.0\n"
        );
        assert_eq!(decode(&bytes).expect("decode"), value);
    }

    #[test]
    fn csv_matrix_round_trips() {
        let value = json!([[1, 2, 3], [4.5, 5, 6]]);
        let bytes = encode("X.csv", &value).expect("encode");
        assert_eq!(decode(&bytes).expect("decode"), value);
    }

    #[test]
    fn binary_blobs_carry_magic_header() {
        let value = json!({"trees": [1, 2], "label": "rf"});
        let bytes = encode("classifier.rf", &value).expect("encode");
        assert!(bytes.starts_with(BINARY_MAGIC));
        assert_eq!(decode(&bytes).expect("decode"), value);
    }

    #[test]
    fn malformed_csv_reports_line() {
        let err = decode(b"1\n2\nabc\n").expect_err("bad csv");
        assert!(matches!(err, CodecError::Csv { line: 3, .. }));
    }
}
