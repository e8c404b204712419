//! Argument extraction helpers.
//!
//! Tool arguments arrive as loosely-typed JSON objects; these helpers pull
//! out typed values and turn missing or mistyped fields into
//! [`ToolError::InvalidArguments`] with a message naming the field.

use serde_json::{Map, Value};

use crate::errors::{Result, ToolError};

/// Required integer field.
pub fn require_i64(args: &Map<String, Value>, key: &str) -> Result<i64> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing integer field '{key}'")))
}

/// Required string field.
pub fn require_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing string field '{key}'")))
}

/// Optional string field. Present-but-mistyped is an error, absent is `None`.
pub fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ToolError::invalid_arguments(format!(
            "field '{key}' must be a string, got {other}"
        ))),
    }
}

/// Optional integer field with a default.
pub fn i64_or(args: &Map<String, Value>, key: &str, default: i64) -> Result<i64> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value.as_i64().ok_or_else(|| {
            ToolError::invalid_arguments(format!("field '{key}' must be an integer, got {value}"))
        }),
    }
}

/// Parse a `"min-max"` price range.
pub fn parse_price_range(raw: &str) -> Result<(f64, f64)> {
    let invalid =
        || ToolError::invalid_arguments(format!("price_range must be 'min-max', got '{raw}'"));
    let (min, max) = raw.split_once('-').ok_or_else(invalid)?;
    let min: f64 = min.trim().parse().map_err(|_| invalid())?;
    let max: f64 = max.trim().parse().map_err(|_| invalid())?;
    if min > max {
        return Err(invalid());
    }
    Ok((min, max))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
