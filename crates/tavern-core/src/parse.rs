use serde_json::Value;

/// Read an integer out of a loosely typed form field.
///
/// Accepts JSON integers, integral floats, and strings whose trimmed text is an
/// integer. Returns `None` for everything else so callers keep the old value.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
