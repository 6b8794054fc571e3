//! Conversion between JSON parameters/results and DuckDB values.

use duckdb::types::{TimeUnit, Value as DbValue};
use serde_json::{Number, Value as JsonValue};

/// Binds a JSON parameter. Arrays and objects are bound as JSON text.
pub(crate) fn to_db_value(value: &JsonValue) -> DbValue {
    match value {
        JsonValue::Null => DbValue::Null,
        JsonValue::Bool(b) => DbValue::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                DbValue::BigInt(i)
            } else if let Some(u) = n.as_u64() {
                DbValue::UBigInt(u)
            } else {
                DbValue::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => DbValue::Text(s.clone()),
        other => DbValue::Text(other.to_string()),
    }
}

/// Normalizes a timestamp or time-of-day to microseconds, whatever the
/// column's precision.
fn micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

fn float(f: f64) -> JsonValue {
    Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
}

/// Renders a result cell as JSON.
pub(crate) fn to_json_value(value: DbValue) -> JsonValue {
    match value {
        DbValue::Null => JsonValue::Null,
        DbValue::Boolean(b) => JsonValue::Bool(b),
        DbValue::TinyInt(i) => i.into(),
        DbValue::SmallInt(i) => i.into(),
        DbValue::Int(i) => i.into(),
        DbValue::BigInt(i) => i.into(),
        DbValue::HugeInt(i) => i64::try_from(i).map_or_else(|_| i.to_string().into(), Into::into),
        DbValue::UTinyInt(i) => i.into(),
        DbValue::USmallInt(i) => i.into(),
        DbValue::UInt(i) => i.into(),
        DbValue::UBigInt(i) => i.into(),
        DbValue::Float(f) => float(f64::from(f)),
        DbValue::Double(f) => float(f),
        DbValue::Decimal(d) => JsonValue::String(d.to_string()),
        DbValue::Text(s) => JsonValue::String(s),
        DbValue::Blob(bytes) => JsonValue::Array(bytes.into_iter().map(Into::into).collect()),
        DbValue::Timestamp(unit, v) | DbValue::Time64(unit, v) => micros(unit, v).into(),
        DbValue::Date32(days) => days.into(),
        DbValue::List(items) => JsonValue::Array(items.into_iter().map(to_json_value).collect()),
        other => JsonValue::String(format!("{other:?}")),
    }
}
