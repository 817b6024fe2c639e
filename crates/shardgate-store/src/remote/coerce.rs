//! Conversion of domain values into remote column types.

use super::store::RemoteType;
use rust_decimal::prelude::ToPrimitive;
use shardgate_commons::{Value, ValueError, ValueResult};

/// Coerce `value` for a column of type `ty`.
///
/// Absent and empty values become the column's zero value. Values the rules
/// below do not cover pass through unchanged and are left to the store to
/// accept or reject.
pub fn convert(ty: RemoteType, value: Option<&Value>) -> ValueResult<Value> {
    let value = match value {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(zero(ty)),
    };

    Ok(match (ty, value) {
        (RemoteType::Unsigned, Value::Str(s)) => Value::Int(parse_unsigned(s)?),
        (RemoteType::Number, Value::Str(s)) => Value::Float(parse_number(s)?),
        (RemoteType::Number, Value::Int(v)) => Value::Float(*v as f64),
        (RemoteType::String, Value::Int(v)) => Value::Str(v.to_string()),
        (RemoteType::Number, Value::Decimal(d)) => {
            Value::Float(d.to_f64().ok_or_else(|| invalid(d.to_string(), "number"))?)
        }
        (RemoteType::Unsigned, Value::Decimal(d)) => {
            Value::Int(d.trunc().to_i64().ok_or_else(|| invalid(d.to_string(), "unsigned"))?)
        }
        (RemoteType::String, Value::Decimal(d)) => Value::Str(d.to_string()),
        (_, Value::Type(name)) => Value::Str(name.clone()),
        (_, other) => other.clone(),
    })
}

fn zero(ty: RemoteType) -> Value {
    match ty {
        RemoteType::Unsigned => Value::Int(0),
        RemoteType::Number => Value::Float(0.0),
        RemoteType::String => Value::Str(String::new()),
    }
}

fn invalid(value: String, target: &'static str) -> ValueError {
    ValueError::InvalidNumber { value, target }
}

fn parse_unsigned(s: &str) -> ValueResult<i64> {
    s.trim()
        .parse::<u64>()
        .ok()
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| invalid(s.to_string(), "unsigned"))
}

/// Trailing `-` marks a negative number ("12.5-" is -12.5).
fn parse_number(s: &str) -> ValueResult<f64> {
    let trimmed = s.trim();
    let parsed = match trimmed.strip_suffix('-') {
        Some(magnitude) => magnitude.parse::<f64>().map(|v| -v),
        None => trimmed.parse::<f64>(),
    };
    parsed.map_err(|_| invalid(s.to_string(), "number"))
}
