//! Column types and identifier value transforms.
//!
//! Raw rows carry untyped JSON scalars. Before an identifier is written onto a
//! result object it is passed through the transform of the column it came
//! from, so that e.g. a `BIGINT` delivered as text still lands as a number and
//! a `UUID` is normalized to its hyphenated lowercase form.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value as JsonValue};
use std::fmt;

/// Declared type of an entity column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    /// Arbitrary precision numeric, kept as a string to avoid rounding
    Decimal,
    Text,
    Boolean,
    Uuid,
    Json,
    Timestamp,
    Date,
}

impl ColumnType {
    /// Convert a raw scalar into the value written onto a result object.
    ///
    /// `Null` is returned unchanged; callers decide what absence means.
    pub fn transform(self, raw: &JsonValue) -> Result<JsonValue, TransformError> {
        if raw.is_null() {
            return Ok(JsonValue::Null);
        }
        match self {
            Self::SmallInt | Self::Integer | Self::BigInt => integer(self, raw),
            Self::Float | Self::Double => float(self, raw),
            Self::Decimal => match raw {
                JsonValue::Number(n) => Ok(JsonValue::String(n.to_string())),
                JsonValue::String(s) if s.trim().parse::<f64>().is_ok() => {
                    Ok(JsonValue::String(s.trim().to_string()))
                }
                other => Err(TransformError::new(self, other)),
            },
            Self::Text => match raw {
                JsonValue::String(_) => Ok(raw.clone()),
                JsonValue::Number(n) => Ok(JsonValue::String(n.to_string())),
                JsonValue::Bool(b) => Ok(JsonValue::String(b.to_string())),
                other => Err(TransformError::new(self, other)),
            },
            Self::Boolean => match raw {
                JsonValue::Bool(_) => Ok(raw.clone()),
                JsonValue::Number(n) if n.as_i64() == Some(0) => Ok(JsonValue::Bool(false)),
                JsonValue::Number(n) if n.as_i64() == Some(1) => Ok(JsonValue::Bool(true)),
                JsonValue::String(s) => match s.as_str() {
                    "t" | "true" | "1" => Ok(JsonValue::Bool(true)),
                    "f" | "false" | "0" => Ok(JsonValue::Bool(false)),
                    _ => Err(TransformError::new(self, raw)),
                },
                other => Err(TransformError::new(self, other)),
            },
            Self::Uuid => match raw {
                JsonValue::String(s) => uuid::Uuid::parse_str(s)
                    .map(|u| JsonValue::String(u.hyphenated().to_string()))
                    .map_err(|_| TransformError::new(self, raw)),
                other => Err(TransformError::new(self, other)),
            },
            Self::Json => Ok(raw.clone()),
            Self::Timestamp => match raw {
                JsonValue::String(s) => {
                    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                        Ok(JsonValue::String(dt.to_rfc3339()))
                    } else {
                        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                            .map(|dt| JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
                            .map_err(|_| TransformError::new(self, raw))
                    }
                }
                other => Err(TransformError::new(self, other)),
            },
            Self::Date => match raw {
                JsonValue::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(|d| JsonValue::String(d.to_string()))
                    .map_err(|_| TransformError::new(self, raw)),
                other => Err(TransformError::new(self, other)),
            },
        }
    }
}

fn integer(ty: ColumnType, raw: &JsonValue) -> Result<JsonValue, TransformError> {
    let parsed = match raw {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .map(|i| JsonValue::Number(Number::from(i)))
        .ok_or_else(|| TransformError::new(ty, raw))
}

fn float(ty: ColumnType, raw: &JsonValue) -> Result<JsonValue, TransformError> {
    let parsed = match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .map(JsonValue::Number)
        .ok_or_else(|| TransformError::new(ty, raw))
}

/// A raw value that does not fit the declared column type
#[derive(Debug, Clone, PartialEq)]
pub struct TransformError {
    pub expected: ColumnType,
    pub found: JsonValue,
}

impl TransformError {
    fn new(expected: ColumnType, found: &JsonValue) -> Self {
        Self {
            expected,
            found: found.clone(),
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot convert {} to {:?}", self.found, self.expected)
    }
}

impl std::error::Error for TransformError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_accepts_numbers_and_numeric_text() {
        assert_eq!(ColumnType::Integer.transform(&json!(7)).unwrap(), json!(7));
        assert_eq!(ColumnType::BigInt.transform(&json!("9007199254740993")).unwrap(), json!(9007199254740993i64));
        assert!(ColumnType::Integer.transform(&json!("seven")).is_err());
        assert!(ColumnType::Integer.transform(&json!(1.5)).is_err());
    }

    #[test]
    fn test_null_passes_through() {
        for ty in [ColumnType::Integer, ColumnType::Uuid, ColumnType::Text] {
            assert_eq!(ty.transform(&JsonValue::Null).unwrap(), JsonValue::Null);
        }
    }

    #[test]
    fn test_uuid_is_normalized() {
        let out = ColumnType::Uuid
            .transform(&json!("67E55044-10B1-426F-9247-BB680E5FE0C8"))
            .unwrap();
        assert_eq!(out, json!("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(ColumnType::Uuid.transform(&json!("not-a-uuid")).is_err());
    }

    #[test]
    fn test_text_and_boolean() {
        assert_eq!(ColumnType::Text.transform(&json!(12)).unwrap(), json!("12"));
        assert_eq!(ColumnType::Boolean.transform(&json!("t")).unwrap(), json!(true));
        assert_eq!(ColumnType::Boolean.transform(&json!(0)).unwrap(), json!(false));
        assert!(ColumnType::Text.transform(&json!([1])).is_err());
    }

    #[test]
    fn test_transform_error_display() {
        let err = ColumnType::Integer.transform(&json!("x")).unwrap_err();
        assert!(err.to_string().contains("Integer"));
    }
}
