//! Raw result rows.
//!
//! A [`RawRow`] is what the execution collaborator hands back before any
//! hydration happens: one entry per selected expression, keyed by the alias the
//! expression was selected under.

use crate::executor::ExecError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use may_postgres::types::Type;
use may_postgres::Row;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// One database row, keyed by selected alias
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    values: BTreeMap<String, JsonValue>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(alias, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn insert(&mut self, alias: impl Into<String>, value: JsonValue) {
        self.values.insert(alias.into(), value);
    }

    /// Value selected under `alias`, `None` if the alias was not selected at all.
    pub fn get(&self, alias: &str) -> Option<&JsonValue> {
        self.values.get(alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.values.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Convert a `may_postgres` row, decoding each column by its PostgreSQL type.
    ///
    /// # Errors
    ///
    /// Returns `ExecError::ParseError` for column types without a JSON rendition.
    pub fn from_pg_row(row: &Row) -> Result<Self, ExecError> {
        let mut raw = Self::new();
        for (idx, column) in row.columns().iter().enumerate() {
            let value = decode_column(row, idx, column.type_()).map_err(|e| {
                ExecError::ParseError(format!("column \"{}\": {e}", column.name()))
            })?;
            raw.insert(column.name(), value);
        }
        Ok(raw)
    }
}

impl FromIterator<(String, JsonValue)> for RawRow {
    fn from_iter<T: IntoIterator<Item = (String, JsonValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn get<'a, T>(row: &'a Row, idx: usize) -> Result<Option<T>, String>
where
    T: may_postgres::types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx).map_err(|e| e.to_string())
}

fn list<T: Into<JsonValue>>(items: Option<Vec<Option<T>>>) -> JsonValue {
    match items {
        Some(items) => JsonValue::Array(
            items
                .into_iter()
                .map(|item| item.map_or(JsonValue::Null, Into::into))
                .collect(),
        ),
        None => JsonValue::Null,
    }
}

fn decode_column(row: &Row, idx: usize, ty: &Type) -> Result<JsonValue, String> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map_or(JsonValue::Null, JsonValue::from),
        Type::INT2 => get::<i16>(row, idx)?.map_or(JsonValue::Null, JsonValue::from),
        Type::INT4 => get::<i32>(row, idx)?.map_or(JsonValue::Null, JsonValue::from),
        Type::INT8 => get::<i64>(row, idx)?.map_or(JsonValue::Null, JsonValue::from),
        Type::FLOAT4 => get::<f32>(row, idx)?.map_or(JsonValue::Null, JsonValue::from),
        Type::FLOAT8 => get::<f64>(row, idx)?.map_or(JsonValue::Null, JsonValue::from),
        Type::NUMERIC => get::<rust_decimal::Decimal>(row, idx)?
            .map_or(JsonValue::Null, |d| JsonValue::String(d.to_string())),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, idx)?.map_or(JsonValue::Null, JsonValue::String)
        }
        Type::UUID => get::<uuid::Uuid>(row, idx)?
            .map_or(JsonValue::Null, |u| JsonValue::String(u.hyphenated().to_string())),
        Type::JSON | Type::JSONB => get::<JsonValue>(row, idx)?.unwrap_or(JsonValue::Null),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.map_or(JsonValue::Null, |t| {
            JsonValue::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx)?
            .map_or(JsonValue::Null, |t| JsonValue::String(t.to_rfc3339())),
        Type::DATE => get::<NaiveDate>(row, idx)?
            .map_or(JsonValue::Null, |d| JsonValue::String(d.to_string())),
        Type::INT2_ARRAY => list(get::<Vec<Option<i16>>>(row, idx)?),
        Type::INT4_ARRAY => list(get::<Vec<Option<i32>>>(row, idx)?),
        Type::INT8_ARRAY => list(get::<Vec<Option<i64>>>(row, idx)?),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY => {
            list(get::<Vec<Option<String>>>(row, idx)?)
        }
        Type::UUID_ARRAY => {
            let items = get::<Vec<Option<uuid::Uuid>>>(row, idx)?;
            list(items.map(|v| {
                v.into_iter()
                    .map(|u| u.map(|u| u.hyphenated().to_string()))
                    .collect::<Vec<_>>()
            }))
        }
        _ => return Err(format!("unsupported column type {ty}")),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_pairs_and_lookup() {
        let row = RawRow::from_pairs([("post_id", json!(1)), ("post_title", json!("about kids"))]);
        assert_eq!(row.get("post_id"), Some(&json!(1)));
        assert!(row.contains("post_title"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_null_is_distinct_from_missing() {
        let mut row = RawRow::new();
        row.insert("relid_post_category", JsonValue::Null);
        assert_eq!(row.get("relid_post_category"), Some(&JsonValue::Null));
        assert!(row.get("relid_post_tags").is_none());
    }

    #[test]
    fn test_list_keeps_nulls_in_position() {
        let out = list(Some(vec![Some(1i32), None, Some(3)]));
        assert_eq!(out, json!([1, null, 3]));
        assert_eq!(list::<i32>(None), JsonValue::Null);
    }
}
