//! Binding of `sea_query` values as `may_postgres` parameters.
//!
//! The builder renders `$n` placeholders plus a `Values` list; the driver wants
//! `&[&dyn ToSql]`. Values are first copied into typed vectors, then borrowed,
//! so the references stay valid for the duration of the closure.

use crate::executor::ExecError;
use may_postgres::types::ToSql;
use sea_query::Value;

/// Convert `values` into driver parameters and run `f` with them.
///
/// # Errors
///
/// Returns `ExecError::Other` for value kinds the driver binding does not support,
/// or whatever `f` returns.
pub fn with_converted_params<F, R>(values: &sea_query::Values, f: F) -> Result<R, ExecError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, ExecError>,
{
    let mut slots: Vec<Param> = Vec::with_capacity(values.0.len());

    for value in values.iter() {
        let slot = match value {
            Value::Bool(Some(b)) => Param::Bool(*b),
            Value::TinyInt(Some(i)) => Param::Int(i32::from(*i)),
            Value::SmallInt(Some(i)) => Param::Int(i32::from(*i)),
            Value::Int(Some(i)) => Param::Int(*i),
            Value::BigInt(Some(i)) => Param::BigInt(*i),
            Value::TinyUnsigned(Some(u)) => Param::Int(i32::from(*u)),
            Value::SmallUnsigned(Some(u)) => Param::Int(i32::from(*u)),
            Value::Unsigned(Some(u)) => Param::BigInt(i64::from(*u)),
            Value::BigUnsigned(Some(u)) => {
                let v = i64::try_from(*u).map_err(|_| {
                    ExecError::Other(format!(
                        "BigUnsigned value {u} exceeds i64::MAX, cannot be bound"
                    ))
                })?;
                Param::BigInt(v)
            }
            Value::Float(Some(f)) => Param::Float(*f),
            Value::Double(Some(d)) => Param::Double(*d),
            Value::String(Some(s)) => Param::Text(s.to_string()),
            Value::Char(Some(c)) => Param::Text(c.to_string()),
            Value::Bytes(Some(b)) => Param::Bytes(b.to_vec()),
            Value::Json(Some(j)) => Param::Text(j.to_string()),
            Value::Uuid(Some(u)) => Param::Uuid(uuid::Uuid::from_bytes(*u.as_bytes())),
            Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Char(None)
            | Value::Bytes(None)
            | Value::Json(None)
            | Value::Uuid(None) => Param::Null(None),
            other => {
                return Err(ExecError::Other(format!(
                    "Unsupported value type in query: {other:?}"
                )));
            }
        };
        slots.push(slot);
    }

    let params: Vec<&dyn ToSql> = slots.iter().map(Param::as_sql).collect();
    f(&params)
}

enum Param {
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Null(Option<i32>),
}

impl Param {
    fn as_sql(&self) -> &dyn ToSql {
        match self {
            Self::Bool(v) => v,
            Self::Int(v) => v,
            Self::BigInt(v) => v,
            Self::Float(v) => v,
            Self::Double(v) => v,
            Self::Text(v) => v,
            Self::Bytes(v) => v,
            Self::Uuid(v) => v,
            Self::Null(v) => v,
        }
    }
}
