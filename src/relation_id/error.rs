//! Relation-id error type.

use crate::executor::ExecError;
use crate::value::{ColumnType, TransformError};
use serde_json::Value as JsonValue;
use std::fmt;

/// Errors raised while planning, executing or mapping relation ids
///
/// Planning errors (`UnknownRelation`, `InvalidPath`, `AmbiguousAlias`) are
/// returned before any SQL reaches the executor.
#[derive(Debug)]
pub enum RelationIdError {
    /// The path does not name a relation the metadata can resolve
    UnknownRelation { path: String, reason: String },
    /// The path is not of the form `alias.relation` or the output path is malformed
    InvalidPath { path: String, reason: String },
    /// No free output alias could be generated
    AmbiguousAlias { alias: String },
    /// A raw value could not be converted through the target key's transform
    MappingType {
        property: String,
        expected: ColumnType,
        found: JsonValue,
    },
    /// Mapping errors collected from one result set, one per failed value
    Mapping(Vec<RelationIdError>),
    /// The executor failed; the error is passed through unchanged
    Execution(ExecError),
}

impl RelationIdError {
    /// Replace the path of an `UnknownRelation` with the caller's own spelling.
    pub(crate) fn with_path(self, path: &str) -> Self {
        match self {
            RelationIdError::UnknownRelation { reason, .. } => RelationIdError::UnknownRelation {
                path: path.to_string(),
                reason,
            },
            other => other,
        }
    }

    pub(crate) fn mapping_type(property: &str, err: TransformError) -> Self {
        RelationIdError::MappingType {
            property: property.to_string(),
            expected: err.expected,
            found: err.found,
        }
    }
}

impl fmt::Display for RelationIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationIdError::UnknownRelation { path, reason } => {
                write!(f, "Unknown relation \"{path}\": {reason}")
            }
            RelationIdError::InvalidPath { path, reason } => {
                write!(f, "Invalid relation path \"{path}\": {reason}")
            }
            RelationIdError::AmbiguousAlias { alias } => {
                write!(f, "Could not generate a unique alias for \"{alias}\"")
            }
            RelationIdError::MappingType {
                property,
                expected,
                found,
            } => write!(f, "Cannot map {found} onto \"{property}\" as {expected:?}"),
            RelationIdError::Mapping(errors) => {
                write!(f, "{} relation id value(s) failed to map", errors.len())?;
                if let Some(first) = errors.first() {
                    write!(f, ", first: {first}")?;
                }
                Ok(())
            }
            RelationIdError::Execution(e) => write!(f, "Execution error: {e}"),
        }
    }
}

impl std::error::Error for RelationIdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelationIdError::Execution(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExecError> for RelationIdError {
    fn from(err: ExecError) -> Self {
        RelationIdError::Execution(err)
    }
}
