//! Hydration of root entities from raw rows.
//!
//! Raw rows are grouped by the root primary key in first-seen order. Each
//! group becomes one [`Record`]; the indices of its rows are kept so the
//! relation-id mapper can find them again.

use crate::relation_id::error::RelationIdError;
use crate::value::{ColumnType, RawRow};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// A root-entity column as selected on the query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedColumn {
    pub property: String,
    pub column: String,
    /// Alias the column is selected under, `<alias>_<column>` unless clipped or taken
    pub alias: String,
    pub column_type: ColumnType,
    pub primary: bool,
}

/// Primary-key values of one entity, serialized
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey(Vec<String>);

impl EntityKey {
    pub fn from_values(values: &[JsonValue]) -> Self {
        Self(values.iter().map(JsonValue::to_string).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

/// One hydrated entity
///
/// Properties are the entity's column values keyed by property name, plus
/// whatever relation ids were mapped onto it. A null column or relation id
/// is absent, not `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: EntityKey,
    properties: Map<String, JsonValue>,
}

impl Record {
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            properties: Map::new(),
        }
    }

    /// Value at a dot-separated property path.
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        segments.try_fold(self.properties.get(first)?, |value, segment| value.get(segment))
    }

    pub fn properties(&self) -> &Map<String, JsonValue> {
        &self.properties
    }

    pub fn into_properties(self) -> Map<String, JsonValue> {
        self.properties
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.properties)
    }

    /// Deserialize the record into a caller type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(JsonValue::Object(self.properties.clone()))
    }

    /// Set (or with `None`, remove) the value at `path`, creating objects on the way.
    pub fn set_path(&mut self, path: &[&str], value: Option<JsonValue>) {
        set_in(&mut self.properties, path, value);
    }
}

fn set_in(map: &mut Map<String, JsonValue>, path: &[&str], value: Option<JsonValue>) {
    match path {
        [] => {}
        [last] => match value {
            Some(v) => {
                map.insert((*last).to_string(), v);
            }
            None => {
                map.remove(*last);
            }
        },
        [head, rest @ ..] => {
            if value.is_none() && !map.contains_key(*head) {
                return;
            }
            let slot = map
                .entry((*head).to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !slot.is_object() {
                log::warn!("replacing non-object property \"{head}\" to set a nested relation id");
                *slot = JsonValue::Object(Map::new());
            }
            if let JsonValue::Object(inner) = slot {
                set_in(inner, rest, value);
            }
        }
    }
}

/// Records and, per record, the indices of the raw rows that produced it
#[derive(Debug, Clone, Default)]
pub struct Hydrated {
    pub records: Vec<Record>,
    pub groups: Vec<Vec<usize>>,
}

/// Group `rows` by primary key and build one record per group.
///
/// Rows whose primary key is null are skipped.
pub fn hydrate(rows: &[RawRow], columns: &[SelectedColumn]) -> Result<Hydrated, RelationIdError> {
    let mut hydrated = Hydrated::default();
    let mut seen: HashMap<EntityKey, usize> = HashMap::new();

    'rows: for (index, row) in rows.iter().enumerate() {
        let mut key_parts = Vec::new();
        for column in columns.iter().filter(|c| c.primary) {
            let value = convert(row, column)?;
            if value.is_null() {
                log::warn!("skipping raw row {index}: primary key \"{}\" is null", column.property);
                continue 'rows;
            }
            key_parts.push(value);
        }
        let key = EntityKey::from_values(&key_parts);

        if let Some(&position) = seen.get(&key) {
            hydrated.groups[position].push(index);
            continue;
        }

        let mut record = Record::new(key.clone());
        for column in columns {
            let value = convert(row, column)?;
            if !value.is_null() {
                record.properties.insert(column.property.clone(), value);
            }
        }
        seen.insert(key, hydrated.records.len());
        hydrated.records.push(record);
        hydrated.groups.push(vec![index]);
    }

    log::trace!("hydrated {} record(s) from {} row(s)", hydrated.records.len(), rows.len());
    Ok(hydrated)
}

fn convert(row: &RawRow, column: &SelectedColumn) -> Result<JsonValue, RelationIdError> {
    let raw = row.get(&column.alias).unwrap_or(&JsonValue::Null);
    column
        .column_type
        .transform(raw)
        .map_err(|e| RelationIdError::mapping_type(&column.property, e))
}
