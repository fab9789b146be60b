//! Writing fetched relation ids onto hydrated records.
//!
//! Runs once per fetched row set, after hydration. Records and raw rows are
//! matched through the hydration groups, i.e. by the entity's own primary key.

use crate::query::hydrate::Record;
use crate::relation_id::augmentor::{RegisteredRelationId, RelationIdRegistry};
use crate::relation_id::error::RelationIdError;
use crate::relation_id::planner::PlannedFragment;
use crate::value::RawRow;
use serde_json::{Map, Value as JsonValue};

/// Map every registered request onto `records`.
///
/// `groups[i]` lists the indices in `rows` that hydrated `records[i]`, in row
/// order. A failing value is reported and skipped; it never stops the other
/// requests or records from being mapped.
pub fn map(
    rows: &[RawRow],
    records: &mut [Record],
    groups: &[Vec<usize>],
    registry: &RelationIdRegistry,
) -> Vec<RelationIdError> {
    let mut errors = Vec::new();
    for entry in registry.entries() {
        let path: Vec<&str> = entry.request.output_segments().collect();
        for (record, group) in records.iter_mut().zip(groups) {
            let mapped = if entry.is_multi_valued {
                list_value(rows, group, entry).map(Some)
            } else {
                single_value(rows, group, entry)
            };
            match mapped {
                Ok(value) => record.set_path(&path, value),
                Err(e) => {
                    log::warn!("relation id for {:?} not mapped: {e}", record.key);
                    errors.push(e);
                }
            }
        }
    }
    errors
}

// First raw row of the entity; `None` when any key part is null.
fn single_value(
    rows: &[RawRow],
    group: &[usize],
    entry: &RegisteredRelationId,
) -> Result<Option<JsonValue>, RelationIdError> {
    let Some(row) = group.first().and_then(|&i| rows.get(i)) else {
        return Ok(None);
    };
    let mut parts = Vec::with_capacity(entry.fragments.len());
    for fragment in &entry.fragments {
        let raw = row.get(&fragment.output_alias).unwrap_or(&JsonValue::Null);
        let value = convert(entry, fragment, raw)?;
        if value.is_null() {
            return Ok(None);
        }
        parts.push(value);
    }
    Ok(Some(assemble(entry, parts)))
}

// Every id across the entity's raw rows, first-seen order, without duplicates.
fn list_value(
    rows: &[RawRow],
    group: &[usize],
    entry: &RegisteredRelationId,
) -> Result<JsonValue, RelationIdError> {
    let mut items: Vec<JsonValue> = Vec::new();
    for row in group.iter().filter_map(|&i| rows.get(i)) {
        let columns: Vec<Vec<&JsonValue>> = entry
            .fragments
            .iter()
            .map(|f| elements(row.get(&f.output_alias)))
            .collect();
        let count = columns.first().map_or(0, Vec::len);

        'item: for position in 0..count {
            let mut parts = Vec::with_capacity(entry.fragments.len());
            for (fragment, column) in entry.fragments.iter().zip(&columns) {
                let raw = column.get(position).copied().unwrap_or(&JsonValue::Null);
                let value = convert(entry, fragment, raw)?;
                if value.is_null() {
                    continue 'item;
                }
                parts.push(value);
            }
            let item = assemble(entry, parts);
            if !items.contains(&item) {
                items.push(item);
            }
        }
    }
    Ok(JsonValue::Array(items))
}

// An `ARRAY(...)` result, or the scalar a joined row contributes.
fn elements(raw: Option<&JsonValue>) -> Vec<&JsonValue> {
    match raw {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(values)) => values.iter().collect(),
        Some(value) => vec![value],
    }
}

fn convert(
    entry: &RegisteredRelationId,
    fragment: &PlannedFragment,
    raw: &JsonValue,
) -> Result<JsonValue, RelationIdError> {
    fragment
        .column_type
        .transform(raw)
        .map_err(|e| RelationIdError::mapping_type(entry.target_property_path(), e))
}

fn assemble(entry: &RegisteredRelationId, mut parts: Vec<JsonValue>) -> JsonValue {
    if entry.mixed_map && parts.len() == 1 {
        return parts.remove(0);
    }
    let object: Map<String, JsonValue> = entry
        .fragments
        .iter()
        .map(|f| f.key_property.clone())
        .zip(parts)
        .collect();
    JsonValue::Object(object)
}
