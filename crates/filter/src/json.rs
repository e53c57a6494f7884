//! Apply a [`FieldFilter`] to JSON produced from a reflected value.

use nestfilter_core::{FieldFilter, Reflect};
use nestfilter_schema::{SchemaCache, Slot, TypeNode};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::FilterError;

/// Prune `value`, the JSON form of an instance of `schema`'s type.
///
/// Objects keep the keys that are attributes of their type and that `filter` includes for
/// it; nested objects are pruned against their own type. Arrays are pruned element-wise,
/// collections being transparent. Keys unknown to the schema are dropped; scalars and nulls
/// are kept as they are.
pub fn filter_json(value: &Value, schema: &TypeNode, filter: &dyn FieldFilter) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| filter_json(v, schema, filter)).collect()),
        Value::Object(fields) => {
            let ty = schema.owner().id();
            let mut out = Map::new();
            for (name, field) in fields {
                let slot = match schema.child(name) {
                    Some(slot) if filter.includes(ty, name) => slot,
                    _ => continue,
                };
                let pruned = match slot {
                    Slot::Nested(node) => filter_json(field, node, filter),
                    Slot::Scalar => field.clone(),
                };
                out.insert(name.clone(), pruned);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Serialize `value` to JSON and prune it with `filter`.
pub fn to_filtered_value<T: Reflect + Serialize>(
    value: &T,
    schemas: &SchemaCache,
    filter: &dyn FieldFilter,
) -> Result<Value, FilterError> {
    let schema = schemas.schema::<T>()?;
    let json = serde_json::to_value(value)?;
    Ok(filter_json(&json, schema.tree(), filter))
}
