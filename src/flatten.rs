use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::Error;

/// One entry per scalar of the original payload, keyed by its path.
/// Map children are joined with `.`, sequence elements get `[i]` appended.
pub type FlatRecord = BTreeMap<String, Value>;

/// Flattens a raw API payload. The top level must be an object; everything
/// below it may be any mix of objects, arrays and scalars.
pub fn flatten(root: &Value) -> Result<FlatRecord, Error> {
    let Value::Object(map) = root else {
        return Err(Error::Malformed("top-level payload is not an object".to_string()));
    };
    let mut flat = FlatRecord::new();
    flatten_map(map, "", &mut flat);
    Ok(flat)
}

fn flatten_map(map: &Map<String, Value>, parent: &str, out: &mut FlatRecord) {
    for (key, value) in map {
        let path = if parent.is_empty() {
            key.clone()
        } else {
            format!("{parent}.{key}")
        };
        flatten_value(value, &path, out);
    }
}

fn flatten_value(value: &Value, path: &str, out: &mut FlatRecord) {
    match value {
        Value::Object(map) => flatten_map(map, path, out),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let indexed = format!("{path}[{i}]");
                if let Value::Object(map) = item {
                    flatten_map(map, &indexed, out);
                } else {
                    // non-object elements (nested arrays included) stay opaque
                    out.insert(indexed, item.clone());
                }
            }
        }
        scalar => {
            out.insert(path.to_string(), scalar.clone());
        }
    }
}
