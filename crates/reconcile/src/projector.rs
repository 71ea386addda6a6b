//! Attribute projection between local configuration and remote resources.
//!
//! Polymorphic remote resources (indexers, download clients, metadata
//! providers) keep their implementation-specific parameters in a `fields`
//! list of `{name, value}` records; mapping entries marked `is_field`
//! read and write that list, everything else maps to top-level attributes.

use crate::error::{Error, Result};
use crate::mapping::RemoteMapEntry;
use serde_json::{Map, Value};

/// An untyped attribute mapping, as exchanged with the remote API.
pub type Attrs = Map<String, Value>;

/// Project a remote resource into local attribute values.
///
/// Produces a map keyed by local field names, suitable for deserializing
/// into a typed configuration object. A missing remote value falls back to
/// the entry's `field_default`; with no default the projection fails.
pub fn local_attrs(map: &[RemoteMapEntry], remote: &Attrs) -> Result<Attrs> {
    let mut local = Attrs::new();
    for entry in map {
        let raw = if entry.is_field {
            field_value(remote, entry.remote)
        } else {
            remote.get(entry.remote).cloned()
        };
        let raw = match raw.or_else(|| entry.field_default.clone()) {
            Some(value) => value,
            None => {
                return Err(Error::MissingAttr {
                    attr: entry.remote.to_string(),
                });
            }
        };
        local.insert(entry.local.to_string(), entry.decode(&raw)?);
    }
    Ok(local)
}

/// Project local attribute values into remote resource attributes.
///
/// Takes a map keyed by local field names (a serialized configuration
/// object) and produces remote attributes, with `is_field` entries
/// collected into a `fields` list of `{name, value}` records.
pub fn remote_attrs(map: &[RemoteMapEntry], local: &Attrs) -> Result<Attrs> {
    let mut remote = Attrs::new();
    let mut fields: Vec<Value> = Vec::new();
    for entry in map {
        let value = local.get(entry.local).cloned().unwrap_or(Value::Null);
        let encoded = entry.encode(&value)?;
        if entry.is_field {
            fields.push(field_record(entry.remote, encoded));
        } else {
            remote.insert(entry.remote.to_string(), encoded);
        }
    }
    if !fields.is_empty() {
        remote.insert("fields".to_string(), Value::Array(fields));
    }
    Ok(remote)
}

/// Merge computed field values into an existing field list.
///
/// `base` defines the schema: its entries keep their order and any
/// attributes beyond `value` they carry. An entry whose name appears in
/// `computed` gets its value replaced; every other entry passes through
/// unchanged. Computed entries with no counterpart in `base` are dropped,
/// since the base sequence is authoritative for which fields exist.
/// Returns a new sequence; neither input is mutated.
pub fn merge_field_values(base: &[Value], computed: &[Value]) -> Vec<Value> {
    base.iter()
        .map(|field| {
            let name = field.get("name").and_then(Value::as_str);
            let replacement = name.and_then(|n| {
                computed
                    .iter()
                    .find(|c| c.get("name").and_then(Value::as_str) == Some(n))
            });
            match (field, replacement) {
                (Value::Object(attrs), Some(replacement)) => {
                    let mut merged = attrs.clone();
                    merged.insert(
                        "value".to_string(),
                        replacement.get("value").cloned().unwrap_or(Value::Null),
                    );
                    Value::Object(merged)
                }
                _ => field.clone(),
            }
        })
        .collect()
}

/// Select the schema template for an implementation from the remote
/// catalog, matching case-insensitively on the `implementation` attribute.
///
/// The returned template has its `id` and `name` attributes stripped so it
/// can seed a new resource directly.
pub fn select_schema(schemas: &[Attrs], implementation: &str) -> Result<Attrs> {
    let schema = schemas.iter().find(|schema| {
        schema
            .get("implementation")
            .and_then(Value::as_str)
            .is_some_and(|name| name.eq_ignore_ascii_case(implementation))
    });
    match schema {
        Some(schema) => {
            let mut template = schema.clone();
            template.remove("id");
            template.remove("name");
            Ok(template)
        }
        None => Err(Error::UnsupportedImplementation {
            implementation: implementation.to_string(),
            available: schemas
                .iter()
                .filter_map(|s| s.get("implementation").and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
        }),
    }
}

/// Look up a value in a resource's `{name, value}` field list.
fn field_value(remote: &Attrs, name: &str) -> Option<Value> {
    remote
        .get("fields")?
        .as_array()?
        .iter()
        .find(|field| field.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|field| field.get("value").cloned())
}

/// Build one `{name, value}` field record.
fn field_record(name: &str, value: Value) -> Value {
    let mut record = Attrs::new();
    record.insert("name".to_string(), Value::String(name.to_string()));
    record.insert("value".to_string(), value);
    Value::Object(record)
}
