//! Custom formats section.
//!
//! A custom format is a named bundle of release-matching conditions. The
//! remote API stores the conditions as a `specifications` list where each
//! specification carries its parameters in a `{name, value}` field list;
//! locally they are a map keyed by condition name.

use super::util::{to_attrs, update_resource};
use crate::api::{ArrClient, attr_str};
use crate::error::{Error, Result};
use reconcile::{
    Attrs, CollectionOps, Compare, DiagnosticSink, RemoteMapEntry, delete_collection, local_attrs,
    remote_attrs, update_collection,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

/// Source medium a release was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Television,
    TelevisionRaw,
    WebDl,
    WebRip,
    Dvd,
    Bluray,
    BlurayRaw,
}

impl Source {
    fn code(self) -> i64 {
        match self {
            Self::Television => 1,
            Self::TelevisionRaw => 2,
            Self::WebDl => 3,
            Self::WebRip => 4,
            Self::Dvd => 5,
            Self::Bluray => 6,
            Self::BlurayRaw => 7,
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        [
            Self::Television,
            Self::TelevisionRaw,
            Self::WebDl,
            Self::WebRip,
            Self::Dvd,
            Self::Bluray,
            Self::BlurayRaw,
        ]
        .into_iter()
        .find(|source| source.code() == code)
    }
}

/// Video resolution of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480p")]
    R480p,
    #[serde(rename = "720p")]
    R720p,
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "2160p")]
    R2160p,
}

impl Resolution {
    fn code(self) -> i64 {
        match self {
            Self::R480p => 480,
            Self::R720p => 720,
            Self::R1080p => 1080,
            Self::R2160p => 2160,
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        [Self::R480p, Self::R720p, Self::R1080p, Self::R2160p]
            .into_iter()
            .find(|resolution| resolution.code() == code)
    }
}

/// One matching condition of a custom format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Match the release title against a regular expression
    ReleaseTitle {
        #[serde(default)]
        negate: bool,
        #[serde(default)]
        required: bool,
        /// Case-insensitive regular expression
        regex: String,
    },
    /// Match the source medium
    Source {
        #[serde(default)]
        negate: bool,
        #[serde(default)]
        required: bool,
        source: Source,
    },
    /// Match the video resolution
    Resolution {
        #[serde(default)]
        negate: bool,
        #[serde(default)]
        required: bool,
        resolution: Resolution,
    },
    /// Match the release size range, in gigabytes
    Size {
        #[serde(default)]
        negate: bool,
        #[serde(default)]
        required: bool,
        min: f64,
        max: f64,
    },
}

/// One custom format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFormat {
    /// Append the format name to renamed files when it matches
    pub include_when_renaming: bool,
    /// Matching conditions, keyed by condition name
    pub conditions: BTreeMap<String, Condition>,
}

/// Custom formats, keyed by format name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFormatsSettings {
    /// Delete remote custom formats with no local declaration
    pub delete_unmanaged: bool,
    /// Managed custom formats
    pub definitions: BTreeMap<String, CustomFormat>,
}

/// Encode a local condition map into a remote `specifications` list.
fn encode_conditions(value: &Value) -> reconcile::Result<Value> {
    let conditions = value.as_object().cloned().unwrap_or_default();
    let mut specifications = Vec::with_capacity(conditions.len());
    for (name, condition) in &conditions {
        let kind = condition.get("type").and_then(Value::as_str).unwrap_or("");
        let negate = condition.get("negate").and_then(Value::as_bool).unwrap_or(false);
        let required = condition
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let (implementation, fields) = match kind {
            "release_title" => (
                "ReleaseTitleSpecification",
                json!([{"name": "value", "value": condition.get("regex")}]),
            ),
            "source" => {
                let source: Source =
                    serde_json::from_value(condition.get("source").cloned().unwrap_or_default())?;
                (
                    "SourceSpecification",
                    json!([{"name": "value", "value": source.code()}]),
                )
            }
            "resolution" => {
                let resolution: Resolution = serde_json::from_value(
                    condition.get("resolution").cloned().unwrap_or_default(),
                )?;
                (
                    "ResolutionSpecification",
                    json!([{"name": "value", "value": resolution.code()}]),
                )
            }
            "size" => (
                "SizeSpecification",
                json!([
                    {"name": "min", "value": condition.get("min")},
                    {"name": "max", "value": condition.get("max")},
                ]),
            ),
            other => {
                return Err(reconcile::Error::InvalidValue {
                    attr: "conditions".to_string(),
                    message: format!("unrecognized condition type '{other}'"),
                });
            }
        };
        specifications.push(json!({
            "name": name,
            "implementation": implementation,
            "negate": negate,
            "required": required,
            "fields": fields,
        }));
    }
    Ok(Value::Array(specifications))
}

/// Decode a remote `specifications` list into a local condition map.
fn decode_conditions(value: &Value) -> reconcile::Result<Value> {
    let mut conditions = serde_json::Map::new();
    for spec in value.as_array().cloned().unwrap_or_default() {
        let name = spec
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let implementation = spec
            .get("implementation")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let negate = spec.get("negate").and_then(Value::as_bool).unwrap_or(false);
        let required = spec.get("required").and_then(Value::as_bool).unwrap_or(false);
        let field = |field_name: &str| {
            spec.get("fields")
                .and_then(Value::as_array)
                .and_then(|fields| {
                    fields
                        .iter()
                        .find(|f| f.get("name").and_then(Value::as_str) == Some(field_name))
                })
                .and_then(|f| f.get("value").cloned())
                .unwrap_or(Value::Null)
        };
        let condition = match implementation {
            "ReleaseTitleSpecification" => json!({
                "type": "release_title",
                "negate": negate,
                "required": required,
                "regex": field("value"),
            }),
            "SourceSpecification" => {
                let source = field("value")
                    .as_i64()
                    .and_then(Source::from_code)
                    .ok_or_else(|| reconcile::Error::InvalidValue {
                        attr: "specifications".to_string(),
                        message: format!("unrecognized source code in '{name}'"),
                    })?;
                json!({
                    "type": "source",
                    "negate": negate,
                    "required": required,
                    "source": source,
                })
            }
            "ResolutionSpecification" => {
                let resolution = field("value")
                    .as_i64()
                    .and_then(Resolution::from_code)
                    .ok_or_else(|| reconcile::Error::InvalidValue {
                        attr: "specifications".to_string(),
                        message: format!("unrecognized resolution code in '{name}'"),
                    })?;
                json!({
                    "type": "resolution",
                    "negate": negate,
                    "required": required,
                    "resolution": resolution,
                })
            }
            "SizeSpecification" => json!({
                "type": "size",
                "negate": negate,
                "required": required,
                "min": field("min"),
                "max": field("max"),
            }),
            other => {
                return Err(reconcile::Error::InvalidValue {
                    attr: "specifications".to_string(),
                    message: format!("unsupported specification '{other}' in '{name}'"),
                });
            }
        };
        conditions.insert(name, condition);
    }
    Ok(Value::Object(conditions))
}

fn remote_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("include_when_renaming", "includeCustomFormatWhenRenaming"),
        RemoteMapEntry::new("conditions", "specifications")
            .compare(Compare::Exact)
            .encoder(encode_conditions)
            .decoder(decode_conditions),
    ]
}

struct CustomFormatOps<'a> {
    api: &'a ArrClient,
    api_formats: BTreeMap<String, Attrs>,
}

impl CollectionOps for CustomFormatOps<'_> {
    type Resource = CustomFormat;
    type Error = Error;

    fn create(&mut self, _tree: &str, key: &str, local: &CustomFormat) -> Result<()> {
        let mut attrs = remote_attrs(&remote_map(), &to_attrs(local)?).map_err(Error::from)?;
        attrs.insert("name".to_string(), Value::from(key));
        self.api.resources("customformat").create(&attrs)?;
        Ok(())
    }

    fn update(
        &mut self,
        tree: &str,
        key: &str,
        local: &CustomFormat,
        remote: &CustomFormat,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let api_resource = self.api_formats.get(key).cloned().ok_or_else(|| {
            Error::UnexpectedResponse(format!("custom format '{key}' vanished from the remote"))
        })?;
        update_resource(
            self.api,
            "customformat",
            tree,
            &remote_map(),
            &to_attrs(local)?,
            &to_attrs(remote)?,
            &api_resource,
            sink,
        )
    }

    fn delete(&mut self, _tree: &str, key: &str) -> Result<()> {
        let api_resource = self.api_formats.get(key).ok_or_else(|| {
            Error::UnexpectedResponse(format!("custom format '{key}' vanished from the remote"))
        })?;
        self.api
            .resources("customformat")
            .delete(crate::api::resource_id(api_resource)?)
    }
}

impl CustomFormatsSettings {
    /// Check that every release-title regular expression compiles.
    pub fn validate(&self) -> Result<()> {
        for (format_name, format) in &self.definitions {
            for (condition_name, condition) in &format.conditions {
                if let Condition::ReleaseTitle { regex, .. } = condition {
                    regex::Regex::new(regex).map_err(|e| {
                        Error::Config(format!(
                            "custom_formats.definitions[{format_name}].conditions\
                             [{condition_name}]: invalid regex: {e}"
                        ))
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Read the custom formats of a live instance.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let mut definitions = BTreeMap::new();
        for resource in api.resources("customformat").list()? {
            let name = attr_str(&resource, "name")?.to_string();
            let attrs = local_attrs(&remote_map(), &resource)?;
            definitions.insert(name, serde_json::from_value(Value::Object(attrs))?);
        }
        Ok(Self {
            delete_unmanaged: false,
            definitions,
        })
    }

    fn ops<'a>(&self, api: &'a ArrClient) -> Result<CustomFormatOps<'a>> {
        let mut api_formats = BTreeMap::new();
        for resource in api.resources("customformat").list()? {
            api_formats
                .entry(attr_str(&resource, "name")?.to_string())
                .or_insert(resource);
        }
        Ok(CustomFormatOps { api, api_formats })
    }

    /// Create and update custom formats.
    pub fn update_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let mut ops = self.ops(api)?;
        let local: Vec<(String, &CustomFormat)> = self
            .definitions
            .iter()
            .map(|(name, format)| (name.clone(), format))
            .collect();
        let remote: Vec<(String, &CustomFormat)> = remote
            .definitions
            .iter()
            .map(|(name, format)| (name.clone(), format))
            .collect();
        update_collection(&mut ops, &format!("{tree}.definitions"), &local, &remote, sink)
    }

    /// Delete unmanaged custom formats, when enabled.
    pub fn delete_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        _remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let mut ops = self.ops(api)?;
        let local_keys: BTreeSet<String> = self.definitions.keys().cloned().collect();
        let remote_keys: Vec<String> = ops.api_formats.keys().cloned().collect();
        delete_collection(
            &mut ops,
            &format!("{tree}.definitions"),
            &local_keys,
            &remote_keys,
            self.delete_unmanaged,
            sink,
        )
    }
}
