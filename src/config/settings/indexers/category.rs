//! Newznab/Torznab category handling.
//!
//! Categories are declared by their site name (`TV/HD`) or directly by
//! their numeric code; the remote API only speaks codes. Codes without a
//! well-known name round-trip as plain numbers.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Well-known category names and their codes.
const CATEGORIES: &[(u32, &str)] = &[
    (5000, "TV"),
    (5010, "TV/WEB-DL"),
    (5020, "TV/Foreign"),
    (5030, "TV/SD"),
    (5040, "TV/HD"),
    (5045, "TV/UHD"),
    (5050, "TV/Other"),
    (5060, "TV/Sport"),
    (5070, "TV/Anime"),
    (5080, "TV/Documentary"),
    (5090, "TV/x265"),
];

/// One Newznab category, by name when known, by raw code otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NabCategory(pub u32);

impl NabCategory {
    /// Numeric code sent to the remote API.
    pub fn code(self) -> u32 {
        self.0
    }

    /// Well-known name, when there is one.
    pub fn name(self) -> Option<&'static str> {
        CATEGORIES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, name)| *name)
    }

    /// Parse a category name. `TV/Sports` is accepted as an alias of
    /// `TV/Sport`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = if name.eq_ignore_ascii_case("TV/Sports") {
            "TV/Sport"
        } else {
            name
        };
        CATEGORIES
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(name))
            .map(|(code, _)| Self(*code))
    }
}

impl fmt::Display for NabCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for NabCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.name() {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_u32(self.0),
        }
    }
}

struct NabCategoryVisitor;

impl Visitor<'_> for NabCategoryVisitor {
    type Value = NabCategory;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a category name or numeric category code")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<NabCategory, E> {
        NabCategory::from_name(value)
            .ok_or_else(|| E::custom(format!("unrecognized category name '{value}'")))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<NabCategory, E> {
        u32::try_from(value)
            .map(NabCategory)
            .map_err(|_| E::custom(format!("category code {value} out of range")))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<NabCategory, E> {
        u32::try_from(value)
            .map(NabCategory)
            .map_err(|_| E::custom(format!("category code {value} out of range")))
    }
}

impl<'de> Deserialize<'de> for NabCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NabCategoryVisitor)
    }
}

/// Encoder for category set fields: names/codes to a sorted code list.
pub fn encode_categories(value: &Value) -> reconcile::Result<Value> {
    let mut codes = Vec::new();
    for item in value.as_array().cloned().unwrap_or_default() {
        let category: NabCategory =
            serde_json::from_value(item).map_err(reconcile::Error::from)?;
        codes.push(category.code());
    }
    codes.sort_unstable();
    Ok(serde_json::to_value(codes)?)
}

/// Decoder for category set fields: codes back to names where known.
pub fn decode_categories(value: &Value) -> reconcile::Result<Value> {
    let mut categories: Vec<NabCategory> = value
        .as_array()
        .map(|codes| {
            codes
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|code| u32::try_from(code).ok())
                .map(NabCategory)
                .collect()
        })
        .unwrap_or_default();
    categories.sort_unstable();
    Ok(serde_json::to_value(categories)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_and_code_round_trip() {
        let category = NabCategory::from_name("TV/HD").unwrap();
        assert_eq!(category.code(), 5040);
        assert_eq!(category.name(), Some("TV/HD"));
        assert_eq!(NabCategory::from_name("tv/sports"), Some(NabCategory(5060)));
        assert_eq!(NabCategory(9999).name(), None);
    }

    #[test]
    fn test_serde_mixed_forms() {
        let categories: Vec<NabCategory> = serde_json::from_value(json!(["TV/HD", 9999])).unwrap();
        assert_eq!(categories, vec![NabCategory(5040), NabCategory(9999)]);
        assert_eq!(
            serde_json::to_value(&categories).unwrap(),
            json!(["TV/HD", 9999])
        );
    }

    #[test]
    fn test_encode_decode_category_codes() {
        let encoded = encode_categories(&json!(["TV/HD", "TV/SD", 9999])).unwrap();
        assert_eq!(encoded, json!([5030, 5040, 9999]));
        let decoded = decode_categories(&encoded).unwrap();
        assert_eq!(decoded, json!(["TV/SD", "TV/HD", 9999]));
    }

    #[test]
    fn test_unknown_name_rejected() {
        let result: Result<NabCategory, _> = serde_json::from_value(json!("Movies/HD"));
        assert!(result.is_err());
    }
}
