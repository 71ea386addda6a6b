//! Field mapping tables between local configuration and remote resources.
//!
//! A mapping table is a plain `Vec<RemoteMapEntry>` built per resource
//! construction; the projector and change detector are pure functions of
//! (mapping, data). Entries that need call-time context (for example a tag
//! label to id lookup) capture it in their codec closures when the table
//! is built.

use crate::error::Result;
use serde_json::Value;

/// Codec applied when translating a value between its local and remote
/// representations.
pub type Codec = Box<dyn Fn(&Value) -> Result<Value>>;

/// How two local-shaped values are compared by the change detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Compare {
    /// Structural equality, with numbers compared by numeric value
    /// (`1` equals `1.0`).
    Exact,
    /// Order-independent array comparison, for set-valued fields.
    Unordered,
    /// Numeric comparison rounded to the declared number of decimals,
    /// for floating-point fields the remote side may round.
    Approx {
        /// Number of decimal places considered significant
        decimals: u32,
    },
}

impl Compare {
    /// Compare two values under this mode.
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match self {
            Self::Exact => exact_equal(a, b),
            Self::Unordered => match (a, b) {
                (Value::Array(xs), Value::Array(ys)) => {
                    if xs.len() != ys.len() {
                        return false;
                    }
                    let mut xs: Vec<String> = xs.iter().map(|v| v.to_string()).collect();
                    let mut ys: Vec<String> = ys.iter().map(|v| v.to_string()).collect();
                    xs.sort();
                    ys.sort();
                    xs == ys
                }
                _ => exact_equal(a, b),
            },
            Self::Approx { decimals } => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => {
                    let scale = 10f64.powi(*decimals as i32);
                    (x * scale).round() == (y * scale).round()
                }
                _ => exact_equal(a, b),
            },
        }
    }
}

/// Structural equality that compares numbers by numeric value, so an
/// integer sent by the remote side matches a float declared locally.
fn exact_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| exact_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| exact_equal(x, y)))
        }
        _ => a == b,
    }
}

/// One (local field, remote field, options) triple of a mapping table.
///
/// By default the remote value is a top-level resource attribute and is
/// carried through both directions unmodified. Builder methods select the
/// nested `{name, value}` field-list representation, attach codecs, supply
/// defaults for absent remote values, and pick a comparison mode.
pub struct RemoteMapEntry {
    /// Local (configuration) field name
    pub local: &'static str,
    /// Remote (API resource) attribute or field name
    pub remote: &'static str,
    /// Remote value lives in the resource's `fields` list rather than as a
    /// top-level attribute
    pub is_field: bool,
    /// Value substituted when decoding and the remote side omits the field
    pub field_default: Option<Value>,
    /// Comparison mode used by the change detector
    pub compare: Compare,
    encoder: Option<Codec>,
    decoder: Option<Codec>,
}

impl RemoteMapEntry {
    /// Map a local field to a top-level remote attribute.
    pub fn new(local: &'static str, remote: &'static str) -> Self {
        Self {
            local,
            remote,
            is_field: false,
            field_default: None,
            compare: Compare::Exact,
            encoder: None,
            decoder: None,
        }
    }

    /// Store the remote value inside the resource's `{name, value}` field
    /// list instead of as a top-level attribute.
    pub fn field(mut self) -> Self {
        self.is_field = true;
        self
    }

    /// Substitute this value when decoding and the remote field is absent.
    pub fn field_default(mut self, value: impl Into<Value>) -> Self {
        self.field_default = Some(value.into());
        self
    }

    /// Transform the local value into its remote representation.
    pub fn encoder(mut self, f: impl Fn(&Value) -> Result<Value> + 'static) -> Self {
        self.encoder = Some(Box::new(f));
        self
    }

    /// Transform the remote value into its local representation.
    pub fn decoder(mut self, f: impl Fn(&Value) -> Result<Value> + 'static) -> Self {
        self.decoder = Some(Box::new(f));
        self
    }

    /// Select the comparison mode used by the change detector.
    pub fn compare(mut self, compare: Compare) -> Self {
        self.compare = compare;
        self
    }

    /// Apply the encoder, or pass the value through unchanged.
    pub fn encode(&self, value: &Value) -> Result<Value> {
        match &self.encoder {
            Some(f) => f(value),
            None => Ok(value.clone()),
        }
    }

    /// Apply the decoder, or pass the value through unchanged.
    pub fn decode(&self, value: &Value) -> Result<Value> {
        match &self.decoder {
            Some(f) => f(value),
            None => Ok(value.clone()),
        }
    }
}

impl std::fmt::Debug for RemoteMapEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMapEntry")
            .field("local", &self.local)
            .field("remote", &self.remote)
            .field("is_field", &self.is_field)
            .field("field_default", &self.field_default)
            .field("compare", &self.compare)
            .finish_non_exhaustive()
    }
}
