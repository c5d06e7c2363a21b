// Feed record model.
// Records are structural: a required id plus whatever fields the server sends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single feed item.
///
/// Only `id` is required; every other field the server sends is kept
/// verbatim in `fields`, so new server fields never break
/// deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier assigned by the server. Numeric or string.
    pub id: Value,
    /// All remaining fields, untouched.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Look up a display field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Key for list rendering, derived from (id, position).
    ///
    /// Ids are not guaranteed unique across pages when the upstream
    /// feed repeats items; the position disambiguates.
    pub fn list_key(&self, position: usize) -> String {
        match &self.id {
            Value::String(s) => format!("{s}-{position}"),
            other => format!("{other}-{position}"),
        }
    }
}
