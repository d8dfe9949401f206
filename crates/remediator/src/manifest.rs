//! Manifest sanitizing.
//!
//! Server-managed and derived fields are noise to a reader and poison to a
//! patch author, so they are dropped at every depth before a workload is
//! shown to the oracle.

use serde::Serialize;
use serde_json::{Map, Value};

/// Object keys removed wherever they appear.
pub const STRIPPED_FIELDS: [&str; 7] = [
    "status",
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "generation",
    "managedFields",
    "annotations",
];

/// Deep copy of `value` without any [`STRIPPED_FIELDS`] key.
///
/// Scalars (and a scalar root) pass through unchanged. Sanitizing twice is
/// the same as sanitizing once.
#[must_use]
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !STRIPPED_FIELDS.contains(&key.as_str()))
                .map(|(key, nested)| (key.clone(), sanitize(nested)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        scalar => scalar.clone(),
    }
}

/// A workload definition with server-managed fields removed.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedManifest(Value);

impl SanitizedManifest {
    /// Serialize any Kubernetes object and sanitize the result.
    pub fn from_resource<K: Serialize>(resource: &K) -> Result<Self, serde_json::Error> {
        Ok(Self::from_value(&serde_json::to_value(resource)?))
    }

    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self(sanitize(value))
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// YAML rendering, as handed to the oracle.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.0)
    }
}
