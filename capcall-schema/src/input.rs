//! Input that has passed schema validation.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Caller input after validation, with defaults applied.
///
/// Only the validator constructs this type, so holding one is proof that the
/// payload satisfied the tool's schema.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedInput {
    fields: Map<String, Value>,
}

impl ValidatedInput {
    pub(crate) fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns the raw value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns a string field.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns an integer field.
    #[must_use]
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Returns a numeric field.
    #[must_use]
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Returns a boolean field.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Returns `true` if the field is present after defaults were applied.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Borrows the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Converts into a JSON object value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Deserializes the input into a typed parameter struct.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when the struct shape disagrees with the
    /// schema the input was validated against.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}
