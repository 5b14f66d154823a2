//! Conversion of raw caller input into validated input.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ValidationError, ValidationResult};
use crate::schema::{FieldType, ParameterSchema};
use crate::ValidatedInput;

const ROOT_PATH: &str = "$";

/// Policy for input keys the schema does not declare.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Reject unknown keys with [`ValidationError::UnknownField`].
    #[default]
    Strict,
    /// Silently drop unknown keys.
    Lenient,
}

impl Display for Strictness {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::Lenient => f.write_str("lenient"),
        }
    }
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown strictness `{other}`, expected strict or lenient")),
        }
    }
}

pub(crate) fn validate_root(
    schema: &ParameterSchema,
    raw: &Value,
    strictness: Strictness,
) -> ValidationResult<ValidatedInput> {
    let Value::Object(map) = raw else {
        return Err(ValidationError::TypeMismatch {
            path: ROOT_PATH.into(),
            expected: "object".into(),
            found: json_type(raw),
        });
    };
    validate_object(schema, map, None, strictness).map(ValidatedInput::from_map)
}

fn validate_object(
    schema: &ParameterSchema,
    raw: &Map<String, Value>,
    prefix: Option<&str>,
    strictness: Strictness,
) -> ValidationResult<Map<String, Value>> {
    let mut validated = Map::new();

    for field in schema.fields() {
        let path = join(prefix, field.name());
        match raw.get(field.name()).filter(|value| !value.is_null()) {
            Some(value) => {
                let converted = convert(field.ty(), value, &path, strictness)?;
                validated.insert(field.name().to_owned(), converted);
            }
            None if field.is_required() => {
                return Err(ValidationError::MissingField { path });
            }
            None => {
                if let Some(default) = field.default_value() {
                    validated.insert(field.name().to_owned(), default.clone());
                }
            }
        }
    }

    let mut unknown: Vec<&String> = raw
        .keys()
        .filter(|key| schema.field(key).is_none())
        .collect();
    unknown.sort();

    if let Some(first) = unknown.first() {
        match strictness {
            Strictness::Strict => {
                return Err(ValidationError::UnknownField {
                    path: join(prefix, first),
                });
            }
            Strictness::Lenient => {
                debug!(dropped = ?unknown, "dropping undeclared input fields");
            }
        }
    }

    Ok(validated)
}

pub(crate) fn convert(
    ty: &FieldType,
    value: &Value,
    path: &str,
    strictness: Strictness,
) -> ValidationResult<Value> {
    let mismatch = || ValidationError::TypeMismatch {
        path: path.to_owned(),
        expected: ty.label(),
        found: json_type(value),
    };

    match ty {
        FieldType::String if value.is_string() => Ok(value.clone()),
        FieldType::Number if value.is_number() => Ok(value.clone()),
        FieldType::Boolean if value.is_boolean() => Ok(value.clone()),
        FieldType::Integer => integer(value).ok_or_else(mismatch),
        FieldType::Enum(allowed) => {
            let text = value.as_str().ok_or_else(mismatch)?;
            if allowed.iter().any(|candidate| candidate == text) {
                Ok(value.clone())
            } else {
                Err(ValidationError::InvalidEnumValue {
                    path: path.to_owned(),
                    value: text.to_owned(),
                    allowed: allowed.clone(),
                })
            }
        }
        FieldType::List(item) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .enumerate()
                .map(|(index, entry)| convert(item, entry, &format!("{path}[{index}]"), strictness))
                .collect::<ValidationResult<Vec<_>>>()
                .map(Value::Array)
        }
        FieldType::Object(schema) => {
            let map = value.as_object().ok_or_else(mismatch)?;
            validate_object(schema, map, Some(path), strictness).map(Value::Object)
        }
        FieldType::String | FieldType::Number | FieldType::Boolean => Err(mismatch()),
    }
}

// 2^63; `i64::MAX as f64` rounds up to this value.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

#[allow(clippy::cast_possible_truncation)]
fn integer(value: &Value) -> Option<Value> {
    if value.is_i64() || value.is_u64() {
        return Some(value.clone());
    }
    let float = value.as_f64()?;
    let in_range = float >= -I64_UPPER_BOUND && float < I64_UPPER_BOUND;
    (float.is_finite() && float.fract() == 0.0 && in_range).then(|| Value::from(float as i64))
}

fn join(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{name}"),
        None => name.to_owned(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
