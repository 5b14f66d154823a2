//! Declarative description of the input a tool accepts.

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};

use crate::error::{SchemaError, SchemaResult};
use crate::validate::{self, Strictness};
use crate::{ValidatedInput, ValidationResult};

/// Semantic type of a single parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// Whole number; floats without a fractional part are accepted.
    Integer,
    /// Any JSON number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// String restricted to the listed values.
    Enum(Vec<String>),
    /// Homogeneous list of scalar or enum items.
    List(Box<FieldType>),
    /// Nested object validated against its own schema.
    Object(ParameterSchema),
}

impl FieldType {
    /// Shorthand for an enumerated type.
    #[must_use]
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }

    /// Shorthand for a list type.
    #[must_use]
    pub fn list_of(item: FieldType) -> Self {
        Self::List(Box::new(item))
    }

    /// Human-readable label used in error messages.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::String => "string".into(),
            Self::Integer => "integer".into(),
            Self::Number => "number".into(),
            Self::Boolean => "boolean".into(),
            Self::Enum(_) => "enum".into(),
            Self::List(item) => format!("list<{}>", item.label()),
            Self::Object(_) => "object".into(),
        }
    }

    const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::String | Self::Integer | Self::Number | Self::Boolean | Self::Enum(_)
        )
    }

    fn to_json_schema(&self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Integer => json!({ "type": "integer" }),
            Self::Number => json!({ "type": "number" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Enum(values) => json!({ "type": "string", "enum": values }),
            Self::List(item) => json!({ "type": "array", "items": item.to_json_schema() }),
            Self::Object(schema) => schema.to_json_schema(),
        }
    }
}

/// Declaration of one named parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    name: String,
    ty: FieldType,
    required: bool,
    default: Option<Value>,
    description: String,
}

impl FieldSpec {
    /// Declares a field the caller must supply.
    #[must_use]
    pub fn required(name: impl Into<String>, ty: FieldType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            description: description.into(),
        }
    }

    /// Declares a field the caller may omit.
    #[must_use]
    pub fn optional(name: impl Into<String>, ty: FieldType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }

    /// Sets the value applied when an optional field is absent.
    ///
    /// Defaults on required fields are kept for documentation but never
    /// applied: a missing required field is always an error.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    /// Returns `true` when the caller must supply the field.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the default value, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the human-readable purpose of the field.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Ordered set of field declarations describing a tool's input object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSchema {
    fields: Vec<FieldSpec>,
}

impl ParameterSchema {
    /// Starts building a schema.
    #[must_use]
    pub fn builder() -> ParameterSchemaBuilder {
        ParameterSchemaBuilder { fields: Vec::new() }
    }

    /// Schema accepting an empty object.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the declared fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Validates raw caller input against this schema.
    ///
    /// The result is either the complete input with defaults applied or the
    /// first violation found. Fields are checked in declaration order, then
    /// unknown keys in lexical order.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ValidationError`] describing the first violation.
    pub fn validate(&self, raw: &Value, strictness: Strictness) -> ValidationResult<ValidatedInput> {
        validate::validate_root(self, raw, strictness)
    }

    /// Renders the schema as a JSON Schema object for advertising to models.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut property = field.ty.to_json_schema();
            if let Value::Object(entries) = &mut property {
                if !field.description.is_empty() {
                    entries.insert("description".into(), Value::from(field.description.clone()));
                }
                if let Some(default) = &field.default {
                    entries.insert("default".into(), default.clone());
                }
            }
            properties.insert(field.name.clone(), property);
            if field.required {
                required.push(Value::from(field.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Builder for [`ParameterSchema`].
#[derive(Debug)]
pub struct ParameterSchemaBuilder {
    fields: Vec<FieldSpec>,
}

impl ParameterSchemaBuilder {
    /// Appends a field declaration.
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Finalises the schema after checking it for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] for empty or duplicate names, empty enums, lists
    /// of non-scalar items, or defaults that violate their own type.
    pub fn build(self) -> SchemaResult<ParameterSchema> {
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(SchemaError::EmptyFieldName);
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    name: field.name.clone(),
                });
            }
            check_type(&field.name, &field.ty)?;

            if let Some(default) = &field.default {
                validate::convert(&field.ty, default, &field.name, Strictness::Strict).map_err(
                    |source| SchemaError::InvalidDefault {
                        field: field.name.clone(),
                        source,
                    },
                )?;
            }
        }

        Ok(ParameterSchema {
            fields: self.fields,
        })
    }
}

fn check_type(field: &str, ty: &FieldType) -> SchemaResult<()> {
    match ty {
        FieldType::Enum(values) if values.is_empty() => Err(SchemaError::EmptyEnum {
            field: field.to_owned(),
        }),
        FieldType::List(item) if !item.is_scalar() => Err(SchemaError::InvalidListItem {
            field: field.to_owned(),
        }),
        FieldType::List(item) => check_type(field, item),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_fields_are_rejected() {
        let err = ParameterSchema::builder()
            .field(FieldSpec::required("path", FieldType::String, "file"))
            .field(FieldSpec::optional("path", FieldType::String, "again"))
            .build()
            .expect_err("duplicate should fail");
        assert_eq!(err, SchemaError::DuplicateField { name: "path".into() });
    }

    #[test]
    fn empty_names_and_enums_are_rejected() {
        let err = ParameterSchema::builder()
            .field(FieldSpec::required(" ", FieldType::String, ""))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::EmptyFieldName);

        let err = ParameterSchema::builder()
            .field(FieldSpec::required("mode", FieldType::Enum(Vec::new()), ""))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::EmptyEnum { field } if field == "mode"));
    }

    #[test]
    fn nested_lists_are_rejected() {
        let err = ParameterSchema::builder()
            .field(FieldSpec::required(
                "grid",
                FieldType::list_of(FieldType::list_of(FieldType::Integer)),
                "",
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidListItem { .. }));
    }

    #[test]
    fn defaults_must_match_their_type() {
        let err = ParameterSchema::builder()
            .field(FieldSpec::optional("limit", FieldType::Integer, "").with_default("ten"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { field, .. } if field == "limit"));

        let err = ParameterSchema::builder()
            .field(
                FieldSpec::optional("mode", FieldType::one_of(["safe", "dry"]), "")
                    .with_default("fast"),
            )
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidDefault {
                source: crate::ValidationError::InvalidEnumValue { .. },
                ..
            }
        ));
    }

    #[test]
    fn renders_json_schema() {
        let nested = ParameterSchema::builder()
            .field(FieldSpec::required("kind", FieldType::one_of(["file", "dir"]), "entry kind"))
            .build()
            .unwrap();
        let schema = ParameterSchema::builder()
            .field(FieldSpec::required("query", FieldType::String, "search text"))
            .field(FieldSpec::optional("limit", FieldType::Integer, "max hits").with_default(20))
            .field(FieldSpec::optional("tags", FieldType::list_of(FieldType::String), ""))
            .field(FieldSpec::optional("filters", FieldType::Object(nested), "filters"))
            .build()
            .unwrap();

        let rendered = schema.to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["required"], json!(["query"]));
        assert_eq!(rendered["properties"]["limit"]["default"], 20);
        assert_eq!(rendered["properties"]["query"]["description"], "search text");
        assert_eq!(rendered["properties"]["tags"]["items"]["type"], "string");
        assert!(rendered["properties"]["tags"].get("description").is_none());
        assert_eq!(
            rendered["properties"]["filters"]["properties"]["kind"]["enum"],
            json!(["file", "dir"])
        );
    }

    #[test]
    fn field_lookup() {
        let schema = ParameterSchema::builder()
            .field(FieldSpec::optional("verbose", FieldType::Boolean, "chatty").with_default(false))
            .build()
            .unwrap();
        let field = schema.field("verbose").expect("field");
        assert!(!field.is_required());
        assert_eq!(field.default_value(), Some(&Value::Bool(false)));
        assert!(schema.field("missing").is_none());
        assert_eq!(FieldType::list_of(FieldType::Number).label(), "list<number>");
    }
}
