//! Declarative parameter schemas and the validator that guards executors.
//!
//! A [`ParameterSchema`] describes the fields a tool accepts. Raw caller input
//! is checked against it with [`ParameterSchema::validate`], which either
//! returns a fully defaulted [`ValidatedInput`] or a [`ValidationError`]; no
//! partially validated value ever escapes.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod input;
mod schema;
mod validate;

pub use error::{SchemaError, SchemaResult, ValidationError, ValidationResult};
pub use input::ValidatedInput;
pub use schema::{FieldSpec, FieldType, ParameterSchema, ParameterSchemaBuilder};
pub use validate::Strictness;
