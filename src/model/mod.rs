//! # Model Module
//!
//! Compiled field models and the schema plumbing behind them.
//!
//! A [`ModelField`] pairs a named [`FieldSpec`](crate::params::FieldSpec) with the JSON
//! schema of the parameter's declared type. Compiling one:
//!
//! 1. Expands `$ref`s against the handler's [`SchemaNamespace`]
//! 2. Folds the field spec's constraints into the schema
//! 3. Classifies the wire [`FieldShape`] (scalar, sequence, object, file)
//! 4. Compiles the validator through the shared
//!    [`ValidatorCache`](crate::validator_cache::ValidatorCache)
//!
//! Transport values arrive as strings and are coerced with [`decode_param_value`]
//! before they are validated.

mod decode;
mod field;
mod schema;

pub use decode::{decode_param_value, decode_param_values};
pub use field::ModelField;
pub use schema::{
    expand_composite, expand_schema_refs, is_object, is_scalar, is_scalar_sequence,
    is_sequence, schema_type, FieldShape, SchemaNamespace,
};
