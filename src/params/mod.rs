//! Field specifications: the declarative half of a handler parameter.
//!
//! A [`FieldSpec`] says where a value comes from ([`ParamSource`]), what it is called
//! on the wire, whether it is required, and which constraints it must satisfy. It is
//! created once at route registration and never mutated per request.

mod types;

pub use types::*;
