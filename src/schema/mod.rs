//! Compiled schema model.
//!
//! [`compile`] turns a route's wire-format JSON schema into an immutable
//! [`CompiledSchema`] tree that every request against that route validates
//! against. Compilation is the only place regexes are built or keywords are
//! checked; the per-request hot path only walks pre-built structures.

mod compile;
mod node;

pub use compile::{compile, compile_node};
pub use node::{
    AdditionalProperties, ArraySchema, Bound, CompiledPattern, CompiledSchema, Composition,
    NumberSchema, ObjectSchema, ParameterSpec, SchemaNode, SchemaType, Separator, Source,
    StringSchema,
};
