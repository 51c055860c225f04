//! # Spikard Validation
//!
//! Schema-driven HTTP request validation and type coercion, shared by every
//! Spikard language binding.
//!
//! ## Overview
//!
//! A route declares its parameters once, as a JSON-Schema-compatible
//! document with a `source` keyword per parameter (`path`, `query`,
//! `header`, `cookie` or `body`). The document compiles into an immutable
//! [`schema::CompiledSchema`]; every request against that route then runs
//! through a single pipeline that extracts raw values, coerces them to
//! their declared types, checks constraints and either returns one fully
//! typed value tree or one error document listing every failing field.
//!
//! ## Architecture
//!
//! - **[`schema`]** - Wire-format compilation into the immutable schema tree
//! - **[`extract`]** - Query, cookie, JSON, urlencoded and multipart decoding
//! - **[`coerce`]** - Schema-directed typing of raw values
//! - **[`constraints`]** - Length, range, pattern, enum and composition checks
//! - **[`format`]** - Stateless string-format validators
//! - **[`engine`]** - The per-request pipeline and transport limits
//! - **[`errors`]** - The cross-binding error taxonomy and 422 document
//! - **[`value`]** - The typed, order-preserving value tree
//!
//! Failures come in two tiers. Transport framing problems (malformed JSON,
//! wrong charset, oversized bodies) are fatal and map to their own status
//! codes. Field-level failures aggregate: one pass reports every invalid
//! field, ordered by source (path, query, header, cookie, body), then by
//! declaration order, then depth-first.
//!
//! ## Quick Start
//!
//! ```
//! use spikard_validation::engine::RequestValidator;
//! use spikard_validation::extract::RequestParts;
//! use spikard_validation::schema::compile;
//!
//! let schema = compile(&serde_json::json!({
//!     "type": "object",
//!     "properties": {
//!         "limit": {"type": "integer", "source": "query", "minimum": 1, "default": 10}
//!     }
//! })).expect("schema compiles");
//!
//! let validator = RequestValidator::new(schema);
//! let mut parts = RequestParts::default();
//! parts.raw_query = Some("limit=25".to_string());
//!
//! let typed = validator.validate_request(&parts).expect("valid request");
//! assert_eq!(typed.to_json()["limit"], 25);
//! ```

pub mod coerce;
pub mod constraints;
pub mod engine;
pub mod errors;
pub mod extract;
pub mod format;
pub mod schema;
pub mod value;

pub use engine::{EngineLimits, RequestFailure, RequestValidator};
pub use errors::{
    ErrorKind, Loc, LocSegment, RequestError, SchemaError, ValidationError, ValidationErrorSet,
};
pub use extract::RequestParts;
pub use schema::{compile, CompiledSchema};
pub use value::Value;
