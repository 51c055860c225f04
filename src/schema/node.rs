use crate::format::Format;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::Arc;

/// Which part of the request a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Source::Path => "path",
            Source::Query => "query",
            Source::Header => "header",
            Source::Cookie => "cookie",
            Source::Body => "body",
        };
        write!(f, "{s}")
    }
}

/// How a single query-string value decomposes into array elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Separator {
    #[default]
    Csv,
    Space,
    Pipe,
    Semicolon,
}

impl Separator {
    pub fn as_char(self) -> char {
        match self {
            Separator::Csv => ',',
            Separator::Space => ' ',
            Separator::Pipe => '|',
            Separator::Semicolon => ';',
        }
    }
}

/// A `pattern` constraint with its pre-compiled regex.
///
/// Compiled once at schema-compilation time; the source text is kept for
/// error messages and context payloads.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub source: String,
    pub regex: Regex,
}

/// Inclusive or exclusive numeric bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub exclusive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StringSchema {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<CompiledPattern>,
    pub format: Option<Format>,
}

#[derive(Debug, Clone, Default)]
pub struct NumberSchema {
    pub minimum: Option<Bound>,
    pub maximum: Option<Bound>,
    pub multiple_of: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ArraySchema {
    pub items: Option<Box<SchemaNode>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: bool,
    pub separator: Option<Separator>,
}

/// `additionalProperties` keyword: allow anything (default), forbid
/// undeclared keys, or validate them against a schema.
#[derive(Debug, Clone, Default)]
pub enum AdditionalProperties {
    #[default]
    Allow,
    Deny,
    Schema(Box<SchemaNode>),
}

#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    /// Declaration-ordered property map; iteration order drives error order.
    pub properties: IndexMap<String, SchemaNode>,
    pub required: Vec<String>,
    pub additional: AdditionalProperties,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
    /// If a named property is present, its dependents must be present too.
    pub dependencies: IndexMap<String, Vec<String>>,
}

/// Per-type constraint payload of a schema node.
#[derive(Debug, Clone)]
pub enum SchemaType {
    Object(ObjectSchema),
    Array(ArraySchema),
    String(StringSchema),
    Integer(NumberSchema),
    Number(NumberSchema),
    Boolean,
    Null,
    /// No `type` keyword: accepts any value, constrained only by the shared
    /// keywords and composition.
    Any,
}

/// Composition keyword over child schemas.
#[derive(Debug, Clone)]
pub enum Composition {
    OneOf(Vec<SchemaNode>),
    AnyOf(Vec<SchemaNode>),
    AllOf(Vec<SchemaNode>),
    Not(Box<SchemaNode>),
}

/// One node of the compiled validation tree. Immutable after compilation
/// and shared read-only across concurrent validation calls.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub ty: SchemaType,
    pub nullable: bool,
    pub default: Option<serde_json::Value>,
    pub const_value: Option<serde_json::Value>,
    pub enum_values: Option<Vec<serde_json::Value>>,
    pub composition: Vec<Composition>,
}

impl SchemaNode {
    pub fn any() -> SchemaNode {
        SchemaNode {
            ty: SchemaType::Any,
            nullable: false,
            default: None,
            const_value: None,
            enum_values: None,
            composition: Vec::new(),
        }
    }

    /// Human-readable declared type, used in type-mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self.ty {
            SchemaType::Object(_) => "object",
            SchemaType::Array(_) => "array",
            SchemaType::String(_) => "string",
            SchemaType::Integer(_) => "integer",
            SchemaType::Number(_) => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Null => "null",
            SchemaType::Any => "value",
        }
    }
}

/// Compiled description of one request parameter.
///
/// Built once at route-registration time and owned by the route table;
/// each validation call borrows it read-only.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub source: Source,
    pub schema: SchemaNode,
    pub required: bool,
    pub default: Option<serde_json::Value>,
}

/// Opaque handle over a route's compiled parameter specs.
///
/// Cheap to clone (`Arc`-shared) and safe to use from arbitrarily many
/// concurrent validation calls without locking.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    inner: Arc<CompiledSchemaInner>,
}

#[derive(Debug)]
pub(crate) struct CompiledSchemaInner {
    /// Parameter specs in source order (path, query, header, cookie, body),
    /// declaration order within each source.
    pub params: Vec<ParameterSpec>,
}

impl CompiledSchema {
    pub(crate) fn from_params(params: Vec<ParameterSpec>) -> CompiledSchema {
        CompiledSchema {
            inner: Arc::new(CompiledSchemaInner { params }),
        }
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.inner.params
    }

    pub fn body_param(&self) -> Option<&ParameterSpec> {
        self.inner.params.iter().find(|p| p.source == Source::Body)
    }
}
