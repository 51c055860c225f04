//! Error taxonomy shared by every language binding.
//!
//! Failures come in two tiers. Field-level validation errors are collected
//! into a [`ValidationErrorSet`] and rendered as one 422 document. Transport
//! framing problems ([`RequestError`]) are fatal to the request and carry
//! their own status, produced before schema validation starts.

use http::StatusCode;
use serde::Serialize;
use smallvec::SmallVec;

/// One step of the path from a request source down to the failing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocSegment {
    Body,
    Path,
    Query,
    Header,
    Cookie,
    Field(String),
    Index(usize),
}

impl Serialize for LocSegment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LocSegment::Body => serializer.serialize_str("body"),
            LocSegment::Path => serializer.serialize_str("path"),
            LocSegment::Query => serializer.serialize_str("query"),
            LocSegment::Header => serializer.serialize_str("header"),
            LocSegment::Cookie => serializer.serialize_str("cookie"),
            LocSegment::Field(name) => serializer.serialize_str(name),
            LocSegment::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

/// JSON-Pointer-like location path, e.g. `["body", "profile", "email"]`.
///
/// Most paths are a source segment plus one or two fields; the inline
/// capacity keeps the common case off the heap.
pub type Loc = SmallVec<[LocSegment; 4]>;

/// Stable error kinds. The serialized names are part of the cross-binding
/// contract and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Missing,
    IntParsing,
    FloatParsing,
    BoolParsing,
    UuidParsing,
    DatetimeParsing,
    TypeError,
    StringTooShort,
    StringTooLong,
    StringPatternMismatch,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    TooShort,
    TooLong,
    Enum,
    ValidationError,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub loc: Loc,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(rename = "msg")]
    pub message: String,
    /// Echo of the offending input value.
    pub input: serde_json::Value,
    /// Constraint context, e.g. `{"min_length": 3}` or `{"gt": 0}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx: Option<serde_json::Value>,
}

impl ValidationError {
    pub fn new(
        loc: Loc,
        kind: ErrorKind,
        message: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        ValidationError {
            loc,
            kind,
            message: message.into(),
            input,
            ctx: None,
        }
    }

    pub fn with_ctx(mut self, ctx: serde_json::Value) -> Self {
        self.ctx = Some(ctx);
        self
    }
}

/// Ordered collection of every field-level failure in one validation pass.
///
/// Appended to while the pass runs, immutable once returned. Ordering is
/// stable and reproducible for identical inputs: source order first, then
/// declaration order, then depth-first traversal order.
#[derive(Debug, Clone, Default)]
pub struct ValidationErrorSet {
    errors: Vec<ValidationError>,
}

impl ValidationErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrorSet) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Render the fixed 422 response document.
    pub fn to_document(&self) -> serde_json::Value {
        let noun = if self.errors.len() == 1 {
            "validation error"
        } else {
            "validation errors"
        };
        serde_json::json!({
            "detail": format!("{} {} in request", self.errors.len(), noun),
            "status": 422,
            "title": "Request Validation Failed",
            "type": "https://spikard.dev/errors/validation-error",
            "errors": self.errors,
        })
    }
}

impl std::fmt::Display for ValidationErrorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation failed: {} errors", self.errors.len())
    }
}

impl std::error::Error for ValidationErrorSet {}

/// Pre-validation (transport/framing) failure. Fatal to the request and
/// never aggregated with field errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid JSON: {0}")]
    MalformedJson(String),
    #[error("Request body exceeds maximum nesting depth of {0}")]
    NestingTooDeep(usize),
    #[error("Content-Length header ({declared}) does not match body size ({actual})")]
    ContentLengthMismatch { declared: usize, actual: usize },
    #[error("Missing boundary parameter in multipart/form-data content type")]
    MissingBoundary,
    #[error("Unsupported Media Type. Expected {expected}")]
    UnsupportedMediaType { expected: &'static str },
    #[error("Unsupported charset '{0}' for JSON. Only UTF-8 is supported.")]
    UnsupportedCharset(String),
    #[error("Request body exceeds maximum size of {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("Request headers exceed maximum size of {limit} bytes")]
    HeadersTooLarge { limit: usize },
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::MalformedJson(_)
            | RequestError::NestingTooDeep(_)
            | RequestError::ContentLengthMismatch { .. }
            | RequestError::MissingBoundary => StatusCode::BAD_REQUEST,
            RequestError::UnsupportedMediaType { .. } | RequestError::UnsupportedCharset(_) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            RequestError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::HeadersTooLarge { .. } => {
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
            }
        }
    }

    /// Status-specific error body, e.g. `{"error": "Invalid JSON: ..."}`.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

/// Schema compilation failure. Programmer error: reported at
/// route-registration time, before any request is served.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown schema type '{0}'")]
    UnknownType(String),
    #[error("invalid pattern '{pattern}' for '{field}': {source}")]
    InvalidPattern {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("schema nesting exceeds maximum depth of {0}")]
    TooDeep(usize),
    #[error("schema for '{0}' must be a JSON object")]
    NotAnObject(String),
    #[error("parameter '{0}' is missing a 'source' keyword")]
    MissingSource(String),
    #[error("invalid source '{value}' for parameter '{field}'")]
    InvalidSource { field: String, value: String },
    #[error("invalid separator '{value}' for '{field}' (expected csv, space, pipe or semicolon)")]
    InvalidSeparator { field: String, value: String },
    #[error("keyword '{keyword}' on '{field}' has an invalid value")]
    InvalidKeyword { field: String, keyword: &'static str },
    #[error("duplicate body parameter '{0}' (at most one parameter may have source 'body')")]
    DuplicateBody(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_error_kind_wire_names() {
        let cases = [
            (ErrorKind::Missing, "missing"),
            (ErrorKind::IntParsing, "int_parsing"),
            (ErrorKind::StringTooShort, "string_too_short"),
            (ErrorKind::GreaterThanEqual, "greater_than_equal"),
            (ErrorKind::Enum, "enum"),
            (ErrorKind::ValidationError, "validation_error"),
            (ErrorKind::TypeError, "type_error"),
        ];
        for (kind, expected) in cases {
            assert_eq!(serde_json::to_value(kind).unwrap(), expected);
        }
    }

    #[test]
    fn test_document_pluralization() {
        let mut set = ValidationErrorSet::new();
        set.push(ValidationError::new(
            smallvec![LocSegment::Query, LocSegment::Field("q".into())],
            ErrorKind::Missing,
            "Field required",
            serde_json::Value::Null,
        ));
        let doc = set.to_document();
        assert_eq!(doc["detail"], "1 validation error in request");
        assert_eq!(doc["status"], 422);
        assert_eq!(doc["title"], "Request Validation Failed");

        set.push(ValidationError::new(
            smallvec![LocSegment::Body, LocSegment::Field("name".into())],
            ErrorKind::StringTooShort,
            "String should have at least 3 characters",
            serde_json::json!("ab"),
        ));
        assert_eq!(set.to_document()["detail"], "2 validation errors in request");
    }

    #[test]
    fn test_error_serialization_shape() {
        let err = ValidationError::new(
            smallvec![
                LocSegment::Body,
                LocSegment::Field("items".into()),
                LocSegment::Index(2)
            ],
            ErrorKind::IntParsing,
            "Input should be a valid integer, unable to parse string as an integer",
            serde_json::json!("abc"),
        )
        .with_ctx(serde_json::json!({"hint": "x"}));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["loc"], serde_json::json!(["body", "items", 2]));
        assert_eq!(json["type"], "int_parsing");
        assert_eq!(json["input"], "abc");
        assert!(json.get("msg").is_some());
    }

    #[test]
    fn test_request_error_statuses() {
        assert_eq!(RequestError::MalformedJson("x".into()).status(), 400);
        assert_eq!(RequestError::NestingTooDeep(32).status(), 400);
        assert_eq!(
            RequestError::UnsupportedCharset("utf-16".into()).status(),
            415
        );
        assert_eq!(RequestError::BodyTooLarge { limit: 1024 }.status(), 413);
        assert_eq!(RequestError::HeadersTooLarge { limit: 8192 }.status(), 431);
    }

    #[test]
    fn test_nesting_error_message() {
        let err = RequestError::NestingTooDeep(32);
        assert_eq!(
            err.to_body()["error"],
            "Request body exceeds maximum nesting depth of 32"
        );
    }
}
