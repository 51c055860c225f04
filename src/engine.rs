//! Request validation pipeline.
//!
//! Ties the extractors, coercer and constraint validator together behind
//! one call: transport checks first (any failure there is fatal and maps
//! to its own status code), then every declared parameter is extracted,
//! coerced and validated in source order with failures aggregated into a
//! single 422 document.

use crate::coerce::{coerce, CoercionMode};
use crate::constraints::validate;
use crate::errors::{
    ErrorKind, Loc, LocSegment, RequestError, ValidationError, ValidationErrorSet,
};
use crate::extract::{
    parse_json_body, parse_multipart_body, parse_query, parse_urlencoded_body, QueryPairs,
    RequestParts,
};
use crate::schema::{CompiledSchema, ParameterSpec, SchemaType, Source};
use crate::value::Value;
use http::StatusCode;
use indexmap::IndexMap;
use tracing::debug;

/// Transport-level limits enforced before any schema work happens.
#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    pub max_body_bytes: usize,
    pub max_headers_bytes: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        EngineLimits {
            max_body_bytes: 10 * 1024 * 1024,
            max_headers_bytes: 8 * 1024,
        }
    }
}

/// Why a request was rejected.
#[derive(Debug)]
pub enum RequestFailure {
    /// Field-level failures, rendered as one 422 document.
    Validation(ValidationErrorSet),
    /// Transport framing problem with its own status code.
    Transport(RequestError),
}

impl RequestFailure {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestFailure::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RequestFailure::Transport(err) => err.status(),
        }
    }

    /// JSON response body for this failure.
    pub fn to_body(&self) -> serde_json::Value {
        match self {
            RequestFailure::Validation(set) => set.to_document(),
            RequestFailure::Transport(err) => err.to_body(),
        }
    }
}

impl From<RequestError> for RequestFailure {
    fn from(err: RequestError) -> Self {
        RequestFailure::Transport(err)
    }
}

/// Validates requests against one route's compiled schema.
///
/// Cheap to clone and safe to share across threads; all compiled state is
/// behind the schema's `Arc`.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    schema: CompiledSchema,
    limits: EngineLimits,
}

impl RequestValidator {
    pub fn new(schema: CompiledSchema) -> Self {
        RequestValidator {
            schema,
            limits: EngineLimits::default(),
        }
    }

    pub fn with_limits(schema: CompiledSchema, limits: EngineLimits) -> Self {
        RequestValidator { schema, limits }
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    /// Run the full pipeline over one request.
    ///
    /// On success the returned object maps every supplied (or defaulted)
    /// parameter name to its typed value, with the body under its declared
    /// parameter name.
    pub fn validate_request(&self, parts: &RequestParts) -> Result<Value, RequestFailure> {
        self.check_limits(parts)?;

        let body = self.decode_body(parts)?;
        let query = parts
            .raw_query
            .as_deref()
            .map(parse_query)
            .unwrap_or_default();
        let cookies = parts.cookies();

        let mut errors = ValidationErrorSet::new();
        let mut out: IndexMap<String, Value> = IndexMap::new();

        for param in self.schema.params() {
            let (raw, mode) = match param.source {
                Source::Path => (
                    parts
                        .path_params
                        .get(&param.name)
                        .map(|v| serde_json::Value::String(v.clone())),
                    CoercionMode::Text,
                ),
                Source::Query => (query_raw(&query, param), CoercionMode::Text),
                Source::Header => (
                    parts
                        .headers
                        .get(&param.name.to_ascii_lowercase())
                        .map(|v| serde_json::Value::String(v.clone())),
                    CoercionMode::Text,
                ),
                Source::Cookie => (
                    cookies
                        .get(&param.name)
                        .map(|v| serde_json::Value::String(v.clone())),
                    CoercionMode::Text,
                ),
                Source::Body => match &body {
                    Some((value, mode)) => (Some(value.clone()), *mode),
                    None => (None, CoercionMode::Json),
                },
            };
            let loc = param_loc(param);

            let Some(raw) = raw else {
                if let Some(default) = &param.default {
                    out.insert(param.name.clone(), Value::from_json(default));
                } else if param.required {
                    errors.push(ValidationError::new(
                        loc,
                        ErrorKind::Missing,
                        "Field required",
                        serde_json::Value::Null,
                    ));
                }
                continue;
            };

            if let Some(value) = coerce(&param.schema, &raw, &loc, mode, &mut errors) {
                validate(&param.schema, &value, &loc, &mut errors);
                out.insert(param.name.clone(), value);
            }
        }

        if errors.is_empty() {
            debug!(param_count = out.len(), "Request validated");
            Ok(Value::Object(out))
        } else {
            debug!(error_count = errors.len(), "Request validation failed");
            Err(RequestFailure::Validation(errors))
        }
    }

    fn check_limits(&self, parts: &RequestParts) -> Result<(), RequestError> {
        if parts.headers_size() > self.limits.max_headers_bytes {
            return Err(RequestError::HeadersTooLarge {
                limit: self.limits.max_headers_bytes,
            });
        }
        if parts.body.len() > self.limits.max_body_bytes {
            return Err(RequestError::BodyTooLarge {
                limit: self.limits.max_body_bytes,
            });
        }
        if let Some(declared) = parts.content_length() {
            if declared != parts.body.len() {
                return Err(RequestError::ContentLengthMismatch {
                    declared,
                    actual: parts.body.len(),
                });
            }
        }
        Ok(())
    }

    /// Decode the request body per its media type. Returns `None` when the
    /// route declares no body parameter or the body is empty.
    fn decode_body(
        &self,
        parts: &RequestParts,
    ) -> Result<Option<(serde_json::Value, CoercionMode)>, RequestError> {
        if self.schema.body_param().is_none() || parts.body.is_empty() {
            return Ok(None);
        }

        let media_type = parts.content_type();
        match &media_type {
            // No Content-Type on a non-empty body is treated as JSON
            None => Ok(Some((parse_json_body(&parts.body)?, CoercionMode::Json))),
            Some(mt) if mt.is_json() => {
                if let Some(charset) = mt.charset() {
                    if !charset.eq_ignore_ascii_case("utf-8") {
                        return Err(RequestError::UnsupportedCharset(
                            charset.to_ascii_lowercase(),
                        ));
                    }
                }
                Ok(Some((parse_json_body(&parts.body)?, CoercionMode::Json)))
            }
            Some(mt) if mt.is_form_urlencoded() => Ok(Some((
                parse_urlencoded_body(&parts.body),
                CoercionMode::Text,
            ))),
            Some(mt) if mt.is_multipart() => {
                let boundary = mt.boundary().ok_or(RequestError::MissingBoundary)?;
                Ok(Some((
                    parse_multipart_body(&parts.body, boundary)?,
                    CoercionMode::Text,
                )))
            }
            Some(_) => Err(RequestError::UnsupportedMediaType {
                expected: "application/json",
            }),
        }
    }
}

fn param_loc(param: &ParameterSpec) -> Loc {
    let mut loc = Loc::new();
    match param.source {
        Source::Path => loc.push(LocSegment::Path),
        Source::Query => loc.push(LocSegment::Query),
        Source::Header => loc.push(LocSegment::Header),
        Source::Cookie => loc.push(LocSegment::Cookie),
        Source::Body => {
            loc.push(LocSegment::Body);
            return loc;
        }
    }
    loc.push(LocSegment::Field(param.name.clone()));
    loc
}

/// Repeated query keys accumulate into an array for array-typed params;
/// otherwise the last value wins, matching common server behavior.
fn query_raw(query: &QueryPairs, param: &ParameterSpec) -> Option<serde_json::Value> {
    let values = query.get_all(&param.name);
    if values.is_empty() {
        return None;
    }
    if matches!(param.schema.ty, SchemaType::Array(_)) && values.len() > 1 {
        return Some(serde_json::Value::Array(
            values
                .into_iter()
                .map(|v| serde_json::Value::String(v.to_string()))
                .collect(),
        ));
    }
    values
        .last()
        .map(|v| serde_json::Value::String((*v).to_string()))
}
