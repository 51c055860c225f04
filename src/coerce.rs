//! Type coercion from untyped extracted values into the typed [`Value`] tree.
//!
//! Coercion runs schema-directed over the raw tree. String-sourced values
//! (path, query, header, cookie and urlencoded form fields) are coerced
//! leniently: `"42"` satisfies an integer field, `"true"` a boolean. JSON
//! bodies get the same string-to-number leniency but keep strict container
//! typing. A coercion failure is terminal for its node: no constraint
//! checks run on a value that never reached its declared type.

use crate::errors::{ErrorKind, Loc, LocSegment, ValidationError, ValidationErrorSet};
use crate::format::{self, Format};
use crate::schema::{
    AdditionalProperties, ArraySchema, ObjectSchema, SchemaNode, SchemaType, Separator,
    StringSchema,
};
use crate::value::{normalize_float, Value};

/// How the raw value reached the engine. String sources get lenient
/// scalar parsing and empty-string boolean handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionMode {
    /// Value came from a JSON body.
    Json,
    /// Value came in as text: path, query, header, cookie or form field.
    Text,
}

/// Coerce `raw` against `node`, appending any failures to `errors`.
///
/// Returns `None` when coercion failed anywhere in the subtree; partial
/// results are never handed to constraint validation.
pub fn coerce(
    node: &SchemaNode,
    raw: &serde_json::Value,
    loc: &Loc,
    mode: CoercionMode,
    errors: &mut ValidationErrorSet,
) -> Option<Value> {
    if raw.is_null() {
        if node.nullable || matches!(node.ty, SchemaType::Null | SchemaType::Any) {
            return Some(Value::Null);
        }
        errors.push(type_error(loc, node.type_name(), raw));
        return None;
    }

    match &node.ty {
        SchemaType::Any => Some(Value::from_json(raw)),
        SchemaType::Null => {
            errors.push(type_error(loc, "null", raw));
            None
        }
        SchemaType::Boolean => coerce_bool(raw, loc, mode, errors),
        SchemaType::Integer(_) => coerce_int(raw, loc, errors),
        SchemaType::Number(_) => coerce_float(raw, loc, errors),
        SchemaType::String(schema) => coerce_string(schema, raw, loc, errors),
        SchemaType::Array(schema) => coerce_array(schema, raw, loc, mode, errors),
        SchemaType::Object(schema) => coerce_object(schema, raw, loc, mode, errors),
    }
}

fn type_error(loc: &Loc, expected: &str, raw: &serde_json::Value) -> ValidationError {
    ValidationError::new(
        loc.clone(),
        ErrorKind::TypeError,
        format!("Input should be a valid {expected}"),
        raw.clone(),
    )
}

fn coerce_bool(
    raw: &serde_json::Value,
    loc: &Loc,
    mode: CoercionMode,
    errors: &mut ValidationErrorSet,
) -> Option<Value> {
    match raw {
        serde_json::Value::Bool(b) => return Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(0) => return Some(Value::Bool(false)),
            Some(1) => return Some(Value::Bool(true)),
            _ => {}
        },
        serde_json::Value::String(s) => match s.as_str() {
            "true" | "1" => return Some(Value::Bool(true)),
            "false" | "0" => return Some(Value::Bool(false)),
            // A bare `?flag` (no value) means false
            "" if mode == CoercionMode::Text => return Some(Value::Bool(false)),
            _ => {}
        },
        _ => {}
    }
    errors.push(ValidationError::new(
        loc.clone(),
        ErrorKind::BoolParsing,
        "Input should be a valid boolean, unable to interpret input",
        raw.clone(),
    ));
    None
}

fn coerce_int(
    raw: &serde_json::Value,
    loc: &Loc,
    errors: &mut ValidationErrorSet,
) -> Option<Value> {
    match raw {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(Value::Int(i));
            }
            // Integral floats like 42.0 are accepted; 42.5 is not. The
            // upper bound is strict because i64::MAX as f64 rounds up to
            // 2^63, which must not silently saturate.
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    return Some(Value::Int(f as i64));
                }
            }
            let message = if n.as_f64().is_some_and(|f| f.fract() != 0.0) {
                "Input should be a valid integer, got a number with a fractional part"
            } else {
                "Input should be a valid integer, value is out of range for a 64-bit integer"
            };
            errors.push(ValidationError::new(
                loc.clone(),
                ErrorKind::IntParsing,
                message,
                raw.clone(),
            ));
            None
        }
        serde_json::Value::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => Some(Value::Int(i)),
            Err(_) => {
                errors.push(ValidationError::new(
                    loc.clone(),
                    ErrorKind::IntParsing,
                    "Input should be a valid integer, unable to parse string as an integer",
                    raw.clone(),
                ));
                None
            }
        },
        _ => {
            errors.push(type_error(loc, "integer", raw));
            None
        }
    }
}

fn coerce_float(
    raw: &serde_json::Value,
    loc: &Loc,
    errors: &mut ValidationErrorSet,
) -> Option<Value> {
    match raw {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(Value::Int(i));
            }
            Some(Value::Float(normalize_float(n.as_f64()?)))
        }
        serde_json::Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Some(Value::Float(normalize_float(f))),
            _ => {
                errors.push(ValidationError::new(
                    loc.clone(),
                    ErrorKind::FloatParsing,
                    "Input should be a valid number, unable to parse string as a number",
                    raw.clone(),
                ));
                None
            }
        },
        _ => {
            errors.push(type_error(loc, "number", raw));
            None
        }
    }
}

fn coerce_string(
    schema: &StringSchema,
    raw: &serde_json::Value,
    loc: &Loc,
    errors: &mut ValidationErrorSet,
) -> Option<Value> {
    // Multipart file payloads arrive as metadata objects and pass through
    // for the constraint layer to unwrap.
    if matches!(schema.format, Some(Format::Binary)) && raw.is_object() {
        return Some(Value::from_json(raw));
    }
    let serde_json::Value::String(s) = raw else {
        errors.push(type_error(loc, "string", raw));
        return None;
    };

    // Formats with a grammar are enforced during coercion and reported
    // with parsing kinds; a value that fails them never reaches the
    // constraint checks.
    let failure = match schema.format {
        Some(Format::Uuid) if !format::is_valid_uuid(s) => {
            Some((ErrorKind::UuidParsing, "Input should be a valid UUID"))
        }
        Some(Format::Date) if !format::is_valid_date(s) => {
            Some((ErrorKind::DatetimeParsing, "Input should be a valid date"))
        }
        Some(Format::DateTime) if !format::is_valid_datetime(s) => {
            Some((ErrorKind::DatetimeParsing, "Input should be a valid datetime"))
        }
        Some(Format::Duration) if !format::is_valid_duration(s) => {
            Some((ErrorKind::DatetimeParsing, "Input should be a valid duration"))
        }
        _ => None,
    };
    if let Some((kind, message)) = failure {
        errors.push(ValidationError::new(loc.clone(), kind, message, raw.clone()));
        return None;
    }
    Some(Value::Str(s.clone()))
}

fn coerce_array(
    schema: &ArraySchema,
    raw: &serde_json::Value,
    loc: &Loc,
    mode: CoercionMode,
    errors: &mut ValidationErrorSet,
) -> Option<Value> {
    let items_schema = schema.items.as_deref();
    let owned;
    let raw_items: &[serde_json::Value] = match raw {
        serde_json::Value::Array(items) => items,
        serde_json::Value::String(s) if mode == CoercionMode::Text => {
            owned = split_text_array(s, schema.separator.unwrap_or_default());
            &owned
        }
        _ => {
            errors.push(type_error(loc, "array", raw));
            return None;
        }
    };

    let mut out = Vec::with_capacity(raw_items.len());
    let mut failed = false;
    for (i, item) in raw_items.iter().enumerate() {
        let mut item_loc = loc.clone();
        item_loc.push(LocSegment::Index(i));
        let coerced = match items_schema {
            Some(node) => coerce(node, item, &item_loc, mode, errors),
            None => Some(Value::from_json(item)),
        };
        match coerced {
            Some(v) => out.push(v),
            None => failed = true,
        }
    }
    if failed {
        None
    } else {
        Some(Value::Array(out))
    }
}

/// Split a single text value into array elements. A leading `[` is treated
/// as an inline JSON array; otherwise the schema's separator applies and
/// empty elements are dropped.
fn split_text_array(s: &str, separator: Separator) -> Vec<serde_json::Value> {
    if s.starts_with('[') {
        if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(s) {
            return items;
        }
    }
    s.split(separator.as_char())
        .filter(|part| !part.is_empty())
        .map(|part| serde_json::Value::String(part.to_string()))
        .collect()
}

fn coerce_object(
    schema: &ObjectSchema,
    raw: &serde_json::Value,
    loc: &Loc,
    mode: CoercionMode,
    errors: &mut ValidationErrorSet,
) -> Option<Value> {
    let parsed;
    let map = match raw {
        serde_json::Value::Object(map) => map,
        // A query/header object parameter arrives as inline JSON text
        serde_json::Value::String(s) if mode == CoercionMode::Text => {
            match serde_json::from_str::<serde_json::Value>(s) {
                Ok(serde_json::Value::Object(m)) => {
                    parsed = m;
                    &parsed
                }
                _ => {
                    errors.push(type_error(loc, "object", raw));
                    return None;
                }
            }
        }
        _ => {
            errors.push(type_error(loc, "object", raw));
            return None;
        }
    };

    let mut out = indexmap::IndexMap::new();
    let mut failed = false;

    // Declared properties first, in schema declaration order, so error
    // ordering is reproducible regardless of client key order.
    for (name, child) in &schema.properties {
        let mut child_loc = loc.clone();
        child_loc.push(LocSegment::Field(name.clone()));
        match map.get(name) {
            Some(raw_child) => match coerce(child, raw_child, &child_loc, mode, errors) {
                Some(v) => {
                    out.insert(name.clone(), v);
                }
                None => failed = true,
            },
            None => {
                if let Some(default) = &child.default {
                    out.insert(name.clone(), Value::from_json(default));
                } else if schema.required.iter().any(|r| r == name) {
                    errors.push(ValidationError::new(
                        child_loc,
                        ErrorKind::Missing,
                        "Field required",
                        raw.clone(),
                    ));
                    failed = true;
                }
            }
        }
    }

    // Undeclared keys are coerced against the additionalProperties schema
    // when one exists; the allow/deny policy itself is enforced by the
    // constraint layer against the typed tree.
    for (name, raw_child) in map {
        if schema.properties.contains_key(name) {
            continue;
        }
        match &schema.additional {
            AdditionalProperties::Schema(extra) => {
                let mut child_loc = loc.clone();
                child_loc.push(LocSegment::Field(name.clone()));
                match coerce(extra, raw_child, &child_loc, mode, errors) {
                    Some(v) => {
                        out.insert(name.clone(), v);
                    }
                    None => failed = true,
                }
            }
            AdditionalProperties::Allow | AdditionalProperties::Deny => {
                out.insert(name.clone(), Value::from_json(raw_child));
            }
        }
    }

    if failed {
        None
    } else {
        Some(Value::Object(out))
    }
}
