//! Constraint validation over the typed value tree.
//!
//! Runs after coercion succeeded for a node. Checks at one node stop at
//! the first failing constraint (a string that is too short is not also
//! reported against its pattern), but traversal continues into sibling
//! fields and container children so one pass reports every failing field.

use crate::errors::{ErrorKind, Loc, LocSegment, ValidationError, ValidationErrorSet};
use crate::format::{self, Format, EMAIL_PATTERN};
use crate::schema::{
    AdditionalProperties, ArraySchema, Bound, Composition, NumberSchema, ObjectSchema, SchemaNode,
    SchemaType, StringSchema,
};
use crate::value::Value;

/// Validate `value` against `node`, appending failures to `errors`.
pub fn validate(node: &SchemaNode, value: &Value, loc: &Loc, errors: &mut ValidationErrorSet) {
    if matches!(value, Value::Null) && node.nullable {
        return;
    }

    if let Some(expected) = &node.const_value {
        if &value.to_json() != expected {
            errors.push(ValidationError::new(
                loc.clone(),
                ErrorKind::ValidationError,
                format!("Value must be exactly {}", literal(expected)),
                value.to_json(),
            ));
            return;
        }
    }

    if let Some(allowed) = &node.enum_values {
        let json = value.to_json();
        if !allowed.contains(&json) {
            let expected = expected_list(allowed);
            errors.push(
                ValidationError::new(
                    loc.clone(),
                    ErrorKind::Enum,
                    format!("Input should be {expected}"),
                    json,
                )
                .with_ctx(serde_json::json!({ "expected": expected })),
            );
            return;
        }
    }

    // Values from the declared parameter tree always arrive here with the
    // right type; this arm fires for untyped subtrees checked against
    // composition branches or an additionalProperties schema
    if !type_matches(node, value) {
        errors.push(ValidationError::new(
            loc.clone(),
            ErrorKind::TypeError,
            format!("Input should be a valid {}", node.type_name()),
            value.to_json(),
        ));
        return;
    }

    let before = errors.len();
    match (&node.ty, value) {
        (SchemaType::String(schema), _) => validate_string(schema, value, loc, errors),
        (SchemaType::Integer(schema), Value::Int(i)) => {
            validate_number(schema, *i as f64, value, loc, errors)
        }
        (SchemaType::Number(schema), Value::Int(i)) => {
            validate_number(schema, *i as f64, value, loc, errors)
        }
        (SchemaType::Number(schema), Value::Float(f)) => {
            validate_number(schema, *f, value, loc, errors)
        }
        (SchemaType::Array(schema), Value::Array(items)) => {
            validate_array(schema, items, value, loc, errors)
        }
        (SchemaType::Object(schema), Value::Object(_)) => {
            validate_object(schema, value, loc, errors)
        }
        _ => {}
    }
    // First failure at this node wins; composition is not piled on top
    if errors.len() > before {
        return;
    }

    for composition in &node.composition {
        validate_composition(composition, value, loc, errors);
    }
}

///// Silent check used by composition keywords: does `value` satisfy `node`
/// without producing any errors?
pub fn matches(node: &SchemaNode, value: &Value) -> bool {
    let mut scratch = ValidationErrorSet::new();
    validate(node, value, &Loc::new(), &mut scratch);
    scratch.is_empty()
}

fn type_matches(node: &SchemaNode, value: &Value) -> bool {
    if matches!(value, Value::Null) {
        return node.nullable || matches!(node.ty, SchemaType::Null | SchemaType::Any);
    }
    match (&node.ty, value) {
        (SchemaType::Any, _) => true,
        (SchemaType::String(_), Value::Str(_)) => true,
        // File uploads are metadata objects validated as strings
        (SchemaType::String(s), Value::Object(_)) => {
            matches!(s.format, Some(Format::Binary))
        }
        (SchemaType::Integer(_), Value::Int(_)) => true,
        (SchemaType::Number(_), Value::Int(_) | Value::Float(_)) => true,
        (SchemaType::Boolean, Value::Bool(_)) => true,
        (SchemaType::Array(_), Value::Array(_)) => true,
        (SchemaType::Object(_), Value::Object(_)) => true,
        _ => false,
    }
}

fn literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

/// `'a', 'b' or 'c'` list rendering used by enum errors.
fn expected_list(allowed: &[serde_json::Value]) -> String {
    let rendered: Vec<String> = allowed.iter().map(literal).collect();
    match rendered.len() {
        0 => String::new(),
        1 => rendered[0].clone(),
        _ => format!(
            "{} or {}",
            rendered[..rendered.len() - 1].join(", "),
            rendered[rendered.len() - 1]
        ),
    }
}

fn validate_string(
    schema: &StringSchema,
    value: &Value,
    loc: &Loc,
    errors: &mut ValidationErrorSet,
) {
    // File uploads carry their bytes in a metadata object; string
    // constraints apply to the content
    let s = match value {
        Value::Str(s) => s.as_str(),
        Value::Object(map) if matches!(schema.format, Some(Format::Binary)) => {
            match map.get("content").and_then(Value::as_str) {
                Some(content) => content,
                None => return,
            }
        }
        _ => return,
    };
    let len = s.chars().count();

    if let Some(min) = schema.min_length {
        if len < min {
            errors.push(
                ValidationError::new(
                    loc.clone(),
                    ErrorKind::StringTooShort,
                    format!(
                        "String should have at least {min} character{}",
                        plural(min)
                    ),
                    value.to_json(),
                )
                .with_ctx(serde_json::json!({ "min_length": min })),
            );
            return;
        }
    }
    if let Some(max) = schema.max_length {
        if len > max {
            errors.push(
                ValidationError::new(
                    loc.clone(),
                    ErrorKind::StringTooLong,
                    format!("String should have at most {max} character{}", plural(max)),
                    value.to_json(),
                )
                .with_ctx(serde_json::json!({ "max_length": max })),
            );
            return;
        }
    }
    if let Some(pattern) = &schema.pattern {
        if !pattern.regex.is_match(s) {
            errors.push(
                ValidationError::new(
                    loc.clone(),
                    ErrorKind::StringPatternMismatch,
                    format!("String should match pattern '{}'", pattern.source),
                    value.to_json(),
                )
                .with_ctx(serde_json::json!({ "pattern": pattern.source })),
            );
            return;
        }
    }
    if let Some(fmt) = &schema.format {
        if let Err(message) = format::validate_format(fmt, s) {
            // Email failures are reported as a pattern mismatch against
            // the canonical email pattern
            let error = if matches!(fmt, Format::Email) {
                ValidationError::new(
                    loc.clone(),
                    ErrorKind::StringPatternMismatch,
                    message,
                    value.to_json(),
                )
                .with_ctx(serde_json::json!({ "pattern": EMAIL_PATTERN }))
            } else {
                ValidationError::new(
                    loc.clone(),
                    ErrorKind::ValidationError,
                    message,
                    value.to_json(),
                )
            };
            errors.push(error);
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn validate_number(
    schema: &NumberSchema,
    n: f64,
    value: &Value,
    loc: &Loc,
    errors: &mut ValidationErrorSet,
) {
    if let Some(Bound { value: min, exclusive }) = schema.minimum {
        let (violated, kind, verb, key) = if exclusive {
            (n <= min, ErrorKind::GreaterThan, "greater than", "gt")
        } else {
            (
                n < min,
                ErrorKind::GreaterThanEqual,
                "greater than or equal to",
                "ge",
            )
        };
        if violated {
            errors.push(
                ValidationError::new(
                    loc.clone(),
                    kind,
                    format!("Input should be {verb} {}", render_number(min)),
                    value.to_json(),
                )
                .with_ctx(serde_json::json!({ key: min })),
            );
            return;
        }
    }
    if let Some(Bound { value: max, exclusive }) = schema.maximum {
        let (violated, kind, verb, key) = if exclusive {
            (n >= max, ErrorKind::LessThan, "less than", "lt")
        } else {
            (n > max, ErrorKind::LessThanEqual, "less than or equal to", "le")
        };
        if violated {
            errors.push(
                ValidationError::new(
                    loc.clone(),
                    kind,
                    format!("Input should be {verb} {}", render_number(max)),
                    value.to_json(),
                )
                .with_ctx(serde_json::json!({ key: max })),
            );
            return;
        }
    }
    if let Some(step) = schema.multiple_of {
        let quotient = n / step;
        if (quotient - quotient.round()).abs() > 1e-9 {
            errors.push(
                ValidationError::new(
                    loc.clone(),
                    ErrorKind::ValidationError,
                    format!("Input should be a multiple of {}", render_number(step)),
                    value.to_json(),
                )
                .with_ctx(serde_json::json!({ "multiple_of": step })),
            );
        }
    }
}

/// Bounds render without a trailing `.0` so messages read `greater than 0`,
/// not `greater than 0.0`.
fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn validate_array(
    schema: &ArraySchema,
    items: &[Value],
    value: &Value,
    loc: &Loc,
    errors: &mut ValidationErrorSet,
) {
    let before = errors.len();
    if let Some(min) = schema.min_items {
        if items.len() < min {
            errors.push(
                ValidationError::new(
                    loc.clone(),
                    ErrorKind::TooShort,
                    format!("List should have at least {min} item{}", plural(min)),
                    value.to_json(),
                )
                .with_ctx(serde_json::json!({ "min_items": min })),
            );
        }
    }
    if errors.len() == before {
        if let Some(max) = schema.max_items {
            if items.len() > max {
                errors.push(
                    ValidationError::new(
                        loc.clone(),
                        ErrorKind::TooLong,
                        format!("List should have at most {max} item{}", plural(max)),
                        value.to_json(),
                    )
                    .with_ctx(serde_json::json!({ "max_items": max })),
                );
            }
        }
    }
    if errors.len() == before && schema.unique_items {
        // Deep structural equality, quadratic but arrays are small
        for i in 1..items.len() {
            if items[..i].contains(&items[i]) {
                errors.push(ValidationError::new(
                    loc.clone(),
                    ErrorKind::ValidationError,
                    "List items must be unique",
                    value.to_json(),
                ));
                break;
            }
        }
    }

    // Item-level constraints still run when a length check failed; they
    // live at different locations
    if let Some(item_schema) = &schema.items {
        for (i, item) in items.iter().enumerate() {
            let mut item_loc = loc.clone();
            item_loc.push(LocSegment::Index(i));
            validate(item_schema, item, &item_loc, errors);
        }
    }
}

fn validate_object(
    schema: &ObjectSchema,
    value: &Value,
    loc: &Loc,
    errors: &mut ValidationErrorSet,
) {
    let Some(map) = value.as_object() else { return };
    let before = errors.len();

    // The coercer reports missing required fields on the declared tree;
    // this check is what makes required-discriminated composition
    // branches (and additionalProperties schemas) reject incomplete
    // objects
    for name in &schema.required {
        if !map.contains_key(name) {
            let mut field_loc = loc.clone();
            field_loc.push(LocSegment::Field(name.clone()));
            errors.push(ValidationError::new(
                field_loc,
                ErrorKind::Missing,
                "Field required",
                value.to_json(),
            ));
        }
    }

    if let Some(min) = schema.min_properties {
        if map.len() < min {
            errors.push(
                ValidationError::new(
                    loc.clone(),
                    ErrorKind::ValidationError,
                    format!("Object must have at least {min} propert{}", ies(min)),
                    value.to_json(),
                )
                .with_ctx(serde_json::json!({ "min_properties": min })),
            );
        }
    }
    if errors.len() == before {
        if let Some(max) = schema.max_properties {
            if map.len() > max {
                errors.push(
                    ValidationError::new(
                        loc.clone(),
                        ErrorKind::ValidationError,
                        format!("Object must have at most {max} propert{}", ies(max)),
                        value.to_json(),
                    )
                    .with_ctx(serde_json::json!({ "max_properties": max })),
                );
            }
        }
    }

    // Dependency failures locate at the object, like composition errors
    for (key, dependents) in &schema.dependencies {
        if map.contains_key(key) {
            for dependent in dependents {
                if !map.contains_key(dependent) {
                    errors.push(ValidationError::new(
                        loc.clone(),
                        ErrorKind::ValidationError,
                        format!("When '{key}' is present, '{dependent}' is required"),
                        value.to_json(),
                    ));
                }
            }
        }
    }

    for (name, child_value) in map {
        let mut child_loc = loc.clone();
        child_loc.push(LocSegment::Field(name.clone()));
        match schema.properties.get(name) {
            Some(child_schema) => validate(child_schema, child_value, &child_loc, errors),
            None => match &schema.additional {
                AdditionalProperties::Allow => {}
                AdditionalProperties::Deny => {
                    errors.push(ValidationError::new(
                        child_loc,
                        ErrorKind::ValidationError,
                        "Extra inputs are not permitted",
                        child_value.to_json(),
                    ));
                }
                AdditionalProperties::Schema(extra_schema) => {
                    validate(extra_schema, child_value, &child_loc, errors);
                }
            },
        }
    }
}

fn ies(n: usize) -> &'static str {
    if n == 1 {
        "y"
    } else {
        "ies"
    }
}

fn validate_composition(
    composition: &Composition,
    value: &Value,
    loc: &Loc,
    errors: &mut ValidationErrorSet,
) {
    match composition {
        Composition::OneOf(branches) => {
            let matched = branches.iter().filter(|b| matches(b, value)).count();
            if matched != 1 {
                errors.push(ValidationError::new(
                    loc.clone(),
                    ErrorKind::ValidationError,
                    format!("Must match exactly one schema (oneOf), but matched {matched}"),
                    value.to_json(),
                ));
            }
        }
        Composition::AnyOf(branches) => {
            if !branches.iter().any(|b| matches(b, value)) {
                errors.push(ValidationError::new(
                    loc.clone(),
                    ErrorKind::ValidationError,
                    "Input should match at least one of the schemas (anyOf)",
                    value.to_json(),
                ));
            }
        }
        Composition::AllOf(branches) => {
            // allOf failures report their branch errors directly
            for branch in branches {
                validate(branch, value, loc, errors);
            }
        }
        Composition::Not(branch) => {
            if matches(branch, value) {
                errors.push(ValidationError::new(
                    loc.clone(),
                    ErrorKind::ValidationError,
                    "Input should not match the disallowed schema (not)",
                    value.to_json(),
                ));
            }
        }
    }
}
