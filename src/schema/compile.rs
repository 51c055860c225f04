//! Schema wire-format compiler.
//!
//! Turns the JSON-Schema-compatible wire document into an immutable
//! [`CompiledSchema`]. Compilation happens once per route at registration
//! time; any problem here is a programmer error and fails fast, before a
//! single request is served.
//!
//! The wire document is an object schema whose top-level properties are the
//! route's parameters. Each parameter node carries a non-standard `source`
//! keyword (`path`/`query`/`header`/`cookie`/`body`); array nodes may carry
//! a non-standard `separator` hint. All other recognized keywords follow
//! JSON Schema.

use super::node::{
    AdditionalProperties, ArraySchema, Bound, CompiledPattern, CompiledSchema, Composition,
    NumberSchema, ObjectSchema, ParameterSpec, SchemaNode, SchemaType, Separator, Source,
    StringSchema,
};
use crate::errors::SchemaError;
use crate::format::Format;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

/// Wire schemas have no `$ref`, so cycles cannot be expressed; this guard
/// rejects pathologically deep literal nesting instead.
const MAX_SCHEMA_DEPTH: usize = 64;

/// Compile a route's wire-format schema document.
pub fn compile(document: &Value) -> Result<CompiledSchema, SchemaError> {
    let obj = document
        .as_object()
        .ok_or_else(|| SchemaError::NotAnObject("<root>".to_string()))?;

    let required: Vec<String> = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut params: Vec<ParameterSpec> = Vec::new();
    let mut body_name: Option<String> = None;

    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        for (name, node_json) in props {
            let node_obj = node_json
                .as_object()
                .ok_or_else(|| SchemaError::NotAnObject(name.clone()))?;
            let source = parse_source(name, node_obj)?;
            if source == Source::Body {
                if let Some(existing) = &body_name {
                    debug!(first = %existing, second = %name, "Duplicate body parameter");
                    return Err(SchemaError::DuplicateBody(name.clone()));
                }
                body_name = Some(name.clone());
            }
            let schema = compile_node(name, node_json, 0)?;
            params.push(ParameterSpec {
                name: name.clone(),
                source,
                default: schema.default.clone(),
                required: required.iter().any(|r| r == name),
                schema,
            });
        }
    }

    // Source order is the error-ordering contract: path, query, header,
    // cookie, body. The sort is stable, so declaration order survives
    // within each source.
    params.sort_by_key(|p| match p.source {
        Source::Path => 0u8,
        Source::Query => 1,
        Source::Header => 2,
        Source::Cookie => 3,
        Source::Body => 4,
    });

    debug!(param_count = params.len(), "Compiled route schema");
    Ok(CompiledSchema::from_params(params))
}

fn parse_source(
    name: &str,
    node: &serde_json::Map<String, Value>,
) -> Result<Source, SchemaError> {
    let raw = node
        .get("source")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::MissingSource(name.to_string()))?;
    match raw {
        "path" => Ok(Source::Path),
        "query" => Ok(Source::Query),
        "header" => Ok(Source::Header),
        "cookie" => Ok(Source::Cookie),
        "body" => Ok(Source::Body),
        other => Err(SchemaError::InvalidSource {
            field: name.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Compile a single schema node, recursing into properties, items and
/// composition branches.
pub fn compile_node(name: &str, json: &Value, depth: usize) -> Result<SchemaNode, SchemaError> {
    if depth > MAX_SCHEMA_DEPTH {
        return Err(SchemaError::TooDeep(MAX_SCHEMA_DEPTH));
    }
    let obj = json
        .as_object()
        .ok_or_else(|| SchemaError::NotAnObject(name.to_string()))?;

    let (type_name, mut nullable) = parse_type_keyword(obj);
    if obj.get("nullable").and_then(Value::as_bool) == Some(true) {
        nullable = true;
    }

    let ty = match type_name.as_deref() {
        Some("object") => SchemaType::Object(compile_object(name, obj, depth)?),
        Some("array") => SchemaType::Array(compile_array(name, obj, depth)?),
        Some("string") => SchemaType::String(compile_string(name, obj)?),
        Some("integer") => SchemaType::Integer(compile_number(name, obj)?),
        Some("number") => SchemaType::Number(compile_number(name, obj)?),
        Some("boolean") => SchemaType::Boolean,
        Some("null") => SchemaType::Null,
        Some(other) => return Err(SchemaError::UnknownType(other.to_string())),
        None => SchemaType::Any,
    };

    let mut composition = Vec::new();
    for (keyword, build) in [
        ("oneOf", Composition::OneOf as fn(Vec<SchemaNode>) -> Composition),
        ("anyOf", Composition::AnyOf),
        ("allOf", Composition::AllOf),
    ] {
        if let Some(branches) = obj.get(keyword).and_then(Value::as_array) {
            let compiled: Result<Vec<SchemaNode>, SchemaError> = branches
                .iter()
                .map(|b| compile_node(name, b, depth + 1))
                .collect();
            composition.push(build(compiled?));
        }
    }
    if let Some(not_schema) = obj.get("not") {
        composition.push(Composition::Not(Box::new(compile_node(
            name,
            not_schema,
            depth + 1,
        )?)));
    }

    Ok(SchemaNode {
        ty,
        nullable,
        default: obj.get("default").cloned(),
        const_value: obj.get("const").cloned(),
        enum_values: obj.get("enum").and_then(Value::as_array).cloned(),
        composition,
    })
}

/// `type` may be a string or, per JSON Schema, an array of strings; a
/// `"null"` entry maps onto the engine's `nullable` flag.
fn parse_type_keyword(obj: &serde_json::Map<String, Value>) -> (Option<String>, bool) {
    match obj.get("type") {
        Some(Value::String(s)) => (Some(s.clone()), false),
        Some(Value::Array(entries)) => {
            let mut nullable = false;
            let mut ty = None;
            for entry in entries {
                match entry.as_str() {
                    Some("null") => nullable = true,
                    Some(other) if ty.is_none() => ty = Some(other.to_string()),
                    _ => {}
                }
            }
            (ty, nullable)
        }
        _ => (None, false),
    }
}

fn usize_keyword(
    name: &str,
    obj: &serde_json::Map<String, Value>,
    keyword: &'static str,
) -> Result<Option<usize>, SchemaError> {
    match obj.get(keyword) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| SchemaError::InvalidKeyword {
                field: name.to_string(),
                keyword,
            }),
    }
}

fn compile_string(
    name: &str,
    obj: &serde_json::Map<String, Value>,
) -> Result<StringSchema, SchemaError> {
    let pattern = match obj.get("pattern").and_then(Value::as_str) {
        Some(source) => Some(CompiledPattern {
            source: source.to_string(),
            regex: regex::Regex::new(source).map_err(|e| SchemaError::InvalidPattern {
                field: name.to_string(),
                pattern: source.to_string(),
                source: e,
            })?,
        }),
        None => None,
    };
    Ok(StringSchema {
        min_length: usize_keyword(name, obj, "minLength")?,
        max_length: usize_keyword(name, obj, "maxLength")?,
        pattern,
        format: obj
            .get("format")
            .and_then(Value::as_str)
            .map(Format::from_keyword),
    })
}

fn compile_number(
    name: &str,
    obj: &serde_json::Map<String, Value>,
) -> Result<NumberSchema, SchemaError> {
    // Draft 2020-12 makes exclusiveMinimum/Maximum standalone numbers; the
    // older boolean form alongside minimum/maximum is also accepted.
    let minimum = parse_bound(obj, "minimum", "exclusiveMinimum");
    let maximum = parse_bound(obj, "maximum", "exclusiveMaximum");
    let multiple_of = match obj.get("multipleOf") {
        None => None,
        Some(v) => {
            let n = v.as_f64().filter(|n| *n > 0.0).ok_or(SchemaError::InvalidKeyword {
                field: name.to_string(),
                keyword: "multipleOf",
            })?;
            Some(n)
        }
    };
    Ok(NumberSchema {
        minimum,
        maximum,
        multiple_of,
    })
}

fn parse_bound(
    obj: &serde_json::Map<String, Value>,
    inclusive_kw: &str,
    exclusive_kw: &str,
) -> Option<Bound> {
    match obj.get(exclusive_kw) {
        Some(Value::Number(n)) => {
            return n.as_f64().map(|value| Bound {
                value,
                exclusive: true,
            });
        }
        Some(Value::Bool(true)) => {
            return obj
                .get(inclusive_kw)
                .and_then(Value::as_f64)
                .map(|value| Bound {
                    value,
                    exclusive: true,
                });
        }
        _ => {}
    }
    obj.get(inclusive_kw)
        .and_then(Value::as_f64)
        .map(|value| Bound {
            value,
            exclusive: false,
        })
}

fn compile_array(
    name: &str,
    obj: &serde_json::Map<String, Value>,
    depth: usize,
) -> Result<ArraySchema, SchemaError> {
    let items = match obj.get("items") {
        Some(items_json) => Some(Box::new(compile_node(name, items_json, depth + 1)?)),
        None => None,
    };
    let separator = match obj.get("separator").and_then(Value::as_str) {
        None => None,
        Some("," | "csv") => Some(Separator::Csv),
        Some(" " | "space") => Some(Separator::Space),
        Some("|" | "pipe") => Some(Separator::Pipe),
        Some(";" | "semicolon") => Some(Separator::Semicolon),
        Some(other) => {
            return Err(SchemaError::InvalidSeparator {
                field: name.to_string(),
                value: other.to_string(),
            })
        }
    };
    Ok(ArraySchema {
        items,
        min_items: usize_keyword(name, obj, "minItems")?,
        max_items: usize_keyword(name, obj, "maxItems")?,
        unique_items: obj.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false),
        separator,
    })
}

fn compile_object(
    name: &str,
    obj: &serde_json::Map<String, Value>,
    depth: usize,
) -> Result<ObjectSchema, SchemaError> {
    let mut properties = IndexMap::new();
    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        for (prop_name, prop_json) in props {
            properties.insert(
                prop_name.clone(),
                compile_node(prop_name, prop_json, depth + 1)?,
            );
        }
    }

    let required = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let additional = match obj.get("additionalProperties") {
        None | Some(Value::Bool(true)) => AdditionalProperties::Allow,
        Some(Value::Bool(false)) => AdditionalProperties::Deny,
        Some(schema_json) => {
            AdditionalProperties::Schema(Box::new(compile_node(name, schema_json, depth + 1)?))
        }
    };

    let mut dependencies = IndexMap::new();
    if let Some(deps) = obj.get("dependencies").and_then(Value::as_object) {
        for (key, dependents) in deps {
            let names: Vec<String> = dependents
                .as_array()
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            dependencies.insert(key.clone(), names);
        }
    }

    Ok(ObjectSchema {
        properties,
        required,
        additional,
        min_properties: usize_keyword(name, obj, "minProperties")?,
        max_properties: usize_keyword(name, obj, "maxProperties")?,
        dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_orders_params_by_source() {
        let doc = json!({
            "type": "object",
            "properties": {
                "session": {"type": "string", "source": "cookie"},
                "body": {"type": "object", "source": "body"},
                "q": {"type": "string", "source": "query"},
                "item_id": {"type": "integer", "source": "path"},
                "x-token": {"type": "string", "source": "header"}
            },
            "required": ["item_id", "q"]
        });
        let compiled = compile(&doc).unwrap();
        let order: Vec<&str> = compiled.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, ["item_id", "q", "x-token", "session", "body"]);
        assert!(compiled.params()[0].required);
        assert!(!compiled.params()[2].required);
    }

    #[test]
    fn test_missing_source_fails_fast() {
        let doc = json!({
            "type": "object",
            "properties": {"q": {"type": "string"}}
        });
        assert!(matches!(
            compile(&doc),
            Err(SchemaError::MissingSource(name)) if name == "q"
        ));
    }

    #[test]
    fn test_duplicate_body_rejected() {
        let doc = json!({
            "type": "object",
            "properties": {
                "a": {"type": "object", "source": "body"},
                "b": {"type": "object", "source": "body"}
            }
        });
        assert!(matches!(compile(&doc), Err(SchemaError::DuplicateBody(_))));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let doc = json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "source": "query", "pattern": "[unclosed"}
            }
        });
        assert!(matches!(
            compile(&doc),
            Err(SchemaError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_exclusive_bound_forms() {
        // Draft 2020-12 numeric form
        let node = compile_node("price", &json!({"type": "number", "exclusiveMinimum": 0}), 0)
            .unwrap();
        match node.ty {
            SchemaType::Number(n) => {
                assert_eq!(n.minimum, Some(Bound { value: 0.0, exclusive: true }));
            }
            _ => panic!("expected number schema"),
        }
        // Boolean form alongside minimum
        let node = compile_node(
            "price",
            &json!({"type": "number", "minimum": 5, "exclusiveMinimum": true}),
            0,
        )
        .unwrap();
        match node.ty {
            SchemaType::Number(n) => {
                assert_eq!(n.minimum, Some(Bound { value: 5.0, exclusive: true }));
            }
            _ => panic!("expected number schema"),
        }
    }

    #[test]
    fn test_type_array_with_null_sets_nullable() {
        let node = compile_node("tag", &json!({"type": ["string", "null"]}), 0).unwrap();
        assert!(node.nullable);
        assert!(matches!(node.ty, SchemaType::String(_)));
    }

    #[test]
    fn test_deep_schema_rejected() {
        let mut schema = json!({"type": "integer"});
        for _ in 0..70 {
            schema = json!({"type": "object", "properties": {"nested": schema}});
        }
        assert!(matches!(
            compile_node("root", &schema, 0),
            Err(SchemaError::TooDeep(_))
        ));
    }

    #[test]
    fn test_separator_aliases() {
        for (raw, expected) in [
            ("|", Separator::Pipe),
            ("pipe", Separator::Pipe),
            (";", Separator::Semicolon),
            (" ", Separator::Space),
            (",", Separator::Csv),
        ] {
            let node = compile_node(
                "tags",
                &json!({"type": "array", "separator": raw, "items": {"type": "string"}}),
                0,
            )
            .unwrap();
            match node.ty {
                SchemaType::Array(a) => assert_eq!(a.separator, Some(expected)),
                _ => panic!("expected array schema"),
            }
        }
    }
}
