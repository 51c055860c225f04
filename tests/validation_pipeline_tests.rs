use serde_json::json;
use spikard_validation::{compile, EngineLimits, RequestParts, RequestValidator};

fn item_route() -> RequestValidator {
    let schema = compile(&json!({
        "type": "object",
        "properties": {
            "item_id": {"type": "integer", "source": "path", "minimum": 1},
            "q": {"type": "string", "source": "query", "minLength": 3},
            "x-api-key": {"type": "string", "source": "header"},
            "session": {"type": "string", "source": "cookie"},
            "payload": {
                "type": "object",
                "source": "body",
                "properties": {
                    "name": {"type": "string", "minLength": 1},
                    "price": {"type": "number", "exclusiveMinimum": 0}
                },
                "required": ["name", "price"]
            }
        },
        "required": ["item_id", "q", "x-api-key", "session", "payload"]
    }))
    .expect("schema compiles");
    RequestValidator::new(schema)
}

fn full_request() -> RequestParts {
    let mut parts = RequestParts::default();
    parts.path_params.insert("item_id".to_string(), "7".to_string());
    parts.raw_query = Some("q=widgets".to_string());
    parts.headers.insert("x-api-key".to_string(), "k123".to_string());
    parts.headers.insert("cookie".to_string(), "session=s456".to_string());
    parts.headers.insert("content-type".to_string(), "application/json".to_string());
    parts.body = br#"{"name": "Widget", "price": "19.99"}"#.to_vec();
    parts
}

#[test]
fn test_happy_path_returns_typed_values() {
    let out = item_route()
        .validate_request(&full_request())
        .expect("request is valid");
    let json = out.to_json();
    assert_eq!(json["item_id"], 7);
    assert_eq!(json["q"], "widgets");
    assert_eq!(json["payload"]["name"], "Widget");
    // "19.99" was coerced from string to number
    assert_eq!(json["payload"]["price"], 19.99);
}

#[test]
fn test_aggregation_reports_every_failing_field() {
    let mut parts = full_request();
    parts.path_params.insert("item_id".to_string(), "abc".to_string());
    parts.raw_query = Some("q=ab".to_string());
    parts.body = br#"{"name": "", "price": -1}"#.to_vec();

    let err = item_route().validate_request(&parts).unwrap_err();
    let doc = err.to_body();
    assert_eq!(doc["detail"], "4 validation errors in request");
    assert_eq!(doc["status"], 422);
    assert_eq!(doc["title"], "Request Validation Failed");
    assert_eq!(doc["type"], "https://spikard.dev/errors/validation-error");

    let errors = doc["errors"].as_array().expect("errors array");
    assert_eq!(errors[0]["loc"], json!(["path", "item_id"]));
    assert_eq!(errors[0]["type"], "int_parsing");
    assert_eq!(errors[1]["loc"], json!(["query", "q"]));
    assert_eq!(errors[1]["type"], "string_too_short");
    assert_eq!(errors[2]["loc"], json!(["body", "name"]));
    assert_eq!(errors[3]["loc"], json!(["body", "price"]));
    assert_eq!(errors[3]["type"], "greater_than");
}

#[test]
fn test_ordering_is_deterministic() {
    let mut parts = full_request();
    parts.path_params.clear();
    parts.raw_query = None;
    parts.headers.remove("x-api-key");
    parts.headers.remove("cookie");

    let first = item_route().validate_request(&parts).unwrap_err().to_body();
    let second = item_route().validate_request(&parts).unwrap_err().to_body();
    assert_eq!(first, second);

    let sources: Vec<&str> = first["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["loc"][0].as_str().unwrap())
        .collect();
    assert_eq!(sources, ["path", "query", "header", "cookie"]);
}

#[test]
fn test_error_entries_echo_input_and_ctx() {
    let mut parts = full_request();
    parts.raw_query = Some("q=ab".to_string());

    let doc = item_route().validate_request(&parts).unwrap_err().to_body();
    let entry = &doc["errors"][0];
    assert_eq!(entry["input"], "ab");
    assert_eq!(entry["ctx"], json!({"min_length": 3}));
    assert_eq!(entry["msg"], "String should have at least 3 characters");
}

#[test]
fn test_single_error_detail_is_singular() {
    let mut parts = full_request();
    parts.raw_query = Some("q=ab".to_string());
    let doc = item_route().validate_request(&parts).unwrap_err().to_body();
    assert_eq!(doc["detail"], "1 validation error in request");
}

#[test]
fn test_i64_boundary_values() {
    let schema = compile(&json!({
        "type": "object",
        "properties": {"n": {"type": "integer", "source": "query"}},
        "required": ["n"]
    }))
    .expect("schema compiles");
    let validator = RequestValidator::new(schema);

    let mut parts = RequestParts::default();
    parts.raw_query = Some(format!("n={}", i64::MAX));
    let out = validator.validate_request(&parts).expect("i64::MAX fits");
    assert_eq!(out.to_json()["n"], i64::MAX);

    parts.raw_query = Some("n=9223372036854775808".to_string());
    let doc = validator.validate_request(&parts).unwrap_err().to_body();
    assert_eq!(doc["errors"][0]["type"], "int_parsing");
}

#[test]
fn test_deeply_nested_body_field_loc() {
    let schema = compile(&json!({
        "type": "object",
        "properties": {
            "payload": {
                "type": "object",
                "source": "body",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {"qty": {"type": "integer", "minimum": 1}},
                            "required": ["qty"]
                        }
                    }
                }
            }
        }
    }))
    .expect("schema compiles");
    let validator = RequestValidator::new(schema);

    let mut parts = RequestParts::default();
    parts.headers.insert("content-type".to_string(), "application/json".to_string());
    parts.body = br#"{"items": [{"qty": 2}, {"qty": 0}]}"#.to_vec();

    let doc = validator.validate_request(&parts).unwrap_err().to_body();
    assert_eq!(doc["errors"][0]["loc"], json!(["body", "items", 1, "qty"]));
    assert_eq!(doc["errors"][0]["type"], "greater_than_equal");
}

#[test]
fn test_header_limit_is_431() {
    let schema = compile(&json!({"type": "object", "properties": {}})).expect("schema compiles");
    let validator = RequestValidator::with_limits(
        schema,
        EngineLimits {
            max_body_bytes: 1024,
            max_headers_bytes: 16,
        },
    );
    let mut parts = RequestParts::default();
    parts
        .headers
        .insert("x-long-header".to_string(), "a".repeat(64));
    let err = validator.validate_request(&parts).unwrap_err();
    assert_eq!(err.status(), 431);
    assert_eq!(
        err.to_body()["error"],
        "Request headers exceed maximum size of 16 bytes"
    );
}

#[test]
fn test_pipeline_emits_debug_traces() {
    // try_init: another test in the binary may have installed a subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("spikard_validation=debug"))
        .with_test_writer()
        .try_init();

    let mut parts = full_request();
    parts.raw_query = Some("q=ab".to_string());
    let err = item_route().validate_request(&parts).unwrap_err();
    assert_eq!(err.status(), 422);
}

#[test]
fn test_optional_params_absent_from_output() {
    let schema = compile(&json!({
        "type": "object",
        "properties": {
            "q": {"type": "string", "source": "query"},
            "page": {"type": "integer", "source": "query", "default": 1}
        }
    }))
    .expect("schema compiles");
    let out = RequestValidator::new(schema)
        .validate_request(&RequestParts::default())
        .expect("nothing required");
    let json = out.to_json();
    assert!(json.get("q").is_none());
    assert_eq!(json["page"], 1);
}
