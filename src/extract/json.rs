//! JSON body decoding with a nesting-depth guard.

use crate::errors::RequestError;
use tracing::debug;

/// Maximum container nesting depth accepted in a JSON body. A scalar has
/// depth 0; each enclosing array or object adds one.
pub const MAX_JSON_DEPTH: usize = 32;

/// Structural depth of a JSON tree.
///
/// Bounded by serde_json's own recursion limit, so this cannot blow the
/// stack on hostile input.
pub fn json_depth(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Array(items) => {
            1 + items.iter().map(json_depth).max().unwrap_or(0)
        }
        serde_json::Value::Object(map) => {
            1 + map.values().map(json_depth).max().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Decode a JSON request body. The caller has already settled charset and
/// media-type questions; this only handles syntax and depth.
pub fn parse_json_body(body: &[u8]) -> Result<serde_json::Value, RequestError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| RequestError::MalformedJson(format!("invalid UTF-8 in body: {e}")))?;
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        // Bodies deeper than serde_json's own recursion limit never reach
        // our depth counter; report them as a nesting failure, not syntax.
        if e.to_string().contains("recursion limit exceeded") {
            RequestError::NestingTooDeep(MAX_JSON_DEPTH)
        } else {
            RequestError::MalformedJson(e.to_string())
        }
    })?;
    let depth = json_depth(&value);
    if depth > MAX_JSON_DEPTH {
        debug!(depth, limit = MAX_JSON_DEPTH, "JSON body too deeply nested");
        return Err(RequestError::NestingTooDeep(MAX_JSON_DEPTH));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_depth_of_scalars_and_containers() {
        assert_eq!(json_depth(&json!(42)), 0);
        assert_eq!(json_depth(&json!([])), 1);
        assert_eq!(json_depth(&json!({"a": 1})), 1);
        assert_eq!(json_depth(&json!({"a": [1, 2]})), 2);
        assert_eq!(json_depth(&json!({"a": {"b": {"c": []}}})), 4);
    }

    #[test]
    fn test_parse_at_limit_passes() {
        let mut body = "1".to_string();
        for _ in 0..MAX_JSON_DEPTH {
            body = format!("[{body}]");
        }
        assert!(parse_json_body(body.as_bytes()).is_ok());
    }

    #[test]
    fn test_parse_over_limit_rejected() {
        let mut body = "1".to_string();
        for _ in 0..=MAX_JSON_DEPTH {
            body = format!("[{body}]");
        }
        assert!(matches!(
            parse_json_body(body.as_bytes()),
            Err(RequestError::NestingTooDeep(32))
        ));
    }

    #[test]
    fn test_parse_past_recursion_limit_reports_nesting() {
        // Deep enough that serde_json aborts the parse itself
        let mut body = "1".to_string();
        for _ in 0..200 {
            body = format!("[{body}]");
        }
        assert!(matches!(
            parse_json_body(body.as_bytes()),
            Err(RequestError::NestingTooDeep(32))
        ));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_json_body(b"{\"a\": ").unwrap_err();
        assert!(matches!(err, RequestError::MalformedJson(_)));
        assert!(err.to_string().starts_with("Invalid JSON: "));
    }
}
