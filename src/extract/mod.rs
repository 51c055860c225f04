//! Raw request decomposition.
//!
//! Extractors pull untyped text out of the transport envelope: query
//! strings, headers, cookies and the request body in its three supported
//! encodings. Nothing here applies schema semantics; the output is handed
//! to the coercer as strings and raw JSON trees.

mod content_type;
mod form;
mod json;
mod multipart;
mod query;

pub use content_type::MediaType;
pub use form::parse_urlencoded_body;
pub use json::{json_depth, parse_json_body, MAX_JSON_DEPTH};
pub use multipart::parse_multipart_body;
pub use query::{parse_query, QueryPairs};

use std::collections::HashMap;

/// Transport-level view of one request, as handed to the engine by a
/// server binding. Header keys are lowercase.
#[derive(Debug, Default)]
pub struct RequestParts {
    /// Values captured from the route's path template, keyed by placeholder
    /// name. Already percent-decoded by the router.
    pub path_params: HashMap<String, String>,
    /// Raw query string, without the leading `?`.
    pub raw_query: Option<String>,
    /// Headers with lowercase names.
    pub headers: HashMap<String, String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl RequestParts {
    pub fn content_type(&self) -> Option<MediaType> {
        self.headers.get("content-type").and_then(|v| MediaType::parse(v))
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .get("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// Total size of the header block, the metric the header limit is
    /// enforced against.
    pub fn headers_size(&self) -> usize {
        self.headers.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    pub fn cookies(&self) -> HashMap<String, String> {
        parse_cookies(&self.headers)
    }
}

/// Split the `Cookie` header into name/value pairs.
pub fn parse_cookies(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .get("cookie")
        .map(|c| {
            c.split(';')
                .filter_map(|pair| {
                    let mut parts = pair.trim().splitn(2, '=');
                    let name = parts.next()?.trim().to_string();
                    if name.is_empty() {
                        return None;
                    }
                    let value = parts.next().unwrap_or("").trim().to_string();
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default()
}
