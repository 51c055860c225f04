//! `multipart/form-data` body decoding.
//!
//! Hand-rolled boundary parser over the raw bytes. File parts (those with
//! a `filename` in their `Content-Disposition`) become metadata objects
//! `{filename, content_type, size, content}`; plain fields become strings.
//! Parts repeating the same field name accumulate into an array.

use crate::errors::RequestError;
use tracing::debug;

#[derive(Debug)]
struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// Decode a multipart body into an untyped JSON object.
pub fn parse_multipart_body(
    body: &[u8],
    boundary: &str,
) -> Result<serde_json::Value, RequestError> {
    let mut fields = serde_json::Map::new();
    let parts = split_parts(body, boundary);
    debug!(part_count = parts.len(), "Multipart body decoded");
    for part in parts {
        let value = if part.filename.is_some() {
            serde_json::json!({
                "filename": part.filename,
                "content_type": part
                    .content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                "size": part.data.len(),
                "content": String::from_utf8_lossy(&part.data),
            })
        } else {
            serde_json::Value::String(String::from_utf8_lossy(&part.data).into_owned())
        };
        match fields.get_mut(&part.name) {
            Some(serde_json::Value::Array(items)) => items.push(value),
            Some(existing) => {
                let prev = existing.take();
                *existing = serde_json::Value::Array(vec![prev, value]);
            }
            None => {
                fields.insert(part.name, value);
            }
        }
    }
    Ok(serde_json::Value::Object(fields))
}

fn split_parts(body: &[u8], boundary: &str) -> Vec<Part> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut pos = 0;

    // Sections between consecutive boundary lines; the closing
    // `--boundary--` line ends the walk.
    while let Some(start) = find(body, delimiter, pos) {
        let after = start + delimiter.len();
        if body[after..].starts_with(b"--") {
            break;
        }
        let content_start = match find(body, b"\r\n", after) {
            Some(p) => p + 2,
            None => break,
        };
        let content_end = match find(body, delimiter, content_start) {
            Some(p) => p,
            None => break,
        };
        let section = &body[content_start..content_end];
        // Strip the CRLF that precedes the next boundary line
        let section = section.strip_suffix(b"\r\n").unwrap_or(section);
        if let Some(part) = parse_part(section) {
            parts.push(part);
        }
        pos = content_end;
    }
    parts
}

fn parse_part(section: &[u8]) -> Option<Part> {
    let header_end = find(section, b"\r\n\r\n", 0)?;
    let headers = std::str::from_utf8(&section[..header_end]).ok()?;
    let data = section[header_end + 4..].to_vec();

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in headers.split("\r\n") {
        let (header_name, header_value) = line.split_once(':')?;
        match header_name.trim().to_ascii_lowercase().as_str() {
            "content-disposition" => {
                name = disposition_param(header_value, "name");
                filename = disposition_param(header_value, "filename");
            }
            "content-type" => content_type = Some(header_value.trim().to_string()),
            _ => {}
        }
    }

    Some(Part {
        name: name?,
        filename,
        content_type,
        data,
    })
}

fn disposition_param(value: &str, param: &str) -> Option<String> {
    value.split(';').find_map(|section| {
        let (k, v) = section.trim().split_once('=')?;
        if k.trim() == param {
            Some(v.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
