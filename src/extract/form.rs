//! `application/x-www-form-urlencoded` body decoding.
//!
//! Bracket notation in field names expands into nested structure:
//! `user[name]=x` builds an object, `tags[]=a&tags[]=b` appends to an
//! array, and `items[0]=a&items[2]=c` fills an index-keyed array that is
//! compacted in ascending index order (gaps dropped). Repeated plain names
//! also accumulate into an array. All leaf values stay strings; typing is
//! the coercer's job.

use indexmap::IndexMap;
use std::collections::BTreeMap;

#[derive(Debug)]
enum FormNode {
    Text(String),
    List(Vec<FormNode>),
    Sparse(BTreeMap<usize, FormNode>),
    Map(IndexMap<String, FormNode>),
}

#[derive(Debug, PartialEq, Eq)]
enum KeySegment {
    Name(String),
    Append,
    Index(usize),
}

/// `user[addresses][0][city]` -> root `user` + segments `addresses`, `0`, `city`.
fn split_key(key: &str) -> (String, Vec<KeySegment>) {
    let Some(open) = key.find('[') else {
        return (key.to_string(), Vec::new());
    };
    let root = key[..open].to_string();
    let mut segments = Vec::new();
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            // Unbalanced bracket: treat the remainder as a literal name
            segments.push(KeySegment::Name(stripped.to_string()));
            break;
        };
        let inner = &stripped[..close];
        segments.push(if inner.is_empty() {
            KeySegment::Append
        } else if let Ok(i) = inner.parse::<usize>() {
            KeySegment::Index(i)
        } else {
            KeySegment::Name(inner.to_string())
        });
        rest = &stripped[close + 1..];
    }
    (root, segments)
}

fn insert(node: &mut FormNode, segments: &[KeySegment], value: String) {
    let Some(first) = segments.first() else {
        match node {
            // Repeated plain name accumulates
            FormNode::Text(existing) => {
                let prev = std::mem::take(existing);
                *node = FormNode::List(vec![FormNode::Text(prev), FormNode::Text(value)]);
            }
            FormNode::List(items) => items.push(FormNode::Text(value)),
            _ => *node = FormNode::Text(value),
        }
        return;
    };
    match first {
        KeySegment::Name(name) => {
            if !matches!(node, FormNode::Map(_)) {
                *node = FormNode::Map(IndexMap::new());
            }
            if let FormNode::Map(map) = node {
                let child = map
                    .entry(name.clone())
                    .or_insert_with(|| FormNode::Text(String::new()));
                insert(child, &segments[1..], value);
            }
        }
        KeySegment::Append => {
            if !matches!(node, FormNode::List(_)) {
                *node = FormNode::List(Vec::new());
            }
            if let FormNode::List(items) = node {
                if segments.len() == 1 {
                    items.push(FormNode::Text(value));
                } else {
                    let mut child = FormNode::Text(String::new());
                    insert(&mut child, &segments[1..], value);
                    items.push(child);
                }
            }
        }
        KeySegment::Index(i) => {
            if !matches!(node, FormNode::Sparse(_)) {
                *node = FormNode::Sparse(BTreeMap::new());
            }
            if let FormNode::Sparse(map) = node {
                let child = map
                    .entry(*i)
                    .or_insert_with(|| FormNode::Text(String::new()));
                insert(child, &segments[1..], value);
            }
        }
    }
}

fn to_json(node: FormNode) -> serde_json::Value {
    match node {
        FormNode::Text(s) => serde_json::Value::String(s),
        FormNode::List(items) => {
            serde_json::Value::Array(items.into_iter().map(to_json).collect())
        }
        // BTreeMap iterates in ascending index order; gaps compact away
        FormNode::Sparse(map) => {
            serde_json::Value::Array(map.into_values().map(to_json).collect())
        }
        FormNode::Map(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, to_json(v));
            }
            serde_json::Value::Object(out)
        }
    }
}

/// Decode a urlencoded body into an untyped JSON object.
pub fn parse_urlencoded_body(body: &[u8]) -> serde_json::Value {
    let mut root: IndexMap<String, FormNode> = IndexMap::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        let (name, segments) = split_key(&key);
        if name.is_empty() {
            continue;
        }
        let node = root
            .entry(name)
            .or_insert_with(|| FormNode::Text(String::new()));
        insert(node, &segments, value.to_string());
    }
    to_json(FormNode::Map(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_fields() {
        let body = parse_urlencoded_body(b"name=widget&price=19.99");
        assert_eq!(body, json!({"name": "widget", "price": "19.99"}));
    }

    #[test]
    fn test_empty_bracket_append() {
        let body = parse_urlencoded_body(b"tags[]=a&tags[]=b&tags[]=c");
        assert_eq!(body, json!({"tags": ["a", "b", "c"]}));
    }

    #[test]
    fn test_nested_object_keys() {
        let body = parse_urlencoded_body(b"user[name]=ada&user[address][city]=London");
        assert_eq!(
            body,
            json!({"user": {"name": "ada", "address": {"city": "London"}}})
        );
    }

    #[test]
    fn test_indexed_array_compacts_gaps() {
        let body = parse_urlencoded_body(b"items[2]=c&items[0]=a&items[5]=f");
        assert_eq!(body, json!({"items": ["a", "c", "f"]}));
    }

    #[test]
    fn test_repeated_plain_name_becomes_array() {
        let body = parse_urlencoded_body(b"tag=x&tag=y");
        assert_eq!(body, json!({"tag": ["x", "y"]}));
    }

    #[test]
    fn test_percent_decoding_in_keys_and_values() {
        let body = parse_urlencoded_body(b"user%5Bname%5D=a+b");
        assert_eq!(body, json!({"user": {"name": "a b"}}));
    }
}
