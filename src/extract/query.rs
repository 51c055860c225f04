//! Query-string decoding.

/// Percent-decoded query pairs in their original wire order. Repeated
/// names are kept as distinct pairs; the coercer decides whether they
/// accumulate into an array.
#[derive(Debug, Default)]
pub struct QueryPairs {
    pairs: Vec<(String, String)>,
}

impl QueryPairs {
    /// Every value sent under `name`, in wire order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == name)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse a raw query string (without the leading `?`). `+` decodes to a
/// space and percent-escapes are resolved.
pub fn parse_query(raw: &str) -> QueryPairs {
    let pairs = url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    QueryPairs { pairs }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_pairs() {
        let q = parse_query("limit=10&offset=20");
        assert_eq!(q.get_all("limit"), ["10"]);
        assert_eq!(q.get_all("offset"), ["20"]);
        assert!(!q.contains("missing"));
    }

    #[test]
    fn test_repeated_names_keep_order() {
        let q = parse_query("tag=a&tag=b&tag=c");
        assert_eq!(q.get_all("tag"), ["a", "b", "c"]);
    }

    #[test]
    fn test_percent_and_plus_decoding() {
        let q = parse_query("q=hello+world&note=a%2Cb");
        assert_eq!(q.get_all("q"), ["hello world"]);
        assert_eq!(q.get_all("note"), ["a,b"]);
    }

    #[test]
    fn test_flag_without_value() {
        let q = parse_query("filter=");
        assert!(q.contains("filter"));
        assert_eq!(q.get_all("filter"), [""]);
    }
}
