//! `Content-Type` header parsing.

/// Parsed media type with its parameters.
///
/// The essence (`type/subtype`) is lowercased at parse time; parameter
/// names are lowercased but values keep their original case, since
/// boundary strings are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    pub fn parse(raw: &str) -> Option<MediaType> {
        let mut sections = raw.split(';');
        let essence = sections.next()?.trim().to_ascii_lowercase();
        if !essence.contains('/') {
            return None;
        }
        let params = sections
            .filter_map(|section| {
                let mut kv = section.trim().splitn(2, '=');
                let name = kv.next()?.trim().to_ascii_lowercase();
                if name.is_empty() {
                    return None;
                }
                let value = kv
                    .next()
                    .unwrap_or("")
                    .trim()
                    .trim_matches('"')
                    .to_string();
                Some((name, value))
            })
            .collect();
        Some(MediaType { essence, params })
    }

    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `application/json` and any `+json` structured-syntax suffix
    /// (e.g. `application/problem+json`).
    pub fn is_json(&self) -> bool {
        self.essence == "application/json" || self.essence.ends_with("+json")
    }

    pub fn is_form_urlencoded(&self) -> bool {
        self.essence == "application/x-www-form-urlencoded"
    }

    pub fn is_multipart(&self) -> bool {
        self.essence == "multipart/form-data"
    }

    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary").filter(|b| !b.is_empty())
    }
}
