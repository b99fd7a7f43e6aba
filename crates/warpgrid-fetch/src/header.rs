//! Transport header multimap and the bridge to the host's header collection.
//!
//! Names are stored in canonical form (`content-type` → `Content-Type`), so a
//! lookup behaves the same whichever casing the host or the caller used.
//! Each name maps to an ordered sequence of values; duplicates are kept.

use crate::host::HostHeaders;

/// An HTTP header as a name-value pair. `name` is canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl AsRef<str>, value: impl Into<String>) -> Self {
        Self {
            name: canonical_header_key(name.as_ref()),
            value: value.into(),
        }
    }
}

/// An ordered, case-insensitive, multi-valued collection of HTTP headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<Header>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a value under `name`, keeping any existing values.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries.push(Header::new(name, value));
    }

    /// Replace every value under `name` with a single value.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let header = Header::new(name, value);
        self.entries.retain(|h| h.name != header.name);
        self.entries.push(header);
    }

    /// Get the first header value matching `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Get all header values matching `name` (case-insensitive).
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Distinct canonical names, in first-seen order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for h in &self.entries {
            if !keys.contains(&h.name.as_str()) {
                keys.push(&h.name);
            }
        }
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Header> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        let mut map = Self::new();
        for h in iter {
            map.append(h.name, h.value);
        }
        map
    }
}

impl FromIterator<(String, String)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.append(name, value);
        }
        map
    }
}

/// Canonical MIME header form: first letter and every letter after a hyphen
/// upper-cased, the rest lower-cased. Names containing anything other than
/// token characters are returned unchanged.
pub fn canonical_header_key(name: &str) -> String {
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return name.to_string();
    }
    let mut upper = true;
    name.bytes()
        .map(|b| {
            let c = if upper {
                b.to_ascii_uppercase()
            } else {
                b.to_ascii_lowercase()
            };
            upper = b == b'-';
            c as char
        })
        .collect()
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Forward bridge: every value under every name, appended to the host
/// collection. Duplicates survive as separate entries.
pub(crate) fn to_host(headers: &HeaderMap) -> HostHeaders {
    let mut host = HostHeaders::new();
    for h in headers.iter() {
        host.append(h.name.as_str(), h.value.as_str());
    }
    host
}

/// Reverse bridge: every pair the host exposes, in host order, accumulated
/// under its canonical name.
pub(crate) fn from_host(host: &HostHeaders) -> HeaderMap {
    let mut headers = HeaderMap::new();
    host.for_each(|name, value| headers.append(name, value));
    headers
}
