use indexmap::IndexMap;
use reqwest::header::{HeaderMap, SET_COOKIE};

/// Cookies collected from every response of a session, keyed by cookie name.
///
/// Only the `name=value` pair of each `Set-Cookie` is kept; attributes such as
/// `Path` or `Expires` are dropped. A cookie set again keeps the position it was
/// first seen at, so the serialized header is stable across updates.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CookieJar {
    cookies: IndexMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one raw `Set-Cookie` value into the jar.
    pub fn add_set_cookie(&mut self, raw: &str) {
        let pair = raw.split(';').next().unwrap_or_default().trim();
        if pair.is_empty() {
            return;
        }
        let name = pair.split('=').next().unwrap_or_default();
        // `insert` on an existing key replaces the value in place.
        self.cookies.insert(name.to_string(), pair.to_string());
    }

    /// Merges every `Set-Cookie` header of a response.
    pub fn merge_headers(&mut self, headers: &HeaderMap) {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .for_each(|raw| self.add_set_cookie(raw));
    }

    /// The value of a `Cookie` request header carrying every stored cookie.
    pub fn header_value(&self) -> String {
        self.cookies
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .get(name)
            .and_then(|pair| pair.split_once('='))
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}
