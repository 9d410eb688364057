use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::ElementRef;

pub(crate) const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub(crate) const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

pub(crate) fn default_header() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers
}

pub(crate) trait ElementRefExt {
    /// All descendant text joined by `delimiter`, trimmed.
    fn to_string(&self, delimiter: &str) -> String;
}

impl ElementRefExt for ElementRef<'_> {
    fn to_string(&self, delimiter: &str) -> String {
        self.text()
            .collect::<Vec<_>>()
            .join(delimiter)
            .trim()
            .to_string()
    }
}

/// Last `/`-separated segment of `href`, or `None` when it is empty.
pub(crate) fn last_path_segment(href: &str) -> Option<&str> {
    href.rsplit('/').next().filter(|segment| !segment.is_empty())
}
