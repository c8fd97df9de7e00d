//! Extracts outbound links from an already-fetched HTML body and resolves
//! them against the page's effective URL.
//!
//! The original crawler fetched each HTML page twice: once for its
//! content-type header, once more inside a dedicated scraper thread. Here
//! a single GET (the `http-fetch` contract) supplies both the
//! classification and the body, so link extraction runs directly over
//! bytes already in hand.

use reqwest::Url;
use select::document::Document;
use select::predicate::Name;

/// Resolves every `<a href>` in `body` against `base`, dropping anything
/// that fails to parse as a URL (mailto:, javascript:, bare fragments).
pub fn extract_links(base: &Url, body: &str) -> Vec<Url> {
    Document::from(body)
        .find(Name("a"))
        .filter_map(|node| node.attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_drops_fragments() {
        let base = Url::parse("http://example.com/dir/page.html").unwrap();
        let body = r#"
            <html><body>
                <a href="other.html#section">a</a>
                <a href="/abs.html">b</a>
                <a href="http://other.com/c.html">c</a>
                <a href="mailto:nobody@example.com">d</a>
            </body></html>
        "#;

        let links: Vec<String> = extract_links(&base, body).into_iter().map(|u| u.to_string()).collect();
        assert_eq!(
            links,
            vec![
                "http://example.com/dir/other.html".to_string(),
                "http://example.com/abs.html".to_string(),
                "http://other.com/c.html".to_string(),
            ]
        );
    }
}
