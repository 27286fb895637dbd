use std::collections::HashSet;

use scraper::{Html, Selector};
use seoscan_core::traits::LinkExtractor;
use seoscan_core::util::normalize_page_url;
use url::Url;

/// Extracts same-host `<a href>` links from HTML.
///
/// Relative hrefs are resolved against the page URL. Only `http`/`https`
/// links whose host equals the page host are kept; fragments are dropped and
/// duplicates removed in first-seen order. Hrefs that fail to parse are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct HtmlLinkExtractor;

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> Vec<String> {
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };
        let document = Html::parse_document(html);

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for href in document
            .select(&selector)
            .filter_map(|a| a.value().attr("href"))
        {
            let Ok(resolved) = page_url.join(href.trim()) else {
                continue;
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            if resolved.host_str() != page_url.host_str() {
                continue;
            }
            let link = normalize_page_url(&resolved);
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }
        links
    }
}
