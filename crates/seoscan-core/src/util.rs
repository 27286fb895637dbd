use url::Url;

use crate::error::AppError;

/// Parse a URL the crawler is allowed to visit: absolute, http(s), with a host.
pub fn parse_crawl_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim()).map_err(|e| AppError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidUrl(format!(
                "{raw}: scheme '{scheme}' is not crawlable"
            )));
        }
    }
    if url.host_str().is_none() {
        return Err(AppError::InvalidUrl(format!("{raw}: missing host")));
    }
    Ok(url)
}

/// Canonical string form used as the page dedup key.
///
/// Fragments never reach the server, so `/a#top` and `/a` are the same page.
pub fn normalize_page_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}
