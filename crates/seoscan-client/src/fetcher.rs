use std::net::IpAddr;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use seoscan_core::error::AppError;
use seoscan_core::traits::Fetcher;
use seoscan_core::util::parse_crawl_url;

const USER_AGENT: &str = "seoscan/0.1 (+SEO crawler)";

/// HTTP fetcher using reqwest.
///
/// Downloads raw HTML with a fixed User-Agent and a per-request timeout
/// (10 seconds by default). Timeouts, connection failures and non-2xx
/// statuses are transport errors and get retried by the worker pool; a body
/// that cannot be decoded is a content error and does not.
///
/// SSRF protection is **enabled** by default: requests to private/reserved
/// IP ranges are rejected. Use [`allow_private_urls`](Self::allow_private_urls)
/// to crawl sites on the local network.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
    ssrf_protection: bool,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
            ssrf_protection: true,
        })
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }

    async fn send(&self, method: Method, url: &str) -> Result<reqwest::Response, AppError> {
        if self.ssrf_protection {
            validate_url(url).await?;
        }

        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }
        Ok(response)
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let response = self.send(Method::GET, url).await?;
        response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else {
                AppError::ContentError(format!("Failed to read response body from {url}: {e}"))
            }
        })
    }

    async fn probe(&self, url: &str) -> Result<(), AppError> {
        match self.send(Method::HEAD, url).await {
            Ok(_) => Ok(()),
            // Some servers refuse HEAD outright.
            Err(AppError::HttpError(msg))
                if msg.starts_with(&format!("HTTP {}", StatusCode::METHOD_NOT_ALLOWED.as_u16())) =>
            {
                tracing::debug!(url, "HEAD not allowed, probing with GET");
                self.send(Method::GET, url).await.map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Reject URLs that are not crawlable or that point into private networks.
///
/// IP literals are checked directly; hostnames are resolved and every
/// resolved address must be public.
async fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed = parse_crawl_url(url)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::InvalidUrl(format!("{url}: missing host")))?;

    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(AppError::InvalidUrl(format!(
                "SSRF blocked: {host} is a private/reserved IP"
            )));
        }
        return Ok(());
    }

    let port = parsed.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| AppError::NetworkError(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(AppError::NetworkError(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    if let Some(blocked) = addrs.iter().find(|a| is_private_ip(a.ip())) {
        return Err(AppError::InvalidUrl(format!(
            "SSRF blocked: {host} resolves to private/reserved IP {}",
            blocked.ip()
        )));
    }

    Ok(())
}

/// Check if an IP address is in a private/reserved/link-local range.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local() // includes cloud metadata 169.254.169.254
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64 // CGN 100.64/10
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xFFC0) == 0xFE80 // link-local
                || (v6.segments()[0] & 0xFE00) == 0xFC00 // unique local
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}
