pub mod analyzer;
pub mod fetcher;
pub mod links;

pub use analyzer::{SeoAnalyzer, SeoThresholds};
pub use fetcher::ReqwestFetcher;
pub use links::HtmlLinkExtractor;
