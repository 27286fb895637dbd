use std::collections::HashSet;
use std::ops::RangeInclusive;

use scraper::{Html, Selector};
use seoscan_core::models::{NewObservation, ObservationKind, PageReport};
use seoscan_core::traits::PageAnalyzer;
use url::Url;

/// Recommended lengths, in characters, for title and meta description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeoThresholds {
    pub title: RangeInclusive<usize>,
    pub description: RangeInclusive<usize>,
}

impl Default for SeoThresholds {
    fn default() -> Self {
        Self {
            title: 30..=65,
            description: 70..=160,
        }
    }
}

/// Stateless on-page SEO checks.
///
/// | check | observation |
/// |---|---|
/// | empty `<title>` | `missing title` |
/// | title outside the recommended range | `title length` |
/// | empty `<meta name="description">` | `missing description` |
/// | description outside the recommended range | `description length` |
///
/// Image sources are collected as absolute URLs so the caller can check them.
#[derive(Debug, Clone, Default)]
pub struct SeoAnalyzer {
    thresholds: SeoThresholds,
}

impl SeoAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: SeoThresholds) -> Self {
        Self { thresholds }
    }

    fn check_length(
        kind: ObservationKind,
        missing: ObservationKind,
        label: &str,
        value: &str,
        range: &RangeInclusive<usize>,
    ) -> Option<NewObservation> {
        let len = value.chars().count();
        if len == 0 {
            Some(NewObservation::new(missing, format!("{label} is missing")))
        } else if !range.contains(&len) {
            Some(NewObservation::new(
                kind,
                format!(
                    "{label} length {len}, recommended {}–{}",
                    range.start(),
                    range.end()
                ),
            ))
        } else {
            None
        }
    }
}

impl PageAnalyzer for SeoAnalyzer {
    fn analyze(&self, html: &str, page_url: &Url) -> PageReport {
        let document = Html::parse_document(html);

        let title = select_first(&document, "title")
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let description = select_first(&document, r#"meta[name="description"]"#)
            .and_then(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        let observations = [
            Self::check_length(
                ObservationKind::TitleLength,
                ObservationKind::MissingTitle,
                "title",
                &title,
                &self.thresholds.title,
            ),
            Self::check_length(
                ObservationKind::DescriptionLength,
                ObservationKind::MissingDescription,
                "description",
                &description,
                &self.thresholds.description,
            ),
        ]
        .into_iter()
        .flatten()
        .collect();

        PageReport {
            title,
            description,
            observations,
            images: image_sources(&document, page_url),
        }
    }
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<scraper::ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

/// Absolute http(s) URLs of every `<img src>`, deduplicated in page order.
fn image_sources(document: &Html, page_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| page_url.join(src.trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
        .filter(|u| seen.insert(u.clone()))
        .collect()
}
