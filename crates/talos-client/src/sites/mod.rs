//! Site-specific extractors. Each one knows a single site's markup and
//! nothing about crawling; the engine drives them through the
//! [`PageExtractor`] trait.
//!
//! [`PageExtractor`]: talos_core::traits::PageExtractor

pub mod capterra;
pub mod trustpilot;

pub use capterra::CapterraExtractor;
pub use trustpilot::TrustpilotExtractor;

use scraper::{ElementRef, Html, Selector};
use talos_core::error::CrawlError;
use talos_core::models::clean_text;

fn sel(css: &str) -> Result<Selector, CrawlError> {
    Selector::parse(css).map_err(|e| CrawlError::Extract(format!("bad selector {css:?}: {e}")))
}

fn text_of(element: ElementRef<'_>) -> Option<String> {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// First numeric token in a phrase like "Rated 4 out of 5 stars" or "4.5".
fn parse_rating_token(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|token| token.parse::<f32>().is_ok())
        .map(str::to_string)
}

/// Page number carried in a (possibly relative) href's `page=` parameter.
fn page_number_in(href: &str) -> Option<u32> {
    let (_, rest) = href.split_once("page=")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// All anchor hrefs that carry a `page=` parameter.
fn collect_page_links(doc: &Html) -> Vec<String> {
    let Ok(anchors) = sel(r#"a[href*="page="]"#) else {
        return Vec::new();
    };
    doc.select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Highest page number advertised by the pagination links on the page.
fn max_page_in(doc: &Html) -> Option<u32> {
    collect_page_links(doc)
        .iter()
        .filter_map(|href| page_number_in(href))
        .max()
}
