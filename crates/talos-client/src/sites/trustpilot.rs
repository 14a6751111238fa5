//! Trustpilot review-listing extractor.
//!
//! Trustpilot tags its review cards with stable `data-*` attributes; the
//! class-based fallbacks catch older cached markup where those attributes
//! are missing.

use scraper::Html;
use talos_core::error::CrawlError;
use talos_core::models::{RawRecord, clean_text};
use talos_core::traits::PageExtractor;

use super::{collect_page_links, max_page_in, parse_rating_token, sel, text_of};

#[derive(Debug, Clone, Copy, Default)]
pub struct TrustpilotExtractor;

impl TrustpilotExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PageExtractor for TrustpilotExtractor {
    fn extract(&self, html: &str) -> Result<Vec<RawRecord>, CrawlError> {
        let doc = Html::parse_document(html);

        let primary = sel(r#"article[data-service-review-card-paper="true"]"#)?;
        let fallback = sel(r#"article[class*="reviewCard"]"#)?;
        let mut cards: Vec<_> = doc.select(&primary).collect();
        if cards.is_empty() {
            cards = doc.select(&fallback).collect();
        }

        let name = sel(r#"span[data-consumer-name-typography="true"]"#)?;
        let name_fallback = sel("aside a")?;
        let date = sel("time")?;
        let rating = sel(r#"img[alt*="Rated"]"#)?;
        let title = sel(r#"h2[data-service-review-title-typography="true"]"#)?;
        let title_fallback = sel("h2")?;
        let body = sel(r#"p[data-service-review-text-typography="true"]"#)?;
        let body_fallback = sel("p")?;

        let mut records = Vec::with_capacity(cards.len());
        for card in cards {
            let mut raw = RawRecord::new();

            let reviewer = card
                .select(&name)
                .next()
                .and_then(text_of)
                .or_else(|| card.select(&name_fallback).next().and_then(text_of));
            raw.set("reviewer_name", reviewer.as_deref());

            // Prefer the machine-readable datetime over the display text.
            let date = card.select(&date).next().and_then(|time| {
                time.value()
                    .attr("datetime")
                    .map(str::to_string)
                    .or_else(|| text_of(time))
            });
            raw.set("date", date.as_deref());

            let rating = card
                .select(&rating)
                .next()
                .and_then(|img| img.value().attr("alt"))
                .and_then(parse_rating_token);
            raw.set("rating", rating.as_deref());

            let title = card
                .select(&title)
                .next()
                .and_then(text_of)
                .or_else(|| card.select(&title_fallback).next().and_then(text_of));
            raw.set("title", title.as_deref());

            let body_text = card.select(&body).next().and_then(text_of).or_else(|| {
                let joined = card
                    .select(&body_fallback)
                    .filter_map(text_of)
                    .collect::<Vec<_>>()
                    .join(" ");
                clean_text(&joined)
            });
            raw.set("body", body_text.as_deref());

            if !raw.is_empty() {
                records.push(raw);
            }
        }
        Ok(records)
    }

    fn find_next_page_link(&self, html: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        let next = sel(r#"a[data-pagination-button-next="true"]"#).ok()?;
        if let Some(href) = doc.select(&next).next().and_then(|a| a.value().attr("href")) {
            return Some(href.to_string());
        }
        let fallback = sel(r#"a[aria-label="Next page"]"#).ok()?;
        doc.select(&fallback)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
    }

    fn find_page_links(&self, html: &str) -> Vec<String> {
        collect_page_links(&Html::parse_document(html))
    }

    fn find_max_page_number(&self, html: &str) -> Option<u32> {
        max_page_in(&Html::parse_document(html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <main>
          <article data-service-review-card-paper="true">
            <aside><span data-consumer-name-typography="true">Jane  Doe</span></aside>
            <time datetime="2024-05-01T10:00:00.000Z">May 1, 2024</time>
            <img alt="Rated 4 out of 5 stars">
            <h2 data-service-review-title-typography="true">Great
              service</h2>
            <p data-service-review-text-typography="true">Fast and friendly.</p>
          </article>
          <article data-service-review-card-paper="true">
            <aside><span data-consumer-name-typography="true">Bob</span></aside>
            <time datetime="2024-05-02T09:00:00.000Z">May 2, 2024</time>
            <img alt="Rated 1 out of 5 stars">
            <p data-service-review-text-typography="true">Never again.</p>
          </article>
          <nav>
            <a href="/review/acme?page=1">1</a>
            <a href="/review/acme?page=2">2</a>
            <a href="/review/acme?page=7">7</a>
            <a data-pagination-button-next="true" href="/review/acme?page=2">Next</a>
          </nav>
        </main>
    "#;

    #[test]
    fn test_extracts_review_cards() {
        let records = TrustpilotExtractor::new().extract(LISTING).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].get("reviewer_name"), Some("Jane Doe"));
        assert_eq!(records[0].get("date"), Some("2024-05-01T10:00:00.000Z"));
        assert_eq!(records[0].get("rating"), Some("4"));
        assert_eq!(records[0].get("title"), Some("Great service"));
        assert_eq!(records[0].get("body"), Some("Fast and friendly."));

        assert_eq!(records[1].get("reviewer_name"), Some("Bob"));
        assert_eq!(records[1].get("title"), None);
    }

    #[test]
    fn test_fallback_card_selector() {
        let html = r#"
            <article class="styles_reviewCard__abc">
              <aside><a href="/users/1">Old Markup</a></aside>
              <time datetime="2023-01-01">Jan 1, 2023</time>
            </article>
        "#;
        let records = TrustpilotExtractor::new().extract(html).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("reviewer_name"), Some("Old Markup"));
    }

    #[test]
    fn test_empty_page_extracts_nothing() {
        let records = TrustpilotExtractor::new().extract("<html><body></body></html>").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_next_page_link() {
        let extractor = TrustpilotExtractor::new();
        assert_eq!(
            extractor.find_next_page_link(LISTING).as_deref(),
            Some("/review/acme?page=2")
        );
        assert_eq!(extractor.find_next_page_link("<html></html>"), None);
    }

    #[test]
    fn test_aria_label_next_fallback() {
        let html = r#"<a aria-label="Next page" href="?page=3">→</a>"#;
        assert_eq!(
            TrustpilotExtractor::new().find_next_page_link(html).as_deref(),
            Some("?page=3")
        );
    }

    #[test]
    fn test_page_links_and_max_page() {
        let extractor = TrustpilotExtractor::new();
        let links = extractor.find_page_links(LISTING);
        assert!(links.contains(&"/review/acme?page=2".to_string()));
        assert_eq!(extractor.find_max_page_number(LISTING), Some(7));
    }
}
