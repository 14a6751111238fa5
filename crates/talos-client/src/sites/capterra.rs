//! Capterra review-listing extractor.
//!
//! Capterra's markup is class-based (Bootstrap-flavoured) and churns more
//! than Trustpilot's, hence the substring class matches throughout.

use scraper::Html;
use talos_core::error::CrawlError;
use talos_core::models::{RawRecord, clean_text};
use talos_core::traits::PageExtractor;

use super::{collect_page_links, max_page_in, parse_rating_token, sel, text_of};

#[derive(Debug, Clone, Copy, Default)]
pub struct CapterraExtractor;

impl CapterraExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PageExtractor for CapterraExtractor {
    fn extract(&self, html: &str) -> Result<Vec<RawRecord>, CrawlError> {
        let doc = Html::parse_document(html);

        let cards = sel(r#"div[class*="review-card"]"#)?;
        let name = sel(r#"span[class*="reviewer-name"]"#)?;
        let name_fallback = sel(r#"div[class*="fw-bold"]"#)?;
        let date = sel(r#"span[class*="review-date"]"#)?;
        let date_fallback = sel("time")?;
        let rating = sel(r#"span[class*="star-rating"] span[class*="ms-1"]"#)?;
        let title = sel(r#"h3[class*="fw-bold"]"#)?;
        let title_fallback = sel("h3")?;
        let body = sel("p")?;

        let mut records = Vec::new();
        for card in doc.select(&cards) {
            let mut raw = RawRecord::new();

            let reviewer = card
                .select(&name)
                .next()
                .and_then(text_of)
                .or_else(|| card.select(&name_fallback).next().and_then(text_of));
            raw.set("reviewer_name", reviewer.as_deref());

            let date = card
                .select(&date)
                .next()
                .and_then(text_of)
                .or_else(|| {
                    card.select(&date_fallback).next().and_then(|time| {
                        time.value()
                            .attr("datetime")
                            .map(str::to_string)
                            .or_else(|| text_of(time))
                    })
                });
            raw.set("date", date.as_deref());

            let rating = card
                .select(&rating)
                .next()
                .and_then(text_of)
                .and_then(|text| parse_rating_token(&text));
            raw.set("rating", rating.as_deref());

            let title = card
                .select(&title)
                .next()
                .and_then(text_of)
                .or_else(|| card.select(&title_fallback).next().and_then(text_of));
            raw.set("title", title.as_deref());

            let body_text = {
                let joined = card
                    .select(&body)
                    .filter_map(text_of)
                    .collect::<Vec<_>>()
                    .join(" ");
                clean_text(&joined)
            };
            raw.set("body", body_text.as_deref());

            if !raw.is_empty() {
                records.push(raw);
            }
        }
        Ok(records)
    }

    fn find_next_page_link(&self, html: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        let next = sel(r#"a[rel="next"]"#).ok()?;
        if let Some(href) = doc.select(&next).next().and_then(|a| a.value().attr("href")) {
            return Some(href.to_string());
        }
        let fallback = sel(r#"a[aria-label*="Next"]"#).ok()?;
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
