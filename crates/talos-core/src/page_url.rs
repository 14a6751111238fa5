//! Page-number manipulation of listing URLs.
//!
//! Listing pagination on the supported sites is carried in a `page` query
//! parameter. These helpers rewrite only that parameter, preserving every
//! other parameter and its position, and never touch scheme, host, path or
//! fragment.

use url::Url;

use crate::error::CrawlError;

const PAGE_PARAM: &str = "page";

/// Return `url` with the `page` query parameter set to `page_number`,
/// adding it at the end if absent. Duplicate `page` parameters collapse
/// into the first occurrence.
pub fn build_page_url(url: &str, page_number: u32) -> Result<String, CrawlError> {
    let mut parsed = Url::parse(url).map_err(|e| CrawlError::InvalidUrl(format!("{url}: {e}")))?;

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (k, v) in parsed.query_pairs() {
        if k == PAGE_PARAM {
            if !replaced {
                pairs.push((PAGE_PARAM.to_string(), page_number.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((k.into_owned(), v.into_owned()));
        }
    }
    if !replaced {
        pairs.push((PAGE_PARAM.to_string(), page_number.to_string()));
    }

    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    Ok(parsed.to_string())
}

/// Read the current `page` query parameter, if present and numeric.
pub fn page_number(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == PAGE_PARAM)
        .and_then(|(_, v)| v.parse().ok())
}

/// Resolve a possibly-relative link against a base URL.
pub fn resolve(base: &str, link: &str) -> Result<String, CrawlError> {
    if let Ok(absolute) = Url::parse(link) {
        return Ok(absolute.to_string());
    }
    let base = Url::parse(base).map_err(|e| CrawlError::InvalidUrl(format!("{base}: {e}")))?;
    let joined = base
        .join(link)
        .map_err(|e| CrawlError::InvalidUrl(format!("{link}: {e}")))?;
    Ok(joined.to_string())
}
