//! Listing page extraction
//!
//! A listing page enumerates record links and points at the next page.
//! Extraction claims each new identifier in the session's dedup index at
//! discovery time, so an identifier can only ever be handed to the batcher
//! once per session.

use crate::state::{DedupIndex, Target};
use crate::ConfigError;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static REL_NEXT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[rel~="next"]"#).expect("rel=next selector is valid") // Static selector, safe to panic
});

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("anchor selector is valid")); // Static selector, safe to panic

/// Text that marks a pagination link when no `rel="next"` is present
const NEXT_TEXT: &str = "Next";

/// How record links are recognized on a listing page
#[derive(Debug, Clone)]
pub struct ListingRules {
    link_selector: Selector,
    identifier_pattern: Regex,
}

impl ListingRules {
    /// Builds rules for record links of the form `<prefix><CODE>/`
    pub fn new(record_path_prefix: &str) -> Result<Self, ConfigError> {
        let link_selector = Selector::parse(&format!(r#"a[href^="{}"]"#, record_path_prefix))
            .map_err(|e| {
                ConfigError::Validation(format!(
                    "record path prefix '{}' does not form a selector: {}",
                    record_path_prefix, e
                ))
            })?;

        let identifier_pattern = Regex::new(&format!(
            r"(?i)^{}([A-Z0-9-]+)/$",
            regex::escape(record_path_prefix)
        ))
        .map_err(|e| ConfigError::Validation(format!("record path pattern: {}", e)))?;

        Ok(Self {
            link_selector,
            identifier_pattern,
        })
    }

    /// Returns the identifier encoded in a record href, if it is one
    pub fn identifier_of<'a>(&self, href: &'a str) -> Option<&'a str> {
        self.identifier_pattern
            .captures(href)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }
}

/// What a listing page yielded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Newly discovered targets, in document order
    pub targets: Vec<Target>,

    /// Absolute URL of the next listing page
    pub next: Option<String>,
}

/// Extracts new targets and the next-page URL from a listing page
///
/// # Arguments
///
/// * `content` - The listing page HTML
/// * `base_url` - URL the listing was fetched from (not the gateway URL)
/// * `rules` - Record link recognition rules
/// * `seen` - Session dedup index; new identifiers are claimed in it
pub fn extract_listing(
    content: &str,
    base_url: &Url,
    rules: &ListingRules,
    seen: &mut DedupIndex,
) -> ListingPage {
    let document = Html::parse_document(content);
    let mut targets = Vec::new();

    for element in document.select(&rules.link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(identifier) = rules.identifier_of(href) else {
            continue;
        };

        if !seen.claim(identifier) {
            continue;
        }

        match base_url.join(href) {
            Ok(url) => targets.push(Target {
                identifier: identifier.to_string(),
                url: url.to_string(),
            }),
            Err(e) => tracing::debug!("Skipping record link {}: {}", href, e),
        }
    }

    let next = find_next_href(&document).and_then(|href| resolve_next(href, base_url));

    ListingPage { targets, next }
}

/// Finds the pagination href: `rel="next"` first, then link text
fn find_next_href(document: &Html) -> Option<&str> {
    let anchor = document.select(&REL_NEXT_SELECTOR).next().or_else(|| {
        document
            .select(&ANCHOR_SELECTOR)
            .find(|a| a.text().collect::<String>().contains(NEXT_TEXT))
    })?;

    anchor
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|href| !href.is_empty())
}

/// Resolves a next-page href against the current listing URL
///
/// Query-only references keep the listing's origin and path. A link back
/// to the current page ends pagination.
fn resolve_next(href: &str, base_url: &Url) -> Option<String> {
    let next = match base_url.join(href) {
        Ok(next) => next,
        Err(e) => {
            tracing::warn!("Unusable next-page link {}: {}", href, e);
            return None;
        }
    };

    if next.scheme() != "http" && next.scheme() != "https" {
        return None;
    }

    if &next == base_url {
        tracing::warn!("Next-page link points back at {}, stopping pagination", base_url);
        return None;
    }

    Some(next.to_string())
}
