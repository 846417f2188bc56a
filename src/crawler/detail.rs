//! Detail page extraction
//!
//! A detail page is mined by an ordered table of strategies. Each strategy
//! is a pure function from the parsed page to a `PartialRecord`; merging
//! only fills fields no earlier strategy resolved. Whatever stays
//! unresolved falls back to its sentinel, so extraction never fails.
//!
//! 1. `structured-data` - the embedded JSON-LD block
//! 2. `label-proximity` - a label element followed by a `dd`/`td` value
//! 3. `text-pattern` - label + value regexes over the flattened page text
//! 4. `heading` - the page's `h1`, for the name only

use crate::state::Record;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;

static JSON_LD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("JSON-LD selector is valid") // Static selector, safe to panic
});

static LABEL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("dt, th, span, b, strong, td").expect("label selector is valid") // Static selector, safe to panic
});

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("body selector is valid")); // Static selector, safe to panic

static H1_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("h1 selector is valid")); // Static selector, safe to panic

static COORDINATE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d+\.\d+),\s*(-?\d+\.\d+)").expect("coordinate regex is valid") // Static pattern, safe to panic
});

static ELEVATION_FT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*ft").expect("elevation regex is valid")); // Static pattern, safe to panic

static LEADING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)").expect("digits regex is valid")); // Static pattern, safe to panic

static TEXT_IATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)IATA code:?\s+([A-Z0-9]{3})\b").expect("IATA regex is valid") // Static pattern, safe to panic
});

static TEXT_ICAO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ICAO code:?\s+([A-Z0-9]{4})\b").expect("ICAO regex is valid") // Static pattern, safe to panic
});

static TEXT_FACILITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Facility type:?\s+([A-Z_]+)").expect("facility regex is valid") // Static pattern, safe to panic
});

static TEXT_COORDINATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Coordinates:?\s+(-?\d+\.\d+,\s*-?\d+\.\d+)").expect("coordinates regex is valid") // Static pattern, safe to panic
});

static TEXT_ELEVATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Field elevation:?\s+(\d+)\s*ft").expect("elevation text regex is valid") // Static pattern, safe to panic
});

/// Longest text a label element may carry; longer elements are content, not labels
const MAX_LABEL_LEN: usize = 64;

/// Labels looked up by the label-proximity strategy
mod labels {
    pub const IATA: &str = "IATA code";
    pub const ICAO: &str = "ICAO code";
    pub const FACILITY: &str = "Facility type";
    pub const COORDINATES: &str = "Coordinates";
    pub const ELEVATION: &str = "Field elevation";
    pub const LOCATION: &str = "Location";
}

/// Field values resolved so far; `None` means unresolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    pub identifier: Option<String>,
    pub iata: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub municipality: Option<String>,
    pub region: Option<String>,
    pub elevation_ft: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl PartialRecord {
    /// Fills every unresolved field from `other`; resolved fields are kept
    pub fn fill_from(&mut self, other: PartialRecord) {
        fill(&mut self.identifier, other.identifier);
        fill(&mut self.iata, other.iata);
        fill(&mut self.name, other.name);
        fill(&mut self.category, other.category);
        fill(&mut self.municipality, other.municipality);
        fill(&mut self.region, other.region);
        fill(&mut self.elevation_ft, other.elevation_ft);
        fill(&mut self.latitude, other.latitude);
        fill(&mut self.longitude, other.longitude);
    }

    /// Number of resolved fields
    pub fn resolved_count(&self) -> usize {
        [
            &self.identifier,
            &self.iata,
            &self.name,
            &self.category,
            &self.municipality,
            &self.region,
            &self.elevation_ft,
            &self.latitude,
            &self.longitude,
        ]
        .iter()
        .filter(|field| field.is_some())
        .count()
    }

    /// Finalizes into a record, applying sentinels to unresolved fields
    pub fn into_record(self, source_url: &str) -> Record {
        let mut record = Record::unresolved(source_url);
        let assign = |slot: &mut String, value: Option<String>| {
            if let Some(value) = value {
                *slot = value;
            }
        };
        assign(&mut record.identifier, self.identifier);
        assign(&mut record.iata, self.iata);
        assign(&mut record.name, self.name);
        assign(&mut record.category, self.category);
        assign(&mut record.municipality, self.municipality);
        assign(&mut record.region, self.region);
        assign(&mut record.elevation_ft, self.elevation_ft);
        assign(&mut record.latitude, self.latitude);
        assign(&mut record.longitude, self.longitude);
        record
    }

    fn set_coordinates(&mut self, raw: &str) {
        if let Some((lat, lon)) = parse_coordinates(raw) {
            self.latitude = Some(lat);
            self.longitude = Some(lon);
        }
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Parsed detail page shared by every strategy
pub struct DetailPage {
    document: Html,
    flat_text: String,
}

impl DetailPage {
    pub fn parse(content: &str) -> Self {
        let document = Html::parse_document(content);
        let flat_text = {
            let body = document
                .select(&BODY_SELECTOR)
                .next()
                .unwrap_or_else(|| document.root_element());
            collapse_whitespace(&body.text().collect::<String>())
        };
        Self {
            document,
            flat_text,
        }
    }

    /// Whole-page text with whitespace runs collapsed to single spaces
    pub fn flat_text(&self) -> &str {
        &self.flat_text
    }
}

/// One extraction strategy
pub type Strategy = fn(&DetailPage) -> PartialRecord;

/// Strategies in priority order
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("structured-data", structured_data),
    ("label-proximity", label_proximity),
    ("text-pattern", text_pattern),
    ("heading", heading),
];

/// Extracts a normalized record from a detail page
///
/// # Example
///
/// ```
/// use airport_harvest::crawler::extract_detail;
///
/// let html = r#"<html><body><h1>Test Field (ZZZZ)</h1>
///     <dl><dt>ICAO code</dt><dd>ZZZZ</dd></dl></body></html>"#;
/// let record = extract_detail(html, "https://ourairports.com/airports/ZZZZ/");
/// assert_eq!(record.identifier, "ZZZZ");
/// assert_eq!(record.name, "Test Field");
/// ```
pub fn extract_detail(content: &str, source_url: &str) -> Record {
    let page = DetailPage::parse(content);
    let mut resolved = PartialRecord::default();

    for (name, strategy) in STRATEGIES {
        let before = resolved.resolved_count();
        resolved.fill_from(strategy(&page));
        tracing::trace!(
            "{} resolved {} fields for {}",
            name,
            resolved.resolved_count() - before,
            source_url
        );
    }

    resolved.into_record(source_url)
}

/// Strategy 1: the embedded JSON-LD block
pub fn structured_data(page: &DetailPage) -> PartialRecord {
    let mut partial = PartialRecord::default();

    let Some(script) = page.document.select(&JSON_LD_SELECTOR).next() else {
        return partial;
    };
    let raw = script.text().collect::<String>();
    let json: Value = match serde_json::from_str(raw.trim()) {
        Ok(json) => json,
        Err(e) => {
            tracing::debug!("Ignoring unparsable structured data: {}", e);
            return partial;
        }
    };

    // A top-level array describes several entities; the first object is the page's
    let entity = match &json {
        Value::Array(items) => items.iter().find(|item| item.is_object()),
        Value::Object(_) => Some(&json),
        _ => None,
    };
    let Some(entity) = entity else {
        return partial;
    };

    partial.name = json_text(entity.get("name"));
    partial.identifier = json_text(entity.get("icaoCode"));
    partial.iata = json_text(entity.get("iataCode"));

    if let Some(geo) = entity.get("geo") {
        partial.latitude = json_text(geo.get("latitude"));
        partial.longitude = json_text(geo.get("longitude"));
    }

    if let Some(address) = entity.get("address") {
        partial.municipality = json_text(address.get("addressLocality"));
        partial.region = json_text(address.get("addressRegion"));
    }

    partial.category = json_text(entity.get("description"))
        .and_then(|description| non_empty(description.split(" in ").next().unwrap_or_default()));

    partial
}

/// Strategy 2: value in the sibling following a label element
pub fn label_proximity(page: &DetailPage) -> PartialRecord {
    let mut partial = PartialRecord {
        iata: label_value(&page.document, labels::IATA),
        identifier: label_value(&page.document, labels::ICAO),
        category: label_value(&page.document, labels::FACILITY),
        ..PartialRecord::default()
    };

    if let Some(raw) = label_value(&page.document, labels::COORDINATES) {
        partial.set_coordinates(&raw);
    }

    partial.elevation_ft =
        label_value(&page.document, labels::ELEVATION).and_then(|raw| parse_elevation(&raw));

    if let Some(raw) = label_value(&page.document, labels::LOCATION) {
        let (municipality, region) = split_location(&raw);
        partial.municipality = municipality;
        partial.region = region;
    }

    partial
}

/// Strategy 3: label + value patterns over the flattened page text
pub fn text_pattern(page: &DetailPage) -> PartialRecord {
    let text = page.flat_text();
    let mut partial = PartialRecord {
        iata: capture(&TEXT_IATA, text),
        identifier: capture(&TEXT_ICAO, text),
        category: capture(&TEXT_FACILITY, text),
        elevation_ft: capture(&TEXT_ELEVATION, text),
        ..PartialRecord::default()
    };

    if let Some(raw) = capture(&TEXT_COORDINATES, text) {
        partial.set_coordinates(&raw);
    }

    partial
}

/// Strategy 4: the primary heading, up to the first parenthesis
pub fn heading(page: &DetailPage) -> PartialRecord {
    let name = page.document.select(&H1_SELECTOR).next().and_then(|h1| {
        let text = collapse_whitespace(&h1.text().collect::<String>());
        non_empty(text.split('(').next().unwrap_or_default())
    });

    PartialRecord {
        name,
        ..PartialRecord::default()
    }
}

/// Finds the first label element matching `label` whose next element
/// sibling is a `dd` or `td`, and returns that sibling's text
fn label_value(document: &Html, label: &str) -> Option<String> {
    let needle = label.to_lowercase();

    document
        .select(&LABEL_SELECTOR)
        .filter(|element| {
            let text = collapse_whitespace(&element.text().collect::<String>());
            text.len() <= MAX_LABEL_LEN && text.to_lowercase().contains(&needle)
        })
        .find_map(|element| {
            let sibling = element.next_siblings().find_map(ElementRef::wrap)?;
            if !matches!(sibling.value().name(), "dd" | "td") {
                return None;
            }
            non_empty(&collapse_whitespace(&sibling.text().collect::<String>()))
        })
}

/// Splits `lat, lon` into its two decimal parts
pub fn parse_coordinates(raw: &str) -> Option<(String, String)> {
    let captures = COORDINATE_PAIR.captures(raw)?;
    Some((
        captures.get(1)?.as_str().to_string(),
        captures.get(2)?.as_str().to_string(),
    ))
}

/// Keeps the digit run before `ft`, or the leading digits
pub fn parse_elevation(raw: &str) -> Option<String> {
    ELEVATION_FT
        .captures(raw)
        .or_else(|| LEADING_DIGITS.captures(raw.trim()))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Splits a combined location on its first comma into (municipality, region)
pub fn split_location(raw: &str) -> (Option<String>, Option<String>) {
    match raw.split_once(',') {
        Some((municipality, region)) => (non_empty(municipality), non_empty(region)),
        None => (non_empty(raw), None),
    }
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

/// Stringifies a JSON scalar; empty strings and non-scalars are unresolved
fn json_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
