/// Harvested record types
///
/// A `Target` is what listing extraction discovers; a `Record` is what
/// detail extraction produces from it.
use serde::{Deserialize, Serialize};

/// Placeholder identifier used until a strategy or the listing supplies one
pub const UNKNOWN_IDENTIFIER: &str = "?";

/// Placeholder for unresolved descriptive fields (name, category, municipality)
pub const UNKNOWN_TEXT: &str = "Unknown";

/// A record discovered on a listing page, waiting for its detail fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Directory code taken from the record link
    pub identifier: String,

    /// Absolute URL of the detail page
    pub url: String,
}

/// A normalized record extracted from a detail page
///
/// Unresolved fields carry their sentinel: `"Unknown"` for name, category
/// and municipality, the empty string for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub identifier: String,
    pub iata: String,
    pub name: String,
    pub category: String,
    pub municipality: String,
    pub region: String,
    pub elevation_ft: String,
    pub latitude: String,
    pub longitude: String,
    pub source_url: String,
}

impl Record {
    /// Creates a record with every field set to its sentinel
    pub fn unresolved(source_url: &str) -> Self {
        Self {
            identifier: UNKNOWN_IDENTIFIER.to_string(),
            iata: String::new(),
            name: UNKNOWN_TEXT.to_string(),
            category: UNKNOWN_TEXT.to_string(),
            municipality: UNKNOWN_TEXT.to_string(),
            region: String::new(),
            elevation_ft: String::new(),
            latitude: String::new(),
            longitude: String::new(),
            source_url: source_url.to_string(),
        }
    }

    /// Returns true if no strategy resolved the identifier
    pub fn has_unknown_identifier(&self) -> bool {
        self.identifier == UNKNOWN_IDENTIFIER
    }

    /// Returns true if both coordinates are present
    pub fn has_coordinates(&self) -> bool {
        !self.latitude.is_empty() && !self.longitude.is_empty()
    }
}
