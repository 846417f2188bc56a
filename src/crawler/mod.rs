//! Crawler module for directory harvesting
//!
//! This module contains the core harvesting logic, including:
//! - Gateway templates and their rotation
//! - HTTP fetching with retry logic
//! - Listing and detail page extraction
//! - Chunked, bounded-parallel detail processing
//! - Overall session coordination

mod batcher;
mod coordinator;
mod detail;
mod fetcher;
mod gateway;
mod listing;

pub use batcher::{reconcile_identifier, BatchReport, BatchSettings, Batcher};
pub use coordinator::{ControllerSettings, Coordinator};
pub use detail::{
    extract_detail, parse_coordinates, parse_elevation, split_location, DetailPage,
    PartialRecord, Strategy, STRATEGIES,
};
pub use fetcher::{
    build_http_client, unwrap_envelope, FetchClient, FetchError, RetrySettings, MIN_BODY_LEN,
};
pub use gateway::{GatewayRotator, GatewayTemplate};
pub use listing::{extract_listing, ListingPage, ListingRules};

