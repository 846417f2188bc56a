//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlSession`: counters, results and the cancellation flag of the running session
//! - `CrawlState`: lifecycle of a session (idle, active, complete, aborted)
//! - `DedupIndex`: identifiers already claimed this session
//! - `Record` / `Target`: what the crawler discovers and produces

mod crawl_state;
mod dedup;
mod record;
mod session;

// Re-export main types
pub use crawl_state::CrawlState;
pub use dedup::DedupIndex;
pub use record::{Record, Target, UNKNOWN_IDENTIFIER, UNKNOWN_TEXT};
pub use session::{ActiveFlag, CancelHandle, CrawlSession, SessionSnapshot};
