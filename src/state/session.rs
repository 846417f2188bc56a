//! Mutable state of a single crawl session
//!
//! The coordinator owns the one `CrawlSession`; the batcher and the
//! extraction step receive it by reference. The `active` flag is the only
//! piece shared beyond that, so cancellation can be requested from another
//! task and observed at chunk and page boundaries.

use crate::state::{CrawlState, DedupIndex, Record};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, polled at suspension boundaries
///
/// Besides the per-session active bit it carries an interrupt latch. Once
/// latched, the flag can no longer be switched on, so no later session runs.
#[derive(Debug, Clone, Default)]
pub struct ActiveFlag {
    active: Arc<AtomicBool>,
    interrupted: Arc<AtomicBool>,
}

impl ActiveFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that starts switched on, for fetches outside a session
    pub fn activated() -> Self {
        let flag = Self::new();
        flag.set(true);
        flag
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Switching on is refused once the interrupt latch is set
    pub(crate) fn set(&self, active: bool) {
        self.active
            .store(active && !self.is_interrupted(), Ordering::SeqCst);
    }

    /// Returns a handle that can only switch the flag off
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.clone())
    }
}

/// Requests cancellation of the running session from anywhere
///
/// Cancellation is advisory: in-flight fetches of the current chunk drain,
/// no further chunk or page starts.
#[derive(Debug, Clone)]
pub struct CancelHandle(ActiveFlag);

impl CancelHandle {
    /// Stops the running session; a later start runs normally
    pub fn cancel(&self) {
        self.0.set(false);
    }

    /// Stops the running session and every later one
    ///
    /// Used for process shutdown, where the request may arrive before the
    /// session has started.
    pub fn interrupt(&self) {
        self.0.interrupted.store(true, Ordering::SeqCst);
        self.0.set(false);
    }

    pub fn is_cancelled(&self) -> bool {
        !self.0.is_active()
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.is_interrupted()
    }
}

/// Read-only view of a session for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: CrawlState,
    pub active: bool,
    pub pages_scanned: u64,
    pub details_scanned: u64,
    pub errors: u64,
    /// Label of the gateway the next request will use
    pub current_gateway: String,
    pub result_count: usize,
}

/// Run state of the crawl in progress
#[derive(Debug, Default)]
pub struct CrawlSession {
    state: CrawlState,
    active: ActiveFlag,
    current_url: Option<String>,
    pages_scanned: u64,
    details_scanned: u64,
    errors: u64,
    results: Vec<Record>,
    seen: DedupIndex,
}

impl CrawlSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every counter and collection and activates the session
    pub(crate) fn begin(&mut self, entry_url: &str) {
        self.results.clear();
        self.seen.reset();
        self.pages_scanned = 0;
        self.details_scanned = 0;
        self.errors = 0;
        self.current_url = Some(entry_url.to_string());
        self.state = CrawlState::Active;
        self.active.set(true);
    }

    /// Deactivates the session and records how it ended
    pub(crate) fn finish(&mut self, state: CrawlState) {
        self.active.set(false);
        self.state = state;
    }

    /// Replaces results with a reloaded set and claims their identifiers
    pub(crate) fn restore(&mut self, records: Vec<Record>) {
        self.seen
            .extend(records.iter().map(|record| record.identifier.as_str()));
        self.results = records;
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn active_flag(&self) -> &ActiveFlag {
        &self.active
    }

    pub fn is_active(&self) -> bool {
        self.active.is_active()
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub(crate) fn set_current_url(&mut self, url: Option<String>) {
        self.current_url = url;
    }

    pub fn pages_scanned(&self) -> u64 {
        self.pages_scanned
    }

    pub fn details_scanned(&self) -> u64 {
        self.details_scanned
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn results(&self) -> &[Record] {
        &self.results
    }

    pub fn seen(&self) -> &DedupIndex {
        &self.seen
    }

    pub(crate) fn seen_mut(&mut self) -> &mut DedupIndex {
        &mut self.seen
    }

    pub(crate) fn record_page(&mut self) {
        self.pages_scanned += 1;
    }

    pub(crate) fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Appends a finished record; each one counts as a scanned detail page
    pub(crate) fn append_record(&mut self, record: Record) {
        self.details_scanned += 1;
        self.results.push(record);
    }

    pub fn snapshot(&self, current_gateway: &str) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            active: self.is_active(),
            pages_scanned: self.pages_scanned,
            details_scanned: self.details_scanned,
            errors: self.errors,
            current_gateway: current_gateway.to_string(),
            result_count: self.results.len(),
        }
    }
}
