//! Crawler coordinator - the session state machine
//!
//! This module owns the one crawl session and drives it through
//! `Idle -> Active -> Complete | Aborted`:
//! - Validating and starting a session
//! - Walking listing pages until pagination ends or the session is cancelled
//! - Handing each page's new targets to the batcher
//! - Restoring a cached result set on startup
//! - Exposing snapshots and the ordered records for export

use crate::config::{Config, CrawlerConfig, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::crawler::batcher::{BatchSettings, Batcher};
use crate::crawler::fetcher::{build_http_client, FetchClient, RetrySettings};
use crate::crawler::gateway::GatewayRotator;
use crate::crawler::listing::{extract_listing, ListingRules};
use crate::output::{CrawlObserver, LogObserver};
use crate::state::{CancelHandle, CrawlSession, CrawlState, Record, SessionSnapshot};
use crate::storage::{KeyValueStore, ResumableStore};
use crate::{ConfigError, HarvestError};
use std::time::Duration;
use url::Url;

/// Pacing and width settings the controller applies to every session
#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    /// Chunk width used when a start request asks for an out-of-range one
    pub default_concurrency: usize,

    pub politeness_min: Duration,
    pub politeness_max: Duration,

    /// Pause between listing pages
    pub page_delay: Duration,
}

impl From<&CrawlerConfig> for ControllerSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            default_concurrency: config.concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            politeness_min: Duration::from_millis(config.politeness_min_ms),
            politeness_max: Duration::from_millis(config.politeness_max_ms),
            page_delay: config.page_delay(),
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<S> {
    client: FetchClient,
    rules: ListingRules,
    store: ResumableStore<S>,
    observer: Box<dyn CrawlObserver>,
    session: CrawlSession,
    settings: ControllerSettings,
}

impl<S: KeyValueStore> Coordinator<S> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated harvester configuration
    /// * `store` - Where the result set is cached between chunks
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to restore or start a session
    /// * `Err(HarvestError)` - The HTTP client, gateways or listing rules
    ///   could not be built
    pub fn new(config: &Config, store: ResumableStore<S>) -> Result<Self, HarvestError> {
        let http = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        let rotator = GatewayRotator::from_entries(&config.gateways)
            .ok_or_else(|| ConfigError::InvalidGateway("no gateways configured".to_string()))?;
        let client = FetchClient::new(http, rotator, RetrySettings::from(&config.crawler));
        let rules = ListingRules::new(&config.directory.record_path_prefix)?;

        Ok(Self::from_parts(
            client,
            rules,
            store,
            ControllerSettings::from(&config.crawler),
        ))
    }

    /// Assembles a coordinator from already-built parts
    pub fn from_parts(
        client: FetchClient,
        rules: ListingRules,
        store: ResumableStore<S>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            client,
            rules,
            store,
            observer: Box::new(LogObserver),
            session: CrawlSession::new(),
            settings,
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn CrawlObserver>) {
        self.observer = observer;
    }

    pub fn with_observer(mut self, observer: Box<dyn CrawlObserver>) -> Self {
        self.set_observer(observer);
        self
    }

    /// Reloads a cached result set into the idle session
    ///
    /// Restored identifiers are claimed in the dedup index and every record
    /// is replayed to the observer. Returns the number of restored records.
    pub fn restore_cached(&mut self) -> usize {
        if self.session.is_active() {
            tracing::warn!("Cannot restore cached results while a session is running");
            return 0;
        }

        let records = self.store.reload();
        for record in &records {
            self.observer.on_record(record);
        }

        let count = records.len();
        self.session.restore(records);
        if count > 0 {
            self.observer.on_export_ready(count);
        }
        count
    }

    /// Runs a session from `entry_url` to its terminal state
    ///
    /// An empty or unusable entry URL is rejected without touching the
    /// session. Starting while a session is active is a no-op that reports
    /// the current state. A failed listing fetch ends the session as
    /// `Aborted`; results gathered so far are kept either way.
    pub async fn start(
        &mut self,
        entry_url: &str,
        concurrency: usize,
    ) -> Result<CrawlState, HarvestError> {
        let entry_url = entry_url.trim();
        if entry_url.is_empty() {
            return Err(HarvestError::Validation(
                "no entry URL supplied".to_string(),
            ));
        }

        let entry = Url::parse(entry_url).map_err(|e| {
            HarvestError::Validation(format!("entry URL '{}' is invalid: {}", entry_url, e))
        })?;
        if entry.scheme() != "http" && entry.scheme() != "https" {
            return Err(HarvestError::Validation(format!(
                "entry URL must use http or https: {}",
                entry_url
            )));
        }

        if self.session.is_active() || !self.session.state().can_start() {
            tracing::warn!("A session is already running, ignoring start request");
            return Ok(self.session.state());
        }

        if self.session.active_flag().is_interrupted() {
            tracing::warn!("Interrupted before the session started, nothing fetched");
            return Ok(self.session.state());
        }

        let chunk_size = self.resolve_concurrency(concurrency);
        tracing::info!(
            "Starting session at {} ({} concurrent, {} gateways)",
            entry,
            chunk_size,
            self.client.rotator().len()
        );

        self.session.begin(entry.as_str());
        self.store.clear();

        let state = self.run_pages(chunk_size).await;
        self.session.finish(state);

        let snapshot = self.snapshot();
        self.observer.on_progress(&snapshot);
        tracing::info!(
            "Session {}: {} records, {} pages, {} details, {} errors",
            state,
            snapshot.result_count,
            snapshot.pages_scanned,
            snapshot.details_scanned,
            snapshot.errors
        );

        if snapshot.result_count > 0 {
            self.observer.on_export_ready(snapshot.result_count);
        }

        Ok(state)
    }

    /// The per-page loop; returns the state the session ends in
    async fn run_pages(&mut self, chunk_size: usize) -> CrawlState {
        let batch_settings = BatchSettings {
            chunk_size,
            politeness_min: self.settings.politeness_min,
            politeness_max: self.settings.politeness_max,
        };

        while let Some(page_url) = self.session.current_url().map(str::to_string) {
            if !self.session.is_active() {
                tracing::info!("Session cancelled before {}", page_url);
                return CrawlState::Aborted;
            }

            let base_url = match Url::parse(&page_url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!("Listing URL {} is unusable: {}", page_url, e);
                    return CrawlState::Aborted;
                }
            };

            let active = self.session.active_flag().clone();
            let content = match self.client.fetch(&page_url, &active).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::error!("Critical failure on listing {}: {}", page_url, e);
                    return CrawlState::Aborted;
                }
            };

            let page = extract_listing(&content, &base_url, &self.rules, self.session.seen_mut());
            self.session.record_page();
            tracing::info!(
                "Page {}: {} new targets",
                self.session.pages_scanned(),
                page.targets.len()
            );
            self.observer
                .on_progress(&self.session.snapshot(&self.client.gateway_label()));

            if !page.targets.is_empty() {
                let mut batcher = Batcher::new(
                    &self.client,
                    &mut self.store,
                    self.observer.as_ref(),
                    batch_settings,
                );
                let report = batcher.run(page.targets, &mut self.session).await;
                tracing::debug!(
                    "Page {} batches: {} chunks, {} harvested, {} failed",
                    self.session.pages_scanned(),
                    report.chunks,
                    report.succeeded,
                    report.failed
                );
            }

            let has_next = page.next.is_some();
            self.session.set_current_url(page.next);

            if has_next && self.session.is_active() {
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }

        if self.session.is_active() {
            CrawlState::Complete
        } else {
            CrawlState::Aborted
        }
    }

    fn resolve_concurrency(&self, requested: usize) -> usize {
        if (MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&requested) {
            requested
        } else {
            tracing::warn!(
                "Concurrency {} outside {}..={}, using {}",
                requested,
                MIN_CONCURRENCY,
                MAX_CONCURRENCY,
                self.settings.default_concurrency
            );
            self.settings.default_concurrency
        }
    }

    /// Requests cooperative cancellation of the running session
    pub fn cancel(&self) {
        if self.session.is_active() {
            tracing::info!("Cancellation requested");
        }
        self.cancel_handle().cancel();
    }

    /// Returns a handle that can cancel this coordinator's sessions from
    /// another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.session.active_flag().cancel_handle()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot(&self.client.gateway_label())
    }

    /// Records in discovery order
    pub fn export_records(&self) -> &[Record] {
        self.session.results()
    }

    pub fn session(&self) -> &CrawlSession {
        &self.session
    }

    pub fn store(&self) -> &ResumableStore<S> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DirectoryConfig, OutputConfig, UserAgentConfig};
    use crate::storage::{MemoryStore, RESULTS_KEY};

    fn create_test_config() -> Config {
        Config {
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "TestHarvester".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            directory: DirectoryConfig::default(),
            output: OutputConfig {
                database_path: "./test.db".to_string(),
                json_path: "./test.json".to_string(),
                csv_path: "./test.csv".to_string(),
            },
            gateways: crate::config::default_gateways(),
        }
    }

    fn coordinator() -> Coordinator<MemoryStore> {
        Coordinator::new(&create_test_config(), ResumableStore::new(MemoryStore::new())).unwrap()
    }

    fn record(identifier: &str) -> Record {
        let mut record = Record::unresolved(&format!("https://ourairports.com/airports/{}/", identifier));
        record.identifier = identifier.to_string();
        record
    }

    #[test]
    fn test_coordinator_creation() {
        let coordinator = coordinator();
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, CrawlState::Idle);
        assert!(!snapshot.active);
        assert_eq!(snapshot.current_gateway, "GW-1");
        assert!(coordinator.export_records().is_empty());
    }

    #[test]
    fn test_no_gateways_is_config_error() {
        let mut config = create_test_config();
        config.gateways.clear();
        let result = Coordinator::new(&config, ResumableStore::new(MemoryStore::new()));
        assert!(matches!(
            result,
            Err(HarvestError::Config(ConfigError::InvalidGateway(_)))
        ));
    }

    #[tokio::test]
    async fn test_start_rejects_empty_url() {
        let mut coordinator = coordinator();
        let result = coordinator.start("   ", 5).await;
        assert!(matches!(result, Err(HarvestError::Validation(_))));
        assert_eq!(coordinator.session().state(), CrawlState::Idle);
    }

    #[tokio::test]
    async fn test_start_rejects_non_http_url() {
        let mut coordinator = coordinator();
        assert!(matches!(
            coordinator.start("ftp://ourairports.com/", 5).await,
            Err(HarvestError::Validation(_))
        ));
        assert!(matches!(
            coordinator.start("not a url", 5).await,
            Err(HarvestError::Validation(_))
        ));
        assert_eq!(coordinator.session().state(), CrawlState::Idle);
    }

    #[tokio::test]
    async fn test_rejected_start_keeps_restored_results() {
        let mut store = ResumableStore::new(MemoryStore::new());
        store.persist(&[record("KSEA")]);
        let mut coordinator = Coordinator::new(&create_test_config(), store).unwrap();
        assert_eq!(coordinator.restore_cached(), 1);

        let result = coordinator.start("", 5).await;

        assert!(result.is_err());
        assert_eq!(coordinator.export_records().len(), 1);
    }

    #[test]
    fn test_restore_cached_claims_identifiers() {
        let mut store = ResumableStore::new(MemoryStore::new());
        store.persist(&[record("KSEA"), record("KPDX")]);

        let mut coordinator = Coordinator::new(&create_test_config(), store).unwrap();
        assert_eq!(coordinator.restore_cached(), 2);
        assert_eq!(coordinator.export_records()[0].identifier, "KSEA");
        assert!(coordinator.session().seen().contains("KPDX"));
        assert_eq!(coordinator.snapshot().result_count, 2);
    }

    #[test]
    fn test_restore_cached_with_corrupted_blob() {
        let mut backend = MemoryStore::new();
        backend.set(RESULTS_KEY, "{not json").unwrap();

        let mut coordinator =
            Coordinator::new(&create_test_config(), ResumableStore::new(backend)).unwrap();
        assert_eq!(coordinator.restore_cached(), 0);
        assert_eq!(coordinator.store().backend().get(RESULTS_KEY).unwrap(), None);
    }

    #[test]
    fn test_resolve_concurrency() {
        let coordinator = coordinator();
        assert_eq!(coordinator.resolve_concurrency(1), 1);
        assert_eq!(coordinator.resolve_concurrency(50), 50);
        assert_eq!(coordinator.resolve_concurrency(0), 5);
        assert_eq!(coordinator.resolve_concurrency(51), 5);
    }

    #[test]
    fn test_cancel_handle_shares_flag() {
        let coordinator = coordinator();
        let handle = coordinator.cancel_handle();
        coordinator.cancel();
        assert!(handle.is_cancelled());
        assert!(!coordinator.session().is_active());
    }

    #[tokio::test]
    async fn test_interrupt_before_start_is_kept() {
        let mut store = ResumableStore::new(MemoryStore::new());
        store.persist(&[record("KSEA")]);
        let mut coordinator = Coordinator::new(&create_test_config(), store).unwrap();
        coordinator.restore_cached();
        coordinator.cancel_handle().interrupt();

        // Port 9 is never contacted: the session must not begin.
        let state = coordinator.start("http://127.0.0.1:9/airports/", 5).await.unwrap();

        assert_eq!(state, CrawlState::Idle);
        assert!(!coordinator.session().is_active());
        assert_eq!(coordinator.snapshot().pages_scanned, 0);
        assert_eq!(coordinator.export_records().len(), 1);
        assert!(coordinator.store().backend().get(RESULTS_KEY).unwrap().is_some());
    }
}
