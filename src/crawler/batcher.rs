//! Chunked, bounded-parallel processing of a listing page's targets
//!
//! Targets are cut into consecutive chunks of the configured width. All
//! members of a chunk are fetched and extracted concurrently; their
//! outcomes are merged into the session only once every member has
//! finished, in discovery order. A failing member costs one error count and
//! never disturbs its siblings.

use crate::crawler::detail::extract_detail;
use crate::crawler::fetcher::{FetchClient, FetchError};
use crate::output::CrawlObserver;
use crate::state::{ActiveFlag, CrawlSession, Record, Target};
use crate::storage::{KeyValueStore, ResumableStore};
use futures_util::future::join_all;
use rand::Rng;
use std::time::Duration;

/// Chunk width and inter-chunk pause
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    /// Targets processed concurrently per chunk
    pub chunk_size: usize,

    /// Lower bound of the randomized pause between chunks
    pub politeness_min: Duration,

    /// Upper bound of the randomized pause between chunks
    pub politeness_max: Duration,
}

impl BatchSettings {
    /// Picks a pause uniformly from the politeness window
    pub fn politeness_delay(&self) -> Duration {
        let min = self.politeness_min.as_millis() as u64;
        let max = (self.politeness_max.as_millis() as u64).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Tally of one `Batcher::run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub chunks: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs the fetch-extract-merge-persist cycle over a page's targets
pub struct Batcher<'a, S> {
    client: &'a FetchClient,
    store: &'a mut ResumableStore<S>,
    observer: &'a dyn CrawlObserver,
    settings: BatchSettings,
}

impl<'a, S: KeyValueStore> Batcher<'a, S> {
    pub fn new(
        client: &'a FetchClient,
        store: &'a mut ResumableStore<S>,
        observer: &'a dyn CrawlObserver,
        settings: BatchSettings,
    ) -> Self {
        Self {
            client,
            store,
            observer,
            settings,
        }
    }

    /// Processes `targets` chunk by chunk, stopping at a chunk boundary
    /// once the session is deactivated
    pub async fn run(&mut self, targets: Vec<Target>, session: &mut CrawlSession) -> BatchReport {
        let mut report = BatchReport::default();
        let chunk_size = self.settings.chunk_size.max(1);
        let total_chunks = targets.len().div_ceil(chunk_size);
        let client = self.client;

        for (index, chunk) in targets.chunks(chunk_size).enumerate() {
            if !session.is_active() {
                tracing::info!(
                    "Session inactive, skipping {} remaining chunks",
                    total_chunks - index
                );
                break;
            }

            let active = session.active_flag().clone();
            let outcomes = join_all(
                chunk
                    .iter()
                    .map(|target| harvest_target(client, target, &active)),
            )
            .await;

            for (target, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(record) => {
                        self.observer.on_record(&record);
                        session.append_record(record);
                        report.succeeded += 1;
                    }
                    Err(e) => {
                        tracing::error!("Failed {}: {}", target.identifier, e);
                        session.record_error();
                        report.failed += 1;
                    }
                }
            }
            report.chunks += 1;

            self.observer
                .on_progress(&session.snapshot(&client.gateway_label()));
            self.store.persist(session.results());

            if index + 1 < total_chunks && session.is_active() {
                tokio::time::sleep(self.settings.politeness_delay()).await;
            }
        }

        report
    }
}

/// Fetches and extracts one target
async fn harvest_target(
    client: &FetchClient,
    target: &Target,
    active: &ActiveFlag,
) -> Result<Record, FetchError> {
    let content = client.fetch(&target.url, active).await?;
    let mut record = extract_detail(&content, &target.url);
    reconcile_identifier(&mut record, &target.identifier);
    Ok(record)
}

/// Makes the listing identifier authoritative for the record
///
/// The listing identifier is what the dedup index claimed, so keeping it
/// keeps results unique even when a detail page reports another code.
pub fn reconcile_identifier(record: &mut Record, listing_identifier: &str) {
    if !record.has_unknown_identifier()
        && !record.identifier.eq_ignore_ascii_case(listing_identifier)
    {
        tracing::warn!(
            "Detail page of {} reports identifier {}, keeping listing identifier",
            listing_identifier,
            record.identifier
        );
    }
    record.identifier = listing_identifier.to_string();
}
