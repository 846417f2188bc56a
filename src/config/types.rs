use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Airport-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    pub output: OutputConfig,
    /// Gateway templates, tried in order and rotated on failure
    #[serde(default = "default_gateways", rename = "gateway")]
    pub gateways: Vec<GatewayEntry>,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Listing page the crawl starts from when none is given on the command line
    #[serde(rename = "entry-url", default)]
    pub entry_url: Option<String>,

    /// Number of detail pages fetched concurrently per chunk
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per fetch before giving up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Linear backoff unit: attempt n waits n times this value (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Lower bound of the randomized pause between chunks (milliseconds)
    #[serde(rename = "politeness-min-ms", default = "default_politeness_min_ms")]
    pub politeness_min_ms: u64,

    /// Upper bound of the randomized pause between chunks (milliseconds)
    #[serde(rename = "politeness-max-ms", default = "default_politeness_max_ms")]
    pub politeness_max_ms: u64,

    /// Pause between listing pages (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            entry_url: None,
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            request_timeout_ms: default_request_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            politeness_min_ms: default_politeness_min_ms(),
            politeness_max_ms: default_politeness_max_ms(),
            page_delay_ms: default_page_delay_ms(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Shape of the directory being harvested
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Path prefix shared by every record link, e.g. "/airports/"
    #[serde(rename = "record-path-prefix", default = "default_record_path_prefix")]
    pub record_path_prefix: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            record_path_prefix: default_record_path_prefix(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding the resumable session
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path of the JSON export
    #[serde(rename = "json-path")]
    pub json_path: String,

    /// Path of the CSV export
    #[serde(rename = "csv-path")]
    pub csv_path: String,
}

/// One gateway template entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayEntry {
    /// URL template containing `{url}` (percent-encoded target) or `{raw}`
    pub template: String,

    /// How the gateway wraps the target's body
    #[serde(default)]
    pub envelope: EnvelopeKind,
}

/// Response wrapping used by a gateway
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeKind {
    /// The body is the target's content as-is
    #[default]
    Raw,
    /// The body is a JSON object whose `contents` field holds the content
    JsonContents,
}

fn default_concurrency() -> usize {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_politeness_min_ms() -> u64 {
    500
}

fn default_politeness_max_ms() -> u64 {
    1_500
}

fn default_page_delay_ms() -> u64 {
    1_000
}

fn default_record_path_prefix() -> String {
    "/airports/".to_string()
}

/// The public gateways used when the configuration names none
pub fn default_gateways() -> Vec<GatewayEntry> {
    vec![
        GatewayEntry {
            template: "https://corsproxy.io/?{url}".to_string(),
            envelope: EnvelopeKind::Raw,
        },
        GatewayEntry {
            template: "https://api.allorigins.win/raw?url={url}".to_string(),
            envelope: EnvelopeKind::Raw,
        },
        GatewayEntry {
            template: "https://api.allorigins.win/get?url={url}".to_string(),
            envelope: EnvelopeKind::JsonContents,
        },
    ]
}
