use serde::Deserialize;

/// Main configuration structure for Sumi-Spider
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// URLs the crawl starts from
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub frontier: FrontierConfig,

    /// Host allow-list applied to the default spider chain
    #[serde(default)]
    pub allow: Vec<AllowEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent fetch workers
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Minimum politeness delay between pages (seconds)
    #[serde(default)]
    pub sleep_min: u64,

    /// Maximum politeness delay between pages (seconds)
    #[serde(default)]
    pub sleep_max: u64,

    /// Per-request fetch timeout (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: u64,

    /// Capacity of the channel between fetch workers and the coordinator
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Largest page body the parser accepts (bytes)
    #[serde(default = "default_max_page_bytes")]
    pub max_page_bytes: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            sleep_min: 0,
            sleep_max: 0,
            fetch_timeout: default_fetch_timeout(),
            queue_capacity: default_queue_capacity(),
            max_page_bytes: default_max_page_bytes(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    pub crawler_name: String,
    pub crawler_version: String,
    pub contact_url: String,
    pub contact_email: String,

    /// Extra User-Agent strings used round-robin instead of the default
    #[serde(default)]
    pub rotate: Vec<String>,
}

impl UserAgentConfig {
    /// Formats the identifying User-Agent: `Name/Version (+ContactURL; ContactEmail)`
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Which store backs the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrontierBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Frontier store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FrontierConfig {
    #[serde(default)]
    pub backend: FrontierBackend,

    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Key prefix separating crawl sessions that share one store
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            backend: FrontierBackend::default(),
            database_path: default_database_path(),
            prefix: default_prefix(),
        }
    }
}

/// Allowed host pattern (e.g., "example.com" or "*.example.com")
#[derive(Debug, Clone, Deserialize)]
pub struct AllowEntry {
    pub domain: String,
}

fn default_concurrency() -> u32 {
    4
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    16
}

fn default_max_page_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_database_path() -> String {
    "./crawl.db".to_string()
}

fn default_prefix() -> String {
    "default".to_string()
}
