use serde::Deserialize;

/// Main configuration structure for schoolscrape
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    pub delay: DelayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub vpn: VpnConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

/// Queue and downloader behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Site root that every target URL is built from
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Dequeue attempts allowed per query before a transient failure is final
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Shuffle the queue once at construction
    #[serde(default)]
    pub randomize: bool,

    /// Cap on the number of queries scheduled per run
    #[serde(default)]
    pub limit: Option<usize>,

    /// Referer header sent with page loads
    #[serde(default)]
    pub referer: Option<String>,

    /// Queries resolved successfully within this many days are not rescheduled
    #[serde(rename = "refresh-days", default = "default_refresh_days")]
    pub refresh_days: u32,

    /// Push nearby schools found on detail pages back onto the queue
    #[serde(rename = "follow-nearby", default)]
    pub follow_nearby: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            attempts: default_attempts(),
            randomize: false,
            limit: None,
            referer: None,
            refresh_days: default_refresh_days(),
            follow_nearby: false,
        }
    }
}

/// How the delayer picks the wait between two navigations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayMethod {
    Fixed,
    Random,
}

/// Rate delay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DelayConfig {
    pub method: DelayMethod,

    /// Wait used by the fixed method (seconds)
    #[serde(rename = "wait-secs", default)]
    pub wait_secs: Option<f64>,

    /// Lower bound used by the random method (seconds)
    #[serde(rename = "min-secs", default)]
    pub min_secs: Option<f64>,

    /// Upper bound used by the random method (seconds)
    #[serde(rename = "max-secs", default)]
    pub max_secs: Option<f64>,
}

/// HTTP session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Total request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Retries for 500/502/504 responses and timeouts
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base backoff between retries (milliseconds), doubled per retry
    #[serde(rename = "backoff-ms", default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// User agents cycled through on every session reset
    #[serde(rename = "user-agents", default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
            user_agents: default_user_agents(),
        }
    }
}

/// VPN rotation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VpnConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Reconnect attempts available for the whole run
    #[serde(rename = "max-rotations", default = "default_max_rotations")]
    pub max_rotations: u32,

    /// Longest time to wait for a reconnect (seconds)
    #[serde(rename = "timeout-secs", default = "default_vpn_timeout_secs")]
    pub timeout_secs: u64,

    /// Egress servers cycled through on each rotation
    #[serde(default)]
    pub servers: Vec<String>,

    /// Command that connects; `{server}` is replaced by the chosen server
    #[serde(default)]
    pub connect: Vec<String>,

    /// Command that disconnects
    #[serde(default)]
    pub disconnect: Vec<String>,
}

impl Default for VpnConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_rotations: default_max_rotations(),
            timeout_secs: default_vpn_timeout_secs(),
            servers: Vec::new(),
            connect: Vec::new(),
            disconnect: Vec::new(),
        }
    }
}

/// Reference tables consumed by the scheduler
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Zipcode table driving the links stage
    pub zipcodes: String,

    /// Link table (exported links dataset) driving the schools and boundaries stages
    pub links: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite cache database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving one CSV per dataset on export
    #[serde(rename = "export-dir")]
    pub export_dir: String,
}

fn default_base_url() -> String {
    "https://www.greatschools.org".to_string()
}

fn default_attempts() -> u32 {
    3
}

fn default_refresh_days() -> u32 {
    30
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    300
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
    ]
}

fn default_max_rotations() -> u32 {
    5
}

fn default_vpn_timeout_secs() -> u64 {
    120
}
