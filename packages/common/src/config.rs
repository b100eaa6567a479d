use serde::Deserialize;

/// Stats-service (Bungie API) configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct BungieConfig {
    /// API key sent as `X-API-Key`. Required; an empty key is a startup error.
    #[serde(default)]
    pub api_key: String,
    /// Platform root. Default: "https://www.bungie.net/Platform".
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout. Default: 30.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Activity mode filter for history listings. Default: 82 (dungeons).
    #[serde(default = "default_activity_mode")]
    pub activity_mode: u32,
    /// Activities requested per history page. Default: 50.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// History pages scanned per character. Default: 1.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_base_url() -> String {
    "https://www.bungie.net/Platform".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_activity_mode() -> u32 {
    82
}
fn default_page_size() -> u32 {
    50
}
fn default_max_pages() -> u32 {
    1
}

impl Default for BungieConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            activity_mode: default_activity_mode(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

/// Race monitor configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Seconds between poll passes. Default: 3600.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Run a pass immediately at startup. Default: true.
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,
    /// Allowed gap between a player's time in activity and the run duration. Default: 30.
    #[serde(default = "default_presence_tolerance_secs")]
    pub presence_tolerance_secs: u64,
    /// Days a locked team channel is kept before deletion. Default: 2.
    #[serde(default = "default_lock_grace_days")]
    pub lock_grace_days: u32,
    /// Log filter directive. Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_interval_secs() -> u64 {
    3600
}
fn default_run_on_start() -> bool {
    true
}
fn default_presence_tolerance_secs() -> u64 {
    30
}
fn default_lock_grace_days() -> u32 {
    2
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_on_start: default_run_on_start(),
            presence_tolerance_secs: default_presence_tolerance_secs(),
            lock_grace_days: default_lock_grace_days(),
            log_level: default_log_level(),
        }
    }
}

/// Filesystem locations for persisted and published state.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding one `{guild_id}.json` per guild. Default: "./data/guilds".
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Directory receiving rendered standings. Default: "./data/published".
    #[serde(default = "default_publish_dir")]
    pub publish_dir: String,
}

fn default_state_dir() -> String {
    "./data/guilds".into()
}
fn default_publish_dir() -> String {
    "./data/published".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            publish_dir: default_publish_dir(),
        }
    }
}
