use serde::{Deserialize, Serialize};

/// Environment overrides, applied on top of the config file.
pub const ENV_DATABASE: &str = "CALLSTATS_DB";
pub const ENV_FEED_URL: &str = "CALLSTATS_FEED_URL";
pub const ENV_FEED_API_KEY: &str = "CALLSTATS_FEED_API_KEY";
pub const ENV_FEED_TIMEOUT_MS: &str = "CALLSTATS_FEED_TIMEOUT_MS";
pub const ENV_FEED_ENABLED: &str = "CALLSTATS_FEED_ENABLED";

const DEFAULT_FEED_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub endpoint: String,
    /// Feed credential. Handed by value to the feed client at construction.
    pub api_key: String,
    #[serde(default = "default_feed_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: String::new(),
            timeout_ms: DEFAULT_FEED_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub feed: FeedConfig,
}

impl EngineConfig {
    /// Load from a JSON config file, then apply environment overrides.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default_test().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup. Split out from `load` so the
    /// parsing can be tested without touching process environment.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        if let Some(db) = lookup(ENV_DATABASE) {
            self.database_path = db;
        }
        if let Some(url) = lookup(ENV_FEED_URL) {
            self.feed.endpoint = url;
        }
        if let Some(key) = lookup(ENV_FEED_API_KEY) {
            self.feed.api_key = key;
        }
        if let Some(ms) = lookup(ENV_FEED_TIMEOUT_MS) {
            self.feed.timeout_ms = ms
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{ENV_FEED_TIMEOUT_MS}={ms}: {e}"))?;
        }
        if let Some(flag) = lookup(ENV_FEED_ENABLED) {
            self.feed.enabled = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => anyhow::bail!("{ENV_FEED_ENABLED}={other}: expected true/false"),
            };
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feed.enabled {
            if self.feed.endpoint.trim().is_empty() {
                anyhow::bail!("feed is enabled but feed.endpoint is empty");
            }
            if self.feed.timeout_ms == 0 {
                anyhow::bail!("feed.timeout_ms must be > 0");
            }
        }
        Ok(())
    }

    /// In-memory database, feed disabled.
    pub fn default_test() -> Self {
        Self {
            database_path: default_database_path(),
            feed: FeedConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_feed_timeout_ms() -> u64 {
    DEFAULT_FEED_TIMEOUT_MS
}

fn default_database_path() -> String {
    ":memory:".into()
}
