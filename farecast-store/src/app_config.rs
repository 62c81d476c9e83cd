use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub fan_out: FanOutConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub cache_ttl: CacheTtlConfig,
    #[serde(default)]
    pub regions: RegionConfig,
    #[serde(default)]
    pub search: SearchDefaults,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When unset, results are cached in process memory
    pub redis_url: Option<String>,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, redis_url: None, max_entries: default_max_entries() }
    }
}

fn default_true() -> bool { true }
fn default_max_entries() -> u64 { 200 }

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn is_configured(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.client_id) && present(&self.client_secret)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { client_id: None, client_secret: None, timeout_ms: default_timeout_ms() }
    }
}

fn default_timeout_ms() -> u64 { 10_000 }

#[derive(Debug, Deserialize, Clone)]
pub struct FanOutConfig {
    /// Destinations searched when the request names none
    #[serde(default = "default_max_destinations")]
    pub max_destinations: usize,
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self { max_destinations: default_max_destinations(), max_concurrency: default_concurrency() }
    }
}

fn default_max_destinations() -> usize { 4 }
fn default_concurrency() -> usize { 2 }

#[derive(Debug, Deserialize, Clone)]
pub struct BreakerConfig {
    #[serde(default = "default_server_base")]
    pub server_error_base_minutes: f64,
    #[serde(default = "default_server_cap")]
    pub server_error_cap_minutes: f64,
    #[serde(default = "default_server_factor")]
    pub server_error_factor: f64,
    #[serde(default = "default_rate_base")]
    pub rate_limit_base_minutes: f64,
    #[serde(default = "default_rate_cap")]
    pub rate_limit_cap_minutes: f64,
    #[serde(default = "default_rate_factor")]
    pub rate_limit_factor: f64,
    #[serde(default = "default_max_exponent")]
    pub max_exponent: u32,
    #[serde(default = "default_trial_lease")]
    pub half_open_trial_seconds: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            server_error_base_minutes: default_server_base(),
            server_error_cap_minutes: default_server_cap(),
            server_error_factor: default_server_factor(),
            rate_limit_base_minutes: default_rate_base(),
            rate_limit_cap_minutes: default_rate_cap(),
            rate_limit_factor: default_rate_factor(),
            max_exponent: default_max_exponent(),
            half_open_trial_seconds: default_trial_lease(),
        }
    }
}

fn default_server_base() -> f64 { 5.0 }
fn default_server_cap() -> f64 { 60.0 }
fn default_server_factor() -> f64 { 2.0 }
fn default_rate_base() -> f64 { 15.0 }
fn default_rate_cap() -> f64 { 120.0 }
fn default_rate_factor() -> f64 { 1.5 }
fn default_max_exponent() -> u32 { 4 }
fn default_trial_lease() -> u64 { 120 }

#[derive(Debug, Deserialize, Clone)]
pub struct QuotaConfig {
    #[serde(default = "default_per_minute")]
    pub per_minute: usize,
    #[serde(default = "default_per_hour")]
    pub per_hour: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { per_minute: default_per_minute(), per_hour: default_per_hour() }
    }
}

fn default_per_minute() -> usize { 30 }
fn default_per_hour() -> usize { 200 }

/// Cache lifetimes in seconds, by provenance of the result
#[derive(Debug, Deserialize, Clone)]
pub struct CacheTtlConfig {
    #[serde(default = "default_ttl_live")]
    pub live: u64,
    #[serde(default = "default_ttl_live_empty")]
    pub live_empty: u64,
    #[serde(default = "default_ttl_rate_limited")]
    pub rate_limited: u64,
    #[serde(default = "default_ttl_server_error")]
    pub server_error: u64,
    /// Unknown errors and missing credentials
    #[serde(default = "default_ttl_fallback")]
    pub fallback: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            live: default_ttl_live(),
            live_empty: default_ttl_live_empty(),
            rate_limited: default_ttl_rate_limited(),
            server_error: default_ttl_server_error(),
            fallback: default_ttl_fallback(),
        }
    }
}

fn default_ttl_live() -> u64 { 2 * 60 * 60 }
fn default_ttl_live_empty() -> u64 { 5 * 60 }
fn default_ttl_rate_limited() -> u64 { 60 * 60 }
fn default_ttl_server_error() -> u64 { 30 * 60 }
fn default_ttl_fallback() -> u64 { 10 * 60 }

#[derive(Debug, Deserialize, Clone)]
pub struct RegionConfig {
    #[serde(default = "default_required_regions")]
    pub required: Vec<String>,
    /// Region name -> destination airport codes. Empty means built-in table.
    #[serde(default)]
    pub members: BTreeMap<String, Vec<String>>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self { required: default_required_regions(), members: BTreeMap::new() }
    }
}

fn default_required_regions() -> Vec<String> {
    vec!["europe".into(), "asia".into(), "americas".into()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchDefaults {
    #[serde(default = "default_origin")]
    pub default_origin: String,
    #[serde(default = "default_preferred")]
    pub preferred_destinations: Vec<String>,
    /// Curated offer dataset replacing the built-in one
    pub catalog_path: Option<String>,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            default_origin: default_origin(),
            preferred_destinations: default_preferred(),
            catalog_path: None,
        }
    }
}

fn default_origin() -> String { "TUN".into() }
fn default_preferred() -> Vec<String> {
    ["CDG", "FCO", "DXB", "JFK", "BCN", "LHR", "NRT", "BKK"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `FARECAST__UPSTREAM__CLIENT_ID=...`
            .add_source(config::Environment::with_prefix("FARECAST").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
