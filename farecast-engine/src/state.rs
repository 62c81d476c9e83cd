use std::sync::Arc;
use std::time::Duration;

use farecast_catalog::FallbackCatalog;
use farecast_core::{Clock, NoopCache, OfferCache, OfferKeyer, SystemClock, UpstreamSearchClient};
use farecast_offer::{DiversitySelector, RegionTable};
use farecast_store::app_config::{CacheTtlConfig, Config};
use farecast_store::{MemoryCache, RedisCache};

use crate::error::{EngineError, EngineResult};
use crate::quota::RequestQuota;
use crate::resiliency::{BreakerPolicy, FailureTracker};

/// Tunables the orchestrator reads on every request
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_destinations: usize,
    pub max_concurrency: usize,
    pub upstream_timeout: Duration,
    pub preferred_destinations: Vec<String>,
    pub ttl: CacheTtlConfig,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_destinations: config.fan_out.max_destinations,
            max_concurrency: config.fan_out.max_concurrency.max(1),
            upstream_timeout: Duration::from_millis(config.upstream.timeout_ms),
            preferred_destinations: config
                .search
                .preferred_destinations
                .iter()
                .map(|d| d.trim().to_ascii_uppercase())
                .filter(|d| !d.is_empty())
                .collect(),
            ttl: config.cache_ttl.clone(),
        }
    }
}

/// Everything a search needs, shared across requests
#[derive(Clone)]
pub struct EngineState {
    pub upstream: Arc<dyn UpstreamSearchClient>,
    pub cache: Arc<dyn OfferCache>,
    pub tracker: Arc<FailureTracker>,
    pub quota: Arc<RequestQuota>,
    pub catalog: Arc<FallbackCatalog>,
    pub selector: Arc<DiversitySelector>,
    pub keyer: Arc<OfferKeyer>,
    pub settings: EngineSettings,
}

impl EngineState {
    /// Wire production collaborators from configuration
    pub fn from_config(config: &Config, upstream: Arc<dyn UpstreamSearchClient>) -> EngineResult<Self> {
        let cache: Arc<dyn OfferCache> = match (config.cache.enabled, config.cache.redis_url.as_deref()) {
            (false, _) => {
                tracing::info!("Result cache disabled");
                Arc::new(NoopCache)
            }
            (true, Some(url)) => {
                let redis = RedisCache::new(url).map_err(|e| EngineError::CacheSetup(e.to_string()))?;
                tracing::info!("Caching results in Redis");
                Arc::new(redis)
            }
            (true, None) => Arc::new(MemoryCache::new(config.cache.max_entries)),
        };

        let catalog = match config.search.catalog_path.as_deref() {
            Some(path) => FallbackCatalog::from_path(path)?,
            None => FallbackCatalog::builtin()?,
        };

        Ok(Self::with_parts(config, upstream, cache, catalog, Arc::new(SystemClock)))
    }

    pub fn with_parts(
        config: &Config,
        upstream: Arc<dyn UpstreamSearchClient>,
        cache: Arc<dyn OfferCache>,
        catalog: FallbackCatalog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let configured = config.upstream.is_configured();
        if !configured {
            tracing::warn!("Upstream credentials missing, every search will use the fallback catalog");
        }

        let regions = if config.regions.members.is_empty() {
            let defaults = RegionTable::default();
            RegionTable::new(config.regions.required.clone(), defaults.members)
        } else {
            RegionTable::new(config.regions.required.clone(), config.regions.members.clone())
        };

        Self {
            upstream,
            cache,
            tracker: Arc::new(FailureTracker::new(
                BreakerPolicy::from(&config.breaker),
                configured,
                clock.clone(),
            )),
            quota: Arc::new(RequestQuota::new(&config.quota, clock)),
            catalog: Arc::new(catalog),
            selector: Arc::new(DiversitySelector::new(regions)),
            keyer: Arc::new(OfferKeyer::default()),
            settings: EngineSettings::from(config),
        }
    }

    pub fn with_keyer(mut self, keyer: OfferKeyer) -> Self {
        self.keyer = Arc::new(keyer);
        self
    }
}
