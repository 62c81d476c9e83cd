use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use farecast_core::{
    FailureKind, FallbackReason, FlightOffer, OfferSource, SearchMeta, SearchRequest, SearchResponse,
    UpstreamError, UpstreamQuery, UpstreamSearchClient,
};
use farecast_offer::dedupe;

use crate::error::{EngineError, EngineResult};
use crate::quota::QuotaUsage;
use crate::resiliency::{BreakerSnapshot, FailureTracker};
use crate::state::EngineState;

#[derive(Debug, Clone, Serialize)]
pub struct EngineHealth {
    pub breaker: BreakerSnapshot,
    pub quota: QuotaUsage,
}

/// What came back from one fan-out, in destination order
#[derive(Debug, Default)]
struct FanOutOutcome {
    offers: Vec<FlightOffer>,
    errors: Vec<UpstreamError>,
    succeeded: usize,
}

/// Outcome of one search run. `Err` carries the fallback reason when
/// neither live nor curated offers were available.
type SearchRun = Result<SearchResponse, FallbackReason>;

type SharedSearch = Shared<BoxFuture<'static, SearchRun>>;

/// Runs a search end to end: cache, breaker, bounded fan-out to the live
/// upstream, merge, dedup, diversity selection, and the curated fallback
/// when live data is unavailable.
///
/// Concurrent searches with the same cache key share a single run.
#[derive(Clone)]
pub struct AggregationOrchestrator {
    state: EngineState,
    in_flight: Arc<Mutex<HashMap<String, SharedSearch>>>,
}

impl AggregationOrchestrator {
    pub fn new(state: EngineState) -> Self {
        Self {
            state,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub async fn search(&self, request: &SearchRequest, user_id: Option<&str>) -> EngineResult<SearchResponse> {
        request.validate()?;
        let request = request.normalized();
        let key = request.cache_key(user_id);

        let run = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(run) = in_flight.get(&key).cloned() {
                debug!(key = %key, "Joining in-flight search");
                run
            } else {
                let runner = self.clone();
                let run_key = key.clone();
                let run = async move {
                    let result = runner.execute(&request, &run_key).await;
                    runner.in_flight.lock().await.remove(&run_key);
                    result
                }
                .boxed()
                .shared();
                in_flight.insert(key, run.clone());
                run
            }
        };

        run.await.map_err(|reason| EngineError::NoOffers { reason })
    }

    async fn execute(&self, request: &SearchRequest, key: &str) -> SearchRun {
        if let Some(mut cached) = self.cached(key).await {
            debug!(key = %key, "Serving search from cache");
            cached.meta.cache_hit = true;
            return Ok(cached);
        }

        let destinations = self.destinations_for(request);
        if destinations.is_empty() {
            warn!(origin = %request.origin, "No destinations to search, serving fallback");
            return self
                .respond_with_fallback(key, request, &destinations, FallbackReason::Unknown)
                .await;
        }

        if self.state.tracker.should_use_fallback().await {
            let reason = self.breaker_reason().await;
            info!(reason = ?reason, "Upstream unavailable, serving fallback");
            return self.respond_with_fallback(key, request, &destinations, reason).await;
        }

        let granted = self.state.quota.acquire_up_to(destinations.len()).await;
        if granted == 0 {
            return self
                .respond_with_fallback(key, request, &destinations, FallbackReason::RateLimited)
                .await;
        }
        let targets: Vec<String> = destinations.iter().take(granted).cloned().collect();

        let handle = tokio::spawn(fan_out(
            self.state.upstream.clone(),
            self.state.tracker.clone(),
            request.clone(),
            targets,
            self.state.settings.max_concurrency,
            self.state.settings.upstream_timeout,
        ));
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Fan-out task failed: {}", e);
                FanOutOutcome {
                    errors: vec![UpstreamError::Unknown(e.to_string())],
                    ..Default::default()
                }
            }
        };

        if outcome.succeeded == 0 {
            let reason = reason_for(&outcome.errors);
            warn!(reason = ?reason, errors = outcome.errors.len(), "Every destination failed, serving fallback");
            return self.respond_with_fallback(key, request, &destinations, reason).await;
        }

        let pool = dedupe(outcome.offers, &self.state.keyer);
        if pool.is_empty() {
            info!("Live search returned nothing usable, serving fallback");
            return self
                .respond_with_fallback(key, request, &destinations, FallbackReason::NoLiveResults)
                .await;
        }

        let response = self.assemble(&pool, request, OfferSource::Live, None);
        info!(
            offers = response.offers.len(),
            pool = pool.len(),
            failed = outcome.errors.len(),
            "Live search complete"
        );
        self.store(key, &response, self.state.settings.ttl.live).await;
        Ok(response)
    }

    pub async fn health(&self) -> EngineHealth {
        EngineHealth {
            breaker: self.state.tracker.snapshot().await,
            quota: self.state.quota.usage().await,
        }
    }

    /// Destinations to search: the requested one, or a spread of preferred
    /// destinations that seeds each required region before filling in order.
    pub fn destinations_for(&self, request: &SearchRequest) -> Vec<String> {
        if let Some(destination) = &request.destination {
            return vec![destination.clone()];
        }

        let settings = &self.state.settings;
        let mut candidates: Vec<&str> = Vec::new();
        for code in &settings.preferred_destinations {
            if *code != request.origin && !candidates.contains(&code.as_str()) {
                candidates.push(code.as_str());
            }
        }

        let regions = self.state.selector.regions();
        let mut chosen: Vec<String> = Vec::with_capacity(settings.max_destinations);
        for required in regions.required_regions() {
            if chosen.len() >= settings.max_destinations {
                break;
            }
            if let Some(code) = candidates
                .iter()
                .find(|c| regions.region_of(c) == Some(required.as_str()) && !chosen.iter().any(|x| x == *c))
            {
                chosen.push(code.to_string());
            }
        }
        for code in &candidates {
            if chosen.len() >= settings.max_destinations {
                break;
            }
            if !chosen.iter().any(|x| x == code) {
                chosen.push(code.to_string());
            }
        }
        chosen
    }

    async fn breaker_reason(&self) -> FallbackReason {
        let snapshot = self.state.tracker.snapshot().await;
        if !snapshot.configured {
            return FallbackReason::Unconfigured;
        }
        match snapshot.last_failure_kind {
            Some(FailureKind::RateLimit) => FallbackReason::RateLimited,
            Some(FailureKind::ServerError) => FallbackReason::ServerError,
            Some(FailureKind::Unknown) | None => FallbackReason::Unknown,
        }
    }

    async fn respond_with_fallback(
        &self,
        key: &str,
        request: &SearchRequest,
        destinations: &[String],
        reason: FallbackReason,
    ) -> SearchRun {
        let curated = self.state.catalog.lookup(destinations, request.max_results);
        let pool = dedupe(curated, &self.state.keyer);
        if pool.is_empty() {
            error!(reason = ?reason, "No live offers and no curated offers to fall back on");
            return Err(reason);
        }

        let response = self.assemble(&pool, request, OfferSource::Fallback, Some(reason));
        self.store(key, &response, self.ttl_for(reason)).await;
        Ok(response)
    }

    fn assemble(
        &self,
        pool: &[FlightOffer],
        request: &SearchRequest,
        source: OfferSource,
        fallback_reason: Option<FallbackReason>,
    ) -> SearchResponse {
        let offers = self.state.selector.select(pool, request.max_results);
        SearchResponse {
            meta: SearchMeta {
                truncated: pool.len() > offers.len(),
                fallback_reason,
                cache_hit: false,
            },
            offers,
            source,
        }
    }

    fn ttl_for(&self, reason: FallbackReason) -> u64 {
        let ttl = &self.state.settings.ttl;
        match reason {
            FallbackReason::RateLimited => ttl.rate_limited,
            FallbackReason::ServerError => ttl.server_error,
            FallbackReason::NoLiveResults => ttl.live_empty,
            FallbackReason::Unconfigured | FallbackReason::Unknown => ttl.fallback,
        }
    }

    async fn cached(&self, key: &str) -> Option<SearchResponse> {
        match self.state.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!(key = %key, "Discarding unreadable cache entry: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, "Cache read failed, treating as miss: {}", e);
                None
            }
        }
    }

    async fn store(&self, key: &str, response: &SearchResponse, ttl_seconds: u64) {
        let bytes = match serde_json::to_vec(response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to serialize search response for cache: {}", e);
                return;
            }
        };
        if let Err(e) = self.state.cache.set(key, bytes, ttl_seconds).await {
            warn!(key = %key, "Cache write failed: {}", e);
        }
    }
}

/// Pick the most telling reason when every branch failed
fn reason_for(errors: &[UpstreamError]) -> FallbackReason {
    if errors.iter().any(|e| matches!(e, UpstreamError::Unauthenticated(_))) {
        FallbackReason::Unconfigured
    } else if errors.iter().any(|e| matches!(e, UpstreamError::RateLimited { .. })) {
        FallbackReason::RateLimited
    } else if errors.iter().any(|e| matches!(e, UpstreamError::ServerError(_))) {
        FallbackReason::ServerError
    } else {
        FallbackReason::Unknown
    }
}

/// Query every destination with at most `concurrency` calls in flight.
///
/// Failures reach the breaker as each branch completes; a single success is
/// recorded once all branches are done. Runs on its own task so a caller
/// that goes away does not stop breaker bookkeeping.
async fn fan_out(
    upstream: Arc<dyn UpstreamSearchClient>,
    tracker: Arc<FailureTracker>,
    request: SearchRequest,
    destinations: Vec<String>,
    concurrency: usize,
    timeout: Duration,
) -> FanOutOutcome {
    let branches = destinations.into_iter().map(|destination| {
        let upstream = upstream.clone();
        let tracker = tracker.clone();
        let query = UpstreamQuery::for_destination(&request, &destination);
        async move {
            let result = match tokio::time::timeout(timeout, upstream.search(&query)).await {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::Unknown(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                ))),
            };
            if let Err(e) = &result {
                warn!(destination = %destination, "Upstream search failed: {}", e);
                tracker.record_upstream_error(e).await;
            }
            result
        }
    });

    let results: Vec<Result<Vec<FlightOffer>, UpstreamError>> =
        stream::iter(branches).buffered(concurrency.max(1)).collect().await;

    let mut outcome = FanOutOutcome::default();
    for result in results {
        match result {
            Ok(offers) => {
                outcome.succeeded += 1;
                outcome.offers.extend(offers.into_iter().map(|o| o.with_source(OfferSource::Live)));
            }
            Err(e) => outcome.errors.push(e),
        }
    }

    if outcome.succeeded > 0 {
        tracker.register_success().await;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_priority() {
        let rate = UpstreamError::RateLimited { retry_after: None };
        let server = UpstreamError::ServerError("502".into());
        let unknown = UpstreamError::Unknown("reset".into());
        let auth = UpstreamError::Unauthenticated("401".into());

        assert_eq!(reason_for(&[unknown.clone(), server.clone()]), FallbackReason::ServerError);
        assert_eq!(reason_for(&[server.clone(), rate.clone()]), FallbackReason::RateLimited);
        assert_eq!(reason_for(&[rate, auth]), FallbackReason::Unconfigured);
        assert_eq!(reason_for(&[unknown]), FallbackReason::Unknown);
        assert_eq!(reason_for(&[]), FallbackReason::Unknown);
    }
}
