use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::FlightOffer;
use crate::search::{SearchRequest, TravelClass};

/// A single origin/destination query sent to the upstream provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
    pub travel_class: Option<TravelClass>,
    pub currency: String,
    pub max_results: usize,
    pub max_price: Option<u32>,
}

impl UpstreamQuery {
    /// Specialise a (normalized) request for one destination
    pub fn for_destination(request: &SearchRequest, destination: &str) -> Self {
        Self {
            origin: request.origin.clone(),
            destination: destination.to_string(),
            departure_date: request.departure_date,
            return_date: request.return_date,
            adults: request.adults,
            travel_class: request.travel_class,
            currency: request.currency.clone(),
            max_results: request.max_results,
            max_price: request.max_price,
        }
    }
}

/// Typed failure reported by an upstream search
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum UpstreamError {
    #[error("Upstream rate limit exceeded (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Upstream server error: {0}")]
    ServerError(String),
    #[error("Upstream rejected credentials: {0}")]
    Unauthenticated(String),
    #[error("Upstream call failed: {0}")]
    Unknown(String),
}

/// Failure classes that move the circuit breaker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ServerError,
    RateLimit,
    Unknown,
}

impl UpstreamError {
    /// `None` for credential problems: retrying will not fix them, so they
    /// never count against the breaker.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            UpstreamError::RateLimited { .. } => Some(FailureKind::RateLimit),
            UpstreamError::ServerError(_) => Some(FailureKind::ServerError),
            UpstreamError::Unknown(_) => Some(FailureKind::Unknown),
            UpstreamError::Unauthenticated(_) => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            UpstreamError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Classify an HTTP status from the provider
    pub fn from_status(status: u16, retry_after: Option<Duration>, body: impl Into<String>) -> Self {
        match status {
            429 => UpstreamError::RateLimited { retry_after },
            401 | 403 => UpstreamError::Unauthenticated(body.into()),
            500..=599 => UpstreamError::ServerError(body.into()),
            _ => UpstreamError::Unknown(format!("status {}: {}", status, body.into())),
        }
    }
}

/// Contract for the live flight-offer provider. Authentication, token refresh
/// and transport retries live behind this trait.
#[async_trait]
pub trait UpstreamSearchClient: Send + Sync {
    async fn search(&self, query: &UpstreamQuery) -> Result<Vec<FlightOffer>, UpstreamError>;
}

/// Stand-in used when no provider credentials are configured
pub struct DisabledUpstream;

#[async_trait]
impl UpstreamSearchClient for DisabledUpstream {
    async fn search(&self, query: &UpstreamQuery) -> Result<Vec<FlightOffer>, UpstreamError> {
        tracing::debug!("Upstream disabled, refusing search {}-{}", query.origin, query.destination);
        Err(UpstreamError::Unauthenticated("upstream credentials are not configured".to_string()))
    }
}
