pub mod models;
pub mod identity;
pub mod search;
pub mod supplier;
pub mod cache;
pub mod clock;

pub use models::{FlightEndpoint, FlightOffer, FlightSegment, Itinerary, OfferPrice, OfferSource};
pub use identity::{KeyEntropy, OfferKeyer, SeededEntropy, UuidEntropy};
pub use search::{
    FallbackReason, SearchMeta, SearchOverrides, SearchRequest, SearchResponse, TravelClass,
    TravelPreferences,
};
pub use supplier::{DisabledUpstream, FailureKind, UpstreamError, UpstreamQuery, UpstreamSearchClient};
pub use cache::{CacheError, NoopCache, OfferCache};
pub use clock::{Clock, ManualClock, SystemClock};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
