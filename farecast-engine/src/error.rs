use farecast_catalog::CatalogError;
use farecast_core::{CoreError, FallbackReason};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid search request: {0}")]
    InvalidRequest(#[from] CoreError),

    /// Live search and the curated catalog both came back empty
    #[error("No offers available (fallback reason: {reason:?})")]
    NoOffers { reason: FallbackReason },

    #[error("Fallback catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Cache setup failed: {0}")]
    CacheSetup(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
