use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("Cache operation failed: {0}")]
    Backend(String),
}

/// Best-effort key/value store for serialized search results.
///
/// Callers treat every error as a miss (on `get`) or a no-op (on `set`).
#[async_trait]
pub trait OfferCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), CacheError>;
}

/// Cache that stores nothing, for deployments without one
pub struct NoopCache;

#[async_trait]
impl OfferCache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl_seconds: u64) -> Result<(), CacheError> {
        Ok(())
    }
}
