pub mod app_config;
pub mod redis_cache;
pub mod memory_cache;

pub use app_config::Config;
pub use redis_cache::RedisCache;
pub use memory_cache::MemoryCache;
