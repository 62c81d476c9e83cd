pub mod entry;
pub mod fallback;

pub use entry::CatalogEntry;
pub use fallback::{CatalogError, FallbackCatalog};
