pub mod dedup;
pub mod regions;
pub mod diversity;

pub use dedup::dedupe;
pub use regions::RegionTable;
pub use diversity::DiversitySelector;
