use serde::{Deserialize, Serialize};

use farecast_core::{FlightOffer, OfferSource};

/// One curated offer and the destination it is filed under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub destination: String,
    #[serde(default)]
    pub description: Option<String>,
    pub offer: FlightOffer,
}

impl CatalogEntry {
    /// The offer as served to callers: tagged as fallback, with the
    /// destination blurb attached when the offer has none.
    pub fn to_offer(&self) -> FlightOffer {
        let mut offer = self.offer.clone().with_source(OfferSource::Fallback);
        if offer.description.is_none() {
            offer.description = self.description.clone();
        }
        offer
    }

    pub fn matches(&self, destination: &str) -> bool {
        self.destination.eq_ignore_ascii_case(destination.trim())
    }
}
