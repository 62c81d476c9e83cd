use std::path::Path;

use farecast_core::FlightOffer;

use crate::entry::CatalogEntry;

const BUILTIN_DATASET: &str = include_str!("../data/fallback_offers.json");

/// Fewest distinct destinations a fallback answer should span
const MIN_VARIETY: usize = 5;

/// Curated offers served when live data is unavailable or insufficient
#[derive(Debug, Clone)]
pub struct FallbackCatalog {
    entries: Vec<CatalogEntry>,
}

impl FallbackCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// The dataset shipped with the crate
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_DATASET)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let catalog = Self::from_json(&raw)?;
        tracing::info!("Loaded {} fallback offers from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct destinations in catalog order
    pub fn destinations(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !seen.iter().any(|d| d.eq_ignore_ascii_case(&entry.destination)) {
                seen.push(entry.destination.as_str());
            }
        }
        seen
    }

    /// Curated offers for `destinations`.
    ///
    /// When the matches span fewer than `min(5, catalog destinations)`
    /// distinct destinations, offers for other destinations are appended in
    /// catalog order until twice that many (or `max_results`, if larger) are
    /// covered. When nothing matches the whole catalog is returned, so the
    /// result is never empty for a non-empty catalog.
    pub fn lookup(&self, destinations: &[String], max_results: usize) -> Vec<FlightOffer> {
        if self.entries.is_empty() {
            tracing::error!("Fallback catalog is empty, nothing to serve");
            return Vec::new();
        }

        let mut included = vec![false; self.entries.len()];
        let mut order: Vec<usize> = Vec::new();
        let mut covered: Vec<&str> = Vec::new();

        for (i, entry) in self.entries.iter().enumerate() {
            if destinations.iter().any(|d| entry.matches(d)) {
                included[i] = true;
                order.push(i);
                if !covered.iter().any(|c| entry.matches(c)) {
                    covered.push(entry.destination.as_str());
                }
            }
        }

        if order.is_empty() {
            tracing::debug!(
                requested = ?destinations,
                "No curated offers for requested destinations, serving whole catalog"
            );
            return self.entries.iter().map(CatalogEntry::to_offer).collect();
        }

        let catalog_destinations = self.destinations().len();
        let min_variety = MIN_VARIETY.min(catalog_destinations);
        if covered.len() < min_variety {
            let target = (2 * min_variety).max(max_results).min(catalog_destinations);
            for (i, entry) in self.entries.iter().enumerate() {
                if covered.len() >= target {
                    break;
                }
                if included[i] || covered.iter().any(|c| entry.matches(c)) {
                    continue;
                }
                included[i] = true;
                order.push(i);
                covered.push(entry.destination.as_str());
            }
            tracing::debug!(
                destinations = covered.len(),
                "Padded fallback offers for destination variety"
            );
        }

        order.into_iter().map(|i| self.entries[i].to_offer()).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid catalog data: {0}")]
    InvalidData(#[from] serde_json::Error),

    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use farecast_core::{FlightOffer, OfferPrice, OfferSource};

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    fn destinations(offers: &[FlightOffer]) -> Vec<String> {
        offers.iter().filter_map(|o| o.destination().map(str::to_string)).collect()
    }

    fn entry(destination: &str) -> CatalogEntry {
        CatalogEntry {
            destination: destination.to_string(),
            description: Some(format!("About {}", destination)),
            offer: FlightOffer::new(OfferSource::Live, vec![], OfferPrice::default()),
        }
    }

    #[test]
    fn test_builtin_dataset_loads() {
        let catalog = FallbackCatalog::builtin().expect("builtin dataset");
        assert_eq!(catalog.len(), 11);
        assert_eq!(catalog.destinations()[..3], ["CDG", "FCO", "DXB"]);
    }

    #[test]
    fn test_offers_are_tagged_fallback_with_description() {
        let catalog = FallbackCatalog::builtin().unwrap();
        let offers = catalog.lookup(&codes(&["CDG", "FCO", "DXB", "JFK", "NRT"]), 5);
        assert_eq!(destinations(&offers), codes(&["CDG", "FCO", "DXB", "JFK", "NRT"]));
        assert!(offers.iter().all(|o| o.source == OfferSource::Fallback));
        assert!(offers.iter().all(|o| o.description.is_some()));
    }

    #[test]
    fn test_single_destination_is_padded_for_variety() {
        let catalog = FallbackCatalog::builtin().unwrap();
        let offers = catalog.lookup(&codes(&["nrt"]), 5);
        let dests = destinations(&offers);
        assert_eq!(dests[0], "NRT");
        assert_eq!(dests.len(), 10);
        assert_eq!(dests.iter().filter(|d| *d == "NRT").count(), 1);
    }

    #[test]
    fn test_unknown_destinations_return_whole_catalog() {
        let catalog = FallbackCatalog::builtin().unwrap();
        assert_eq!(catalog.lookup(&codes(&["ZZZ"]), 5).len(), 11);
        assert_eq!(catalog.lookup(&[], 5).len(), 11);
    }

    #[test]
    fn test_never_empty_for_non_empty_catalog() {
        let catalog = FallbackCatalog::new(vec![entry("AAA"), entry("BBB"), entry("CCC")]);
        for request in [codes(&[]), codes(&["AAA"]), codes(&["XXX", "YYY"]), codes(&["CCC", "BBB"])] {
            for max in [0, 1, 5, 50] {
                assert!(!catalog.lookup(&request, max).is_empty());
            }
        }
        // padding is bounded by what the catalog holds
        assert_eq!(catalog.lookup(&codes(&["AAA"]), 5).len(), 3);
    }

    #[test]
    fn test_empty_catalog_returns_nothing() {
        let catalog = FallbackCatalog::new(Vec::new());
        assert!(catalog.is_empty());
        assert!(catalog.lookup(&codes(&["CDG"]), 5).is_empty());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            FallbackCatalog::from_json("{ not json"),
            Err(CatalogError::InvalidData(_))
        ));
    }
}
