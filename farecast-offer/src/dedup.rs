use std::collections::HashSet;

use farecast_core::{FlightOffer, OfferKeyer};

/// Drop offers whose identity key was already seen, keeping the first
/// occurrence and the input order.
pub fn dedupe(offers: Vec<FlightOffer>, keyer: &OfferKeyer) -> Vec<FlightOffer> {
    let mut seen: HashSet<String> = HashSet::with_capacity(offers.len());
    let before = offers.len();

    let unique: Vec<FlightOffer> = offers
        .into_iter()
        .filter(|offer| seen.insert(keyer.derive_key(offer)))
        .collect();

    if unique.len() < before {
        tracing::debug!("Removed {} duplicate offers", before - unique.len());
    }
    unique
}
