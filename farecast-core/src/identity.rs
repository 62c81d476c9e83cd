use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::models::FlightOffer;

/// Source of uniqueness for offers whose identity cannot be derived
pub trait KeyEntropy: Send + Sync {
    fn unique_token(&self) -> String;
}

/// Production entropy: a fresh v4 UUID per call
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidEntropy;

impl KeyEntropy for UuidEntropy {
    fn unique_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic entropy for tests and replays
pub struct SeededEntropy {
    rng: Mutex<StdRng>,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl KeyEntropy for SeededEntropy {
    fn unique_token(&self) -> String {
        let value: u128 = match self.rng.lock() {
            Ok(mut rng) => rng.gen(),
            Err(poisoned) => poisoned.into_inner().gen(),
        };
        format!("{:032x}", value)
    }
}

/// Derives the identity key used to recognise the same flight across sources.
///
/// The key is built from the first segment's departure and arrival airports,
/// carrier and flight number, the departure date and the normalized price
/// total. When any of those is missing the offer gets a unique key instead,
/// so a malformed payload can show up as a possible duplicate but is never
/// merged into another offer.
pub struct OfferKeyer {
    entropy: Box<dyn KeyEntropy>,
}

impl OfferKeyer {
    pub fn new(entropy: impl KeyEntropy + 'static) -> Self {
        Self {
            entropy: Box::new(entropy),
        }
    }

    pub fn derive_key(&self, offer: &FlightOffer) -> String {
        match identity_fields(offer) {
            Some(key) => key,
            None => {
                let token = self.entropy.unique_token();
                tracing::debug!(token = %token, "Offer lacks identity fields, using unique key");
                format!("unkeyed:{}", token)
            }
        }
    }
}

impl Default for OfferKeyer {
    fn default() -> Self {
        Self::new(UuidEntropy)
    }
}

/// The deterministic part of the key, or `None` for malformed offers
pub fn identity_fields(offer: &FlightOffer) -> Option<String> {
    let segment = offer.first_segment()?;
    let departure = non_empty(&segment.departure.iata_code)?;
    let arrival = non_empty(&segment.arrival.iata_code)?;
    let carrier = non_empty(&segment.carrier_code)?;
    let number = non_empty(&segment.number)?;
    let date = segment.departure.at?.date();
    let total = offer.price.amount()?;

    Some(format!(
        "{}-{}|{}{}|{}|{:.2}",
        departure.to_ascii_uppercase(),
        arrival.to_ascii_uppercase(),
        carrier.to_ascii_uppercase(),
        number,
        date.format("%Y-%m-%d"),
        total
    ))
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlightEndpoint, FlightSegment, Itinerary, OfferPrice, OfferSource};
    use chrono::NaiveDate;

    fn offer(carrier: &str, number: &str, total: &str) -> FlightOffer {
        let at = NaiveDate::from_ymd_opt(2025, 12, 5)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let segment = FlightSegment {
            departure: FlightEndpoint { iata_code: "TUN".into(), at: Some(at) },
            arrival: FlightEndpoint { iata_code: "CDG".into(), at: None },
            carrier_code: carrier.into(),
            number: number.into(),
            duration: Some("PT2H30M".into()),
        };
        FlightOffer::new(
            OfferSource::Live,
            vec![Itinerary { duration: None, segments: vec![segment] }],
            OfferPrice { total: total.into(), currency: "EUR".into() },
        )
    }

    #[test]
    fn test_key_is_stable() {
        let keyer = OfferKeyer::default();
        let o = offer("TU", "750", "189.00");
        assert_eq!(keyer.derive_key(&o), keyer.derive_key(&o));
        assert_eq!(keyer.derive_key(&o), "TUN-CDG|TU750|2025-12-05|189.00");
    }

    #[test]
    fn test_irrelevant_fields_do_not_change_key() {
        let keyer = OfferKeyer::default();
        let a = offer("TU", "750", "189").with_description("Paris in winter");
        let b = offer("TU", "750", "189.00").with_id("upstream-42").with_source(OfferSource::Fallback);
        assert_eq!(keyer.derive_key(&a), keyer.derive_key(&b));
    }

    #[test]
    fn test_different_flights_get_different_keys() {
        let keyer = OfferKeyer::default();
        assert_ne!(
            keyer.derive_key(&offer("TU", "750", "189.00")),
            keyer.derive_key(&offer("TU", "752", "189.00"))
        );
        assert_ne!(
            keyer.derive_key(&offer("TU", "750", "189.00")),
            keyer.derive_key(&offer("TU", "750", "199.00"))
        );
    }

    #[test]
    fn test_malformed_offer_gets_unique_key() {
        let keyer = OfferKeyer::default();
        let broken = offer("", "750", "189.00");
        assert!(identity_fields(&broken).is_none());
        assert_ne!(keyer.derive_key(&broken), keyer.derive_key(&broken));

        let no_price = offer("TU", "750", "n/a");
        assert!(keyer.derive_key(&no_price).starts_with("unkeyed:"));
    }

    #[test]
    fn test_seeded_entropy_is_reproducible() {
        let a = OfferKeyer::new(SeededEntropy::new(7));
        let b = OfferKeyer::new(SeededEntropy::new(7));
        let broken = offer("TU", "", "189.00");
        assert_eq!(a.derive_key(&broken), b.derive_key(&broken));
        assert_ne!(a.derive_key(&broken), a.derive_key(&broken));
    }
}
