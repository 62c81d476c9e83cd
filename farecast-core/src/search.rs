use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::models::{FlightOffer, OfferSource};
use crate::{CoreError, CoreResult};

const CACHE_KEY_PREFIX: &str = "flights:search";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl TravelClass {
    /// Maps a traveller profile's travel type onto a cabin
    pub fn from_travel_type(travel_type: Option<&str>) -> Self {
        match travel_type {
            Some("business") => TravelClass::Business,
            Some("luxury") => TravelClass::First,
            Some("premium") => TravelClass::PremiumEconomy,
            _ => TravelClass::Economy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TravelClass::Economy => "ECONOMY",
            TravelClass::PremiumEconomy => "PREMIUM_ECONOMY",
            TravelClass::Business => "BUSINESS",
            TravelClass::First => "FIRST",
        }
    }
}

/// A flight search as received from the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub origin: String,
    /// When absent, the configured preferred destinations are searched
    #[serde(default)]
    pub destination: Option<String>,
    pub departure_date: NaiveDate,
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    #[serde(default = "default_adults")]
    pub adults: u32,
    #[serde(default)]
    pub travel_class: Option<TravelClass>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub max_price: Option<u32>,
}

fn default_adults() -> u32 { 1 }
fn default_currency() -> String { "EUR".to_string() }
fn default_max_results() -> usize { 5 }

/// Profile data used to build a recommended search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TravelPreferences {
    pub home_airport: Option<String>,
    #[serde(default)]
    pub destination_preferences: Vec<String>,
    pub travel_type: Option<String>,
    pub currency: Option<String>,
    pub budget_cap: Option<u32>,
}

/// Caller supplied values that win over profile preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOverrides {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub travel_class: Option<TravelClass>,
    pub adults: Option<u32>,
    pub currency: Option<String>,
    pub max_results: Option<usize>,
    pub max_price: Option<u32>,
}

impl SearchRequest {
    pub fn new(origin: impl Into<String>, departure_date: NaiveDate) -> Self {
        Self {
            origin: origin.into(),
            destination: None,
            departure_date,
            return_date: None,
            adults: default_adults(),
            travel_class: None,
            currency: default_currency(),
            max_results: default_max_results(),
            max_price: None,
        }
    }

    pub fn to(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn returning(mut self, date: NaiveDate) -> Self {
        self.return_date = Some(date);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Build a search from a traveller's profile: departure in two weeks,
    /// back a week later.
    pub fn recommended(
        preferences: &TravelPreferences,
        overrides: SearchOverrides,
        today: NaiveDate,
        default_origin: &str,
    ) -> Self {
        let origin = overrides
            .origin
            .or_else(|| preferences.home_airport.clone())
            .unwrap_or_else(|| default_origin.to_string());
        let destination = overrides
            .destination
            .or_else(|| preferences.destination_preferences.first().cloned());

        Self {
            origin,
            destination,
            departure_date: overrides.departure_date.unwrap_or(today + Duration::days(14)),
            return_date: Some(overrides.return_date.unwrap_or(today + Duration::days(21))),
            adults: overrides.adults.unwrap_or(1),
            travel_class: Some(
                overrides
                    .travel_class
                    .unwrap_or_else(|| TravelClass::from_travel_type(preferences.travel_type.as_deref())),
            ),
            currency: overrides
                .currency
                .or_else(|| preferences.currency.clone())
                .unwrap_or_else(default_currency),
            max_results: overrides.max_results.unwrap_or_else(default_max_results),
            max_price: overrides.max_price.or(preferences.budget_cap),
        }
    }

    /// Canonical form: trimmed upper-case codes, at least one adult and one
    /// result, blank destination treated as absent.
    pub fn normalized(&self) -> Self {
        let destination = self
            .destination
            .as_deref()
            .map(|d| d.trim().to_ascii_uppercase())
            .filter(|d| !d.is_empty());

        Self {
            origin: self.origin.trim().to_ascii_uppercase(),
            destination,
            departure_date: self.departure_date,
            return_date: self.return_date,
            adults: self.adults.max(1),
            travel_class: self.travel_class,
            currency: self.currency.trim().to_ascii_uppercase(),
            max_results: self.max_results.max(1),
            max_price: self.max_price,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        let origin = self.origin.trim();
        if origin.len() != 3 || !origin.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::ValidationError(format!("invalid origin airport: {:?}", self.origin)));
        }
        if let Some(ret) = self.return_date {
            if ret < self.departure_date {
                return Err(CoreError::ValidationError("return date precedes departure".to_string()));
            }
        }
        Ok(())
    }

    /// Deterministic cache key of the normalized request. Field order and
    /// letter case of the input do not matter; a user id scopes the entry.
    pub fn cache_key(&self, user_id: Option<&str>) -> String {
        let normalized = self.normalized();
        let mut fields: BTreeMap<&str, Value> = BTreeMap::new();
        fields.insert("origin", json!(normalized.origin));
        fields.insert("destination", json!(normalized.destination));
        fields.insert("departure", json!(normalized.departure_date));
        fields.insert("return", json!(normalized.return_date));
        fields.insert("adults", json!(normalized.adults));
        fields.insert("class", json!(normalized.travel_class.map(|c| c.as_str())));
        fields.insert("currency", json!(normalized.currency));
        fields.insert("max", json!(normalized.max_results));
        fields.insert("price", json!(normalized.max_price));
        if let Some(user) = user_id.map(str::trim).filter(|u| !u.is_empty()) {
            fields.insert("user", json!(user));
        }

        // BTreeMap keeps the serialized field order fixed
        let canonical = serde_json::to_vec(&fields).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        format!("{}:{}", CACHE_KEY_PREFIX, hex::encode(digest))
    }
}

/// Why a response was served from the curated catalog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No upstream credentials, or the upstream rejected them
    Unconfigured,
    RateLimited,
    ServerError,
    Unknown,
    /// The upstream answered but nothing usable came back
    NoLiveResults,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchMeta {
    /// More distinct offers were available than the result budget allowed
    pub truncated: bool,
    #[serde(default)]
    pub fallback_reason: Option<FallbackReason>,
    #[serde(default)]
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub offers: Vec<FlightOffer>,
    pub source: OfferSource,
    pub meta: SearchMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn test_search_request_deserialization_defaults() {
        let json = r#"
            {
                "origin": "tun",
                "departure_date": "2026-01-15"
            }
        "#;
        let req: SearchRequest = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(req.adults, 1);
        assert_eq!(req.currency, "EUR");
        assert_eq!(req.max_results, 5);
        assert_eq!(req.normalized().origin, "TUN");
    }

    #[test]
    fn test_cache_key_ignores_case_and_whitespace() {
        let a = SearchRequest::new("TUN", date(15)).to("CDG");
        let mut b = SearchRequest::new(" tun ", date(15)).to("cdg");
        b.currency = "eur".to_string();
        assert_eq!(a.cache_key(None), b.cache_key(None));
        assert!(a.cache_key(None).starts_with("flights:search:"));
    }

    #[test]
    fn test_cache_key_distinguishes_parameters_and_users() {
        let base = SearchRequest::new("TUN", date(15)).to("CDG");
        let later = SearchRequest::new("TUN", date(16)).to("CDG");
        let anywhere = SearchRequest::new("TUN", date(15));
        assert_ne!(base.cache_key(None), later.cache_key(None));
        assert_ne!(base.cache_key(None), anywhere.cache_key(None));
        assert_ne!(base.cache_key(Some("user-1")), base.cache_key(Some("user-2")));
        assert_ne!(base.cache_key(None), base.cache_key(Some("user-1")));
        assert_eq!(base.cache_key(Some("")), base.cache_key(None));
    }

    #[test]
    fn test_blank_destination_normalizes_to_none() {
        let req = SearchRequest::new("TUN", date(15)).to("  ");
        assert_eq!(req.normalized().destination, None);
    }

    #[test]
    fn test_recommended_uses_preferences() {
        let prefs = TravelPreferences {
            home_airport: Some("TUN".into()),
            destination_preferences: vec!["CDG".into()],
            travel_type: Some("business".into()),
            currency: Some("EUR".into()),
            budget_cap: Some(800),
        };
        let overrides = SearchOverrides {
            adults: Some(2),
            max_results: Some(3),
            ..Default::default()
        };
        let req = SearchRequest::recommended(&prefs, overrides, date(1), "ALG");

        assert_eq!(req.origin, "TUN");
        assert_eq!(req.destination.as_deref(), Some("CDG"));
        assert_eq!(req.travel_class, Some(TravelClass::Business));
        assert_eq!(req.max_results, 3);
        assert_eq!(req.max_price, Some(800));
        assert_eq!(req.adults, 2);
        assert_eq!(req.departure_date, date(15));
        assert_eq!(req.return_date, Some(date(22)));
    }

    #[test]
    fn test_recommended_falls_back_to_defaults() {
        let req = SearchRequest::recommended(
            &TravelPreferences::default(),
            SearchOverrides::default(),
            date(1),
            "TUN",
        );
        assert_eq!(req.origin, "TUN");
        assert_eq!(req.destination, None);
        assert_eq!(req.travel_class, Some(TravelClass::Economy));
        assert_eq!(req.currency, "EUR");
        assert_eq!(req.max_results, 5);
    }

    #[test]
    fn test_validate_rejects_bad_dates() {
        let req = SearchRequest::new("TUN", date(15)).returning(date(10));
        assert!(req.validate().is_err());
        assert!(SearchRequest::new("TUNIS", date(15)).validate().is_err());
        assert!(SearchRequest::new("TUN", date(15)).returning(date(20)).validate().is_ok());
    }
}
