use serde::{Deserialize, Serialize};
use chrono::NaiveDateTime;

/// Where an offer came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OfferSource {
    Live,
    Fallback,
}

/// One end of a flight segment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FlightEndpoint {
    #[serde(default)]
    pub iata_code: String,
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FlightSegment {
    pub departure: FlightEndpoint,
    pub arrival: FlightEndpoint,
    #[serde(default)]
    pub carrier_code: String,
    #[serde(default)]
    pub number: String,
    /// ISO-8601 duration as sent by the provider, e.g. `PT2H30M`
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Itinerary {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub segments: Vec<FlightSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OfferPrice {
    /// Decimal string, kept as received so nothing is lost to float rounding
    #[serde(default)]
    pub total: String,
    #[serde(default)]
    pub currency: String,
}

impl OfferPrice {
    pub fn amount(&self) -> Option<f64> {
        self.total.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// A flight offer as returned to callers. Immutable once built; identity is
/// derived from its content by [`crate::identity::OfferKeyer`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightOffer {
    #[serde(default)]
    pub id: Option<String>,
    pub source: OfferSource,
    #[serde(default)]
    pub itineraries: Vec<Itinerary>,
    #[serde(default)]
    pub price: OfferPrice,
    #[serde(default)]
    pub validating_airline_codes: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl FlightOffer {
    pub fn new(source: OfferSource, itineraries: Vec<Itinerary>, price: OfferPrice) -> Self {
        Self {
            id: None,
            source,
            itineraries,
            price,
            validating_airline_codes: Vec::new(),
            description: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Re-tag the offer, e.g. when a curated entry is served as fallback
    pub fn with_source(mut self, source: OfferSource) -> Self {
        self.source = source;
        self
    }

    pub fn first_segment(&self) -> Option<&FlightSegment> {
        self.itineraries.first().and_then(|it| it.segments.first())
    }

    /// Final arrival of the outbound itinerary
    pub fn destination(&self) -> Option<&str> {
        self.itineraries
            .first()
            .and_then(|it| it.segments.last())
            .map(|s| s.arrival.iata_code.as_str())
            .filter(|code| !code.is_empty())
    }

    pub fn origin(&self) -> Option<&str> {
        self.first_segment()
            .map(|s| s.departure.iata_code.as_str())
            .filter(|code| !code.is_empty())
    }
}
