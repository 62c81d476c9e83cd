use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Destination -> region membership plus the regions every result must cover
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionTable {
    /// Checked in this order, both for lookups and for seeding
    pub required: Vec<String>,
    pub members: BTreeMap<String, Vec<String>>,
}

impl RegionTable {
    pub fn new(required: Vec<String>, members: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            required: required.into_iter().map(|r| r.to_ascii_lowercase()).collect(),
            members: members
                .into_iter()
                .map(|(region, codes)| {
                    let codes = codes.into_iter().map(|c| c.to_ascii_uppercase()).collect();
                    (region.to_ascii_lowercase(), codes)
                })
                .collect(),
        }
    }

    /// Region of a destination. Required regions take precedence when a code
    /// is listed twice, then the remaining regions in name order.
    pub fn region_of(&self, destination: &str) -> Option<&str> {
        let code = destination.trim().to_ascii_uppercase();
        let contains = |region: &str| {
            self.members
                .get(region)
                .is_some_and(|codes| codes.iter().any(|c| *c == code))
        };

        if let Some(region) = self.required.iter().find(|r| contains(r)) {
            return Some(region.as_str());
        }
        self.members
            .keys()
            .find(|region| !self.required.contains(region) && contains(region))
            .map(String::as_str)
    }

    pub fn required_regions(&self) -> &[String] {
        &self.required
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        let mut members = BTreeMap::new();
        members.insert(
            "europe".to_string(),
            ["CDG", "ORY", "FCO", "BCN", "MAD", "LHR", "AMS", "ATH", "IST"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );
        members.insert(
            "asia".to_string(),
            ["DXB", "NRT", "HND", "BKK", "SIN", "ICN", "DOH"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );
        members.insert(
            "americas".to_string(),
            ["JFK", "EWR", "YUL", "MIA", "LAX", "GRU", "MEX"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );
        members.insert(
            "africa".to_string(),
            ["CMN", "CAI", "ALG", "JNB"].iter().map(|c| c.to_string()).collect(),
        );

        Self::new(
            vec!["europe".to_string(), "asia".to_string(), "americas".to_string()],
            members,
        )
    }
}
