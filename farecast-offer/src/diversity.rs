use std::collections::{HashMap, HashSet};

use farecast_core::FlightOffer;

use crate::regions::RegionTable;

/// Most offers one destination contributes before other destinations get a turn
const PER_DESTINATION_CAP: usize = 2;

/// Picks a bounded, geographically varied subset of an offer pool.
///
/// Coverage of the required regions is favoured over strict pool order: a
/// later offer from an unrepresented region beats an earlier one from a region
/// that is already present. Within each pass, pool order breaks ties.
pub struct DiversitySelector {
    regions: RegionTable,
}

/// Bookkeeping for one `select` call
struct Selection<'a> {
    pool: &'a [FlightOffer],
    budget: usize,
    picked: Vec<usize>,
    taken: Vec<bool>,
    per_destination: HashMap<&'a str, usize>,
    covered_regions: HashSet<&'a str>,
}

impl<'a> Selection<'a> {
    fn new(pool: &'a [FlightOffer], budget: usize) -> Self {
        Self {
            pool,
            budget,
            picked: Vec::with_capacity(budget.min(pool.len())),
            taken: vec![false; pool.len()],
            per_destination: HashMap::new(),
            covered_regions: HashSet::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.picked.len() >= self.budget
    }

    fn count_for(&self, index: usize) -> usize {
        let pool = self.pool;
        self.per_destination
            .get(destination_of(&pool[index]))
            .copied()
            .unwrap_or(0)
    }

    fn take(&mut self, index: usize, region: Option<&'a str>) {
        let pool = self.pool;
        self.taken[index] = true;
        self.picked.push(index);
        *self
            .per_destination
            .entry(destination_of(&pool[index]))
            .or_insert(0) += 1;
        if let Some(region) = region {
            self.covered_regions.insert(region);
        }
    }

    fn into_offers(self) -> Vec<FlightOffer> {
        let pool = self.pool;
        self.picked.into_iter().map(|i| pool[i].clone()).collect()
    }
}

fn destination_of(offer: &FlightOffer) -> &str {
    offer.destination().unwrap_or("")
}

impl DiversitySelector {
    pub fn new(regions: RegionTable) -> Self {
        Self { regions }
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    /// Select at most `max_results` offers from `pool`
    pub fn select(&self, pool: &[FlightOffer], max_results: usize) -> Vec<FlightOffer> {
        if pool.is_empty() || max_results == 0 {
            return Vec::new();
        }

        let regions: Vec<Option<&str>> = pool
            .iter()
            .map(|offer| offer.destination().and_then(|d| self.regions.region_of(d)))
            .collect();
        let mut sel = Selection::new(pool, max_results);

        // 1. one offer per required region, each from a fresh destination
        for required in self.regions.required_regions() {
            if sel.is_full() {
                break;
            }
            let candidate = (0..pool.len()).find(|&i| {
                !sel.taken[i] && regions[i] == Some(required.as_str()) && sel.count_for(i) == 0
            });
            if let Some(i) = candidate {
                sel.take(i, regions[i]);
            }
        }

        // 2. first offer of every destination not yet shown
        for i in 0..pool.len() {
            if sel.is_full() {
                break;
            }
            if !sel.taken[i] && sel.count_for(i) == 0 {
                sel.take(i, regions[i]);
            }
        }

        // 3. second offer per destination
        for i in 0..pool.len() {
            if sel.is_full() {
                break;
            }
            if !sel.taken[i] && sel.count_for(i) < PER_DESTINATION_CAP {
                sel.take(i, regions[i]);
            }
        }

        // 4. required regions still missing, past the cap if need be
        for required in self.regions.required_regions() {
            if sel.is_full() {
                break;
            }
            if sel.covered_regions.contains(required.as_str()) {
                continue;
            }
            if let Some(i) = (0..pool.len()).find(|&i| !sel.taken[i] && regions[i] == Some(required.as_str())) {
                tracing::debug!(region = %required, "Backfilling uncovered region");
                sel.take(i, regions[i]);
            }
        }

        // 5. nothing else can fill the budget, relax the cap
        for i in 0..pool.len() {
            if sel.is_full() {
                break;
            }
            if !sel.taken[i] {
                sel.take(i, regions[i]);
            }
        }

        sel.into_offers()
    }
}

impl Default for DiversitySelector {
    fn default() -> Self {
        Self::new(RegionTable::default())
    }
}
