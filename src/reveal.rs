use crate::index::{EntityId, GeographicEntity, NameIndex};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// The continents shown in the progress panel, with their short element ids.
pub const CONTINENTS: [(&str, &str); 6] = [
    ("North America", "na"),
    ("South America", "sa"),
    ("Asia", "as"),
    ("Europe", "eu"),
    ("Africa", "af"),
    ("Oceania", "oc"),
];

pub fn continent_short_id(label: &str) -> Option<&'static str> {
    CONTINENTS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, id)| *id)
}

/// Canonical keys revealed during the current session.
#[derive(Debug, Default, Clone)]
pub struct RevealState {
    keys: HashSet<String>,
    order: Vec<EntityId>,
    final_guessed: Option<usize>,
}

impl RevealState {
    pub fn contains(&self, canonical_key: &str) -> bool {
        self.keys.contains(canonical_key)
    }

    /// Returns `false` when the entity was already revealed.
    pub fn insert(&mut self, entity: &GeographicEntity) -> bool {
        if !self.keys.insert(entity.key.clone()) {
            return false;
        }
        self.order.push(entity.id);
        true
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Entities in the order they were revealed.
    pub fn revealed_ids(&self) -> &[EntityId] {
        &self.order
    }

    /// Freezes the guessed count reported in the summary.
    pub fn freeze(&mut self) {
        self.final_guessed = Some(self.keys.len());
    }

    pub fn final_guessed(&self) -> Option<usize> {
        self.final_guessed
    }

    /// The frozen count when one was captured, otherwise the live size.
    pub fn guessed_count(&self) -> usize {
        self.final_guessed.unwrap_or(self.keys.len())
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.order.clear();
        self.final_guessed = None;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContinentTally {
    pub guessed: usize,
    pub total: usize,
}

/// Per-continent guessed/total counters. Totals are fixed at load time.
#[derive(Debug, Default, Clone)]
pub struct ContinentCounters {
    tallies: BTreeMap<String, ContinentTally>,
}

impl ContinentCounters {
    pub fn from_index(index: &NameIndex) -> Self {
        let mut tallies: BTreeMap<String, ContinentTally> = CONTINENTS
            .iter()
            .map(|(label, _)| (label.to_string(), ContinentTally::default()))
            .collect();
        for (label, &total) in index.continent_totals() {
            tallies.entry(label.clone()).or_default().total = total;
        }
        Self { tallies }
    }

    /// Counts one reveal; a label that is unknown or already full is ignored.
    pub fn record(&mut self, label: &str) -> bool {
        match self.tallies.get_mut(label) {
            Some(tally) if tally.guessed < tally.total => {
                tally.guessed += 1;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, label: &str) -> ContinentTally {
        self.tallies.get(label).copied().unwrap_or_default()
    }

    pub fn reset(&mut self) {
        for tally in self.tallies.values_mut() {
            tally.guessed = 0;
        }
    }

    /// The six panel continents in display order.
    pub fn panel(&self) -> impl Iterator<Item = (&'static str, ContinentTally)> + '_ {
        CONTINENTS
            .iter()
            .map(move |(label, _)| (*label, self.get(label)))
    }

    /// Every group, including ones outside the panel such as "Unknown".
    pub fn all(&self) -> impl Iterator<Item = (&str, ContinentTally)> {
        self.tallies
            .iter()
            .map(|(label, tally)| (label.as_str(), *tally))
    }

    pub fn guessed_sum(&self) -> usize {
        self.tallies.values().map(|tally| tally.guessed).sum()
    }
}
