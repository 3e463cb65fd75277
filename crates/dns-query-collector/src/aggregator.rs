// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Running query counts per client address and per queried name.

use crate::query::QueryRecord;
use hashbrown::HashMap;

/// Occurrence counts keyed by string, remembering first-seen order so ranking
/// ties are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    index: HashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    pub fn add(&mut self, key: &str, count: u64) {
        match self.index.get(key) {
            Some(&position) => self.entries[position].1 += count,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), count));
            }
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.index
            .get(key)
            .map_or(0, |&position| self.entries[position].1)
    }

    /// Sum of every count in the table.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `n` entries, highest count first. Equal counts keep the order in
    /// which their keys were first seen.
    pub fn most_common(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .entries
            .iter()
            .map(|(key, count)| (key.as_str(), *count))
            .collect();
        // sort_by is stable, insertion order breaks ties
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

#[cfg(test)]
impl<'a> FromIterator<(&'a str, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, u64)>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        for (key, count) in iter {
            table.add(key, count);
        }
        table
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryAggregator {
    clients: FrequencyTable,
    names: FrequencyTable,
}

impl QueryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an aggregator from already counted tables.
    #[cfg(test)]
    pub(crate) fn from_tables(clients: FrequencyTable, names: FrequencyTable) -> Self {
        Self { clients, names }
    }

    pub fn update(&mut self, record: &QueryRecord) {
        self.clients.increment(record.client_ip());
        self.names.increment(record.name());
    }

    /// Number of records seen.
    pub fn total(&self) -> u64 {
        self.clients.total()
    }

    pub fn clients(&self) -> &FrequencyTable {
        &self.clients
    }

    pub fn names(&self) -> &FrequencyTable {
        &self.names
    }

    pub fn top_clients(&self, n: usize) -> Vec<(&str, u64)> {
        self.clients.most_common(n)
    }

    pub fn top_names(&self, n: usize) -> Vec<(&str, u64)> {
        self.names.most_common(n)
    }
}
