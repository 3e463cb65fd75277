// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::aggregator::QueryAggregator;
use std::fmt;
use std::io::{self, Write};

const CLIENT_COLUMN_WIDTH: usize = 15;
const HOST_COLUMN_WIDTH: usize = 50;
const HOST_RULE_WIDTH: usize = 60;

/// Top client addresses and top queried names, ranked by count.
///
/// Percentages are relative to the total number of records, for both
/// sections.
pub struct StatisticsReport<'a> {
    aggregator: &'a QueryAggregator,
    top_n: usize,
}

impl<'a> StatisticsReport<'a> {
    pub fn new(aggregator: &'a QueryAggregator, top_n: usize) -> Self {
        StatisticsReport { aggregator, top_n }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", self)?;
        out.flush()
    }

    fn ranked(&self, entries: Vec<(&'a str, u64)>) -> Vec<(&'a str, u64, f64)> {
        let total = self.aggregator.total();
        if total == 0 {
            return Vec::new();
        }
        entries
            .into_iter()
            .map(|(key, count)| (key, count, count as f64 / total as f64 * 100.0))
            .collect()
    }
}

fn rule(f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result {
    writeln!(f, "{} --- {}", "-".repeat(width), "-".repeat(5))
}

impl fmt::Display for StatisticsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total records {}", self.aggregator.total())?;
        writeln!(f)?;

        writeln!(f, "Client IPs Rank")?;
        rule(f, CLIENT_COLUMN_WIDTH)?;
        for (ip, count, percentage) in self.ranked(self.aggregator.top_clients(self.top_n)) {
            writeln!(f, "{ip} {count} {percentage:.2}%")?;
        }
        rule(f, CLIENT_COLUMN_WIDTH)?;

        writeln!(f)?;
        writeln!(f, "Host Rank")?;
        rule(f, HOST_RULE_WIDTH)?;
        for (host, count, percentage) in self.ranked(self.aggregator.top_names(self.top_n)) {
            writeln!(
                f,
                "{host:<width$} {count} {percentage:.2}%",
                width = HOST_COLUMN_WIDTH
            )?;
        }
        rule(f, HOST_RULE_WIDTH)
    }
}
