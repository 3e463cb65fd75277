// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! BIND `queries` log line parsing.
//!
//! A matching line looks like:
//!
//! ```text
//! 23-Jul-2021 14:20:30.123 queries: info: client @0x1234abcd 192.168.1.1#12345 (www.example.com)
//! ```
//!
//! Only the timestamp, the client address and the parenthesized query name are
//! kept. Lines that do not match are not errors, they are simply not queries.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const QUERY_LINE_PATTERN: &str = r"(\d+)-([a-zA-Z]+)-(\d+) (\d+):(\d+):(\d+)\.(\d+) queries: info: client @0x[0-9a-f]+ ([\d\.]+)#\d+ \(([^)]+)\)";

#[allow(clippy::expect_used)]
fn query_line_regex() -> &'static Regex {
    static QUERY_LINE: OnceLock<Regex> = OnceLock::new();
    QUERY_LINE.get_or_init(|| Regex::new(QUERY_LINE_PATTERN).expect("invalid query line pattern"))
}

/// A single DNS query event, as shipped to the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRecord {
    timestamp: String,
    name: String,
    client_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    query_type: Option<String>,
}

impl QueryRecord {
    pub fn new(
        timestamp: impl Into<String>,
        client_ip: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            name: name.into(),
            client_ip: client_ip.into(),
            client_name: None,
            query_type: None,
        }
    }

    /// ISO-8601 timestamp with a trailing `Z`.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Extracts a [`QueryRecord`] from one log line, or `None` if the line is not a
/// well-formed query entry.
///
/// The log clock carries no zone. The timestamp is re-labeled with a `Z`
/// suffix as-is, hours are never shifted.
///
/// ```
/// use dns_query_collector::query::parse_line;
///
/// let line = "23-Jul-2021 14:20:30.123 queries: info: client @0x1234abcd 192.168.1.1#12345 (www.example.com)";
/// let record = parse_line(line).unwrap();
/// assert_eq!(record.timestamp(), "2021-07-23T14:20:30.123000Z");
/// assert_eq!(record.client_ip(), "192.168.1.1");
/// assert_eq!(record.name(), "www.example.com");
///
/// assert!(parse_line("This is not a valid DNS query log line.").is_none());
/// ```
pub fn parse_line(line: &str) -> Option<QueryRecord> {
    let captures = query_line_regex().captures(line)?;

    let timestamp = parse_timestamp(
        &captures[1],
        &captures[2],
        &captures[3],
        [&captures[4], &captures[5], &captures[6]],
        &captures[7],
    )?;

    Some(QueryRecord::new(
        format_timestamp(&timestamp),
        &captures[8],
        &captures[9],
    ))
}

fn parse_timestamp(
    day: &str,
    month: &str,
    year: &str,
    hms: [&str; 3],
    fraction: &str,
) -> Option<NaiveDateTime> {
    if day.len() > 2 || year.len() != 4 || hms.iter().any(|field| field.len() > 2) {
        return None;
    }
    if fraction.len() > 6 {
        return None;
    }

    let year: i32 = year.parse().ok()?;
    if year < 1 {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month_number(month)?, day.parse().ok()?)?;

    // ".123" is 123 milliseconds, so pad on the right up to microseconds
    let micros = fraction.parse::<u32>().ok()? * 10u32.pow(6 - fraction.len() as u32);
    let time = NaiveTime::from_hms_micro_opt(
        hms[0].parse().ok()?,
        hms[1].parse().ok()?,
        hms[2].parse().ok()?,
        micros,
    )?;

    Some(NaiveDateTime::new(date, time))
}

fn month_number(abbreviation: &str) -> Option<u32> {
    let month = match abbreviation.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Seconds precision when the fraction is zero, microseconds otherwise.
fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    let mut formatted = timestamp.format("%Y-%m-%dT%H:%M:%S").to_string();
    let micros = timestamp.nanosecond() / 1_000;
    if micros != 0 {
        formatted.push_str(&format!(".{micros:06}"));
    }
    formatted.push('Z');
    formatted
}
