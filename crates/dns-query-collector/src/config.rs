// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_LOG_LEVEL, DEFAULT_TIMEOUT_SECS, DEFAULT_TOP_N, DNS_QUERIES_PATH,
};
use crate::errors::ConfigError;
use std::env;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const ENDPOINT_VAR: &str = "LUMU_ENDPOINT";
pub const API_KEY_VAR: &str = "LUMU_API_KEY";
pub const COLLECTOR_ID_VAR: &str = "LUMU_COLLECTOR_ID";
pub const TOP_N_VAR: &str = "LUMU_TOP_N";
pub const BATCH_SIZE_VAR: &str = "LUMU_BATCH_SIZE";
pub const TIMEOUT_VAR: &str = "LUMU_TIMEOUT_SECS";
pub const PROXY_VAR: &str = "LUMU_PROXY_HTTPS";
pub const LOG_LEVEL_VAR: &str = "LUMU_LOG_LEVEL";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Settings for one forwarding run, read once at process start.
#[derive(Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Collector base URL, e.g. `https://api.lumu.io/collectors`
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub collector_id: Option<String>,
    /// Entries shown per ranked section of the report
    pub top_n: usize,
    /// Records per collector request
    pub batch_size: usize,
    /// Timeout for each collector request, in seconds
    pub timeout_secs: u64,
    pub https_proxy: Option<String>,
    pub log_level: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            collector_id: None,
            top_n: DEFAULT_TOP_N,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            https_proxy: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("collector_id", &self.collector_id)
            .field("top_n", &self.top_n)
            .field("batch_size", &self.batch_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("https_proxy", &self.https_proxy)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl CollectorConfig {
    /// Create configuration from environment variables.
    ///
    /// Collector credentials are optional here: a run without them still
    /// parses the log and prints statistics, only the sends fail. Values that
    /// do not make sense are logged and replaced by their defaults.
    pub fn from_env() -> Self {
        // A negative count asks for no rows rather than an error
        let top_n = parse_var::<i64>(TOP_N_VAR)
            .map(|n| usize::try_from(n).unwrap_or(0))
            .unwrap_or(DEFAULT_TOP_N);

        let batch_size = match parse_var::<usize>(BATCH_SIZE_VAR) {
            Some(0) => {
                warn!("{BATCH_SIZE_VAR} must be greater than 0, using {DEFAULT_BATCH_SIZE}");
                DEFAULT_BATCH_SIZE
            }
            Some(size) => size,
            None => DEFAULT_BATCH_SIZE,
        };

        let log_level = match non_empty_var(LOG_LEVEL_VAR).map(|val| val.to_lowercase()) {
            Some(level) if is_valid_log_level(&level) => level,
            Some(level) => {
                warn!(
                    "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error. Using {DEFAULT_LOG_LEVEL}"
                );
                DEFAULT_LOG_LEVEL.to_string()
            }
            None => DEFAULT_LOG_LEVEL.to_string(),
        };

        Self {
            endpoint: non_empty_var(ENDPOINT_VAR),
            api_key: non_empty_var(API_KEY_VAR),
            collector_id: non_empty_var(COLLECTOR_ID_VAR),
            top_n,
            batch_size,
            timeout_secs: parse_var(TIMEOUT_VAR).unwrap_or(DEFAULT_TIMEOUT_SECS),
            https_proxy: non_empty_var(PROXY_VAR).or_else(|| non_empty_var("HTTPS_PROXY")),
            log_level,
        }
    }

    /// `<endpoint>/<collector-id>/dns/queries?key=<api-key>`, or the list of
    /// variables that are missing to build it.
    pub fn intake_url(&self) -> Result<String, ConfigError> {
        let mut missing = Vec::new();
        if self.endpoint.is_none() {
            missing.push(ENDPOINT_VAR);
        }
        if self.api_key.is_none() {
            missing.push(API_KEY_VAR);
        }
        if self.collector_id.is_none() {
            missing.push(COLLECTOR_ID_VAR);
        }

        match (&self.endpoint, &self.collector_id, &self.api_key) {
            (Some(endpoint), Some(collector_id), Some(api_key)) => Ok(format!(
                "{}/{collector_id}/{DNS_QUERIES_PATH}?key={api_key}",
                endpoint.trim_end_matches('/')
            )),
            _ => Err(ConfigError::Missing(missing)),
        }
    }
}

/// The level requested in `LUMU_LOG_LEVEL`, if it is a valid one.
///
/// Read without logging so the subscriber can be installed before
/// [`CollectorConfig::from_env`] reports on the rest of the settings.
pub fn log_level_from_env() -> Option<String> {
    non_empty_var(LOG_LEVEL_VAR)
        .map(|val| val.to_lowercase())
        .filter(|level| is_valid_log_level(level))
}

fn is_valid_log_level(level: &str) -> bool {
    VALID_LOG_LEVELS.contains(&level)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = non_empty_var(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{key} has an invalid value '{raw}', using the default");
            None
        }
    }
}
