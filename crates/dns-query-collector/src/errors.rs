// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for reading query logs and shipping batches.

use reqwest::StatusCode;
use std::path::PathBuf;

/// The query log cannot be used as input. Fatal for a run.
#[derive(Debug, thiserror::Error)]
pub enum FileAccessError {
    #[error("File {} not found.", .0.display())]
    NotFound(PathBuf),

    #[error("Unable to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A failure while streaming lines out of an opened query log.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("line {line} is not valid UTF-8")]
    Decode { line: u64 },

    #[error("failed to read line {line}: {source}")]
    Io {
        line: u64,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {} not set", .0.join(", "))]
    Missing(Vec<&'static str>),
}

/// A batch could not be delivered. The batch is dropped by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ShippingError {
    #[error("Failed to prepare payload: {0}")]
    Payload(String),

    #[error("Collector is not configured: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Error shipping data: {0:?} {1}")]
    Destination(Option<StatusCode>, String),
}
