// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::aggregator::QueryAggregator;
use crate::batcher::{BatchDispatcher, DeliveryStats};
use crate::collector::{CollectorApi, QuerySender};
use crate::config::CollectorConfig;
use crate::errors::{FileAccessError, ReadError};
use crate::query::QueryRecord;
use crate::reader::QueryLogReader;
use std::path::Path;
use tracing::{debug, error, warn};

/// What a run saw and what it managed to deliver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub aggregator: QueryAggregator,
    pub delivery: DeliveryStats,
    /// Lines consumed from the log file, matching or not
    pub lines_read: u64,
    /// Lines skipped because they could not be decoded
    pub skipped_lines: u64,
}

/// Streams `records` into both the aggregator and the dispatcher, one at a
/// time, then ships whatever partial batch is left.
///
/// An unreadable line is skipped. An I/O failure stops the stream, but the
/// records read up to that point are still flushed and counted.
pub async fn run<I, S>(records: I, mut dispatcher: BatchDispatcher<S>) -> RunSummary
where
    I: IntoIterator<Item = Result<QueryRecord, ReadError>>,
    S: QuerySender,
{
    let mut aggregator = QueryAggregator::new();
    let mut skipped_lines = 0;

    for item in records {
        match item {
            Ok(record) => {
                aggregator.update(&record);
                dispatcher.add(record).await;
            }
            Err(e @ ReadError::Decode { .. }) => {
                warn!("Skipping {e}");
                skipped_lines += 1;
            }
            Err(e @ ReadError::Io { .. }) => {
                error!("Stopped reading query log: {e}");
                break;
            }
        }
    }

    dispatcher.flush().await;
    debug!(
        "Processed {} queries, {} batches sent, {} batches failed",
        aggregator.total(),
        dispatcher.stats().batches_sent,
        dispatcher.stats().batches_failed
    );

    RunSummary {
        aggregator,
        delivery: dispatcher.stats(),
        lines_read: 0,
        skipped_lines,
    }
}

/// Forwards every query in the log at `path` to the collector described by
/// `config`.
pub async fn forward_log(
    path: impl AsRef<Path>,
    config: &CollectorConfig,
) -> Result<RunSummary, FileAccessError> {
    let mut reader = QueryLogReader::open(path)?;
    let dispatcher = BatchDispatcher::new(CollectorApi::new(config), config.batch_size);
    let summary = run(&mut reader, dispatcher).await;
    Ok(RunSummary {
        lines_read: reader.lines_read(),
        ..summary
    })
}
