// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed-size batching in front of a [`QuerySender`].
//!
//! Delivery is at most once. A batch that fails to ship is logged and dropped,
//! it is never re-queued and the stream carries on with the next records.

use crate::collector::QuerySender;
use crate::constants::DEFAULT_BATCH_SIZE;
use crate::query::QueryRecord;
use tracing::{debug, error, info, warn};

/// Outcome counters across every flush of a dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub records_sent: u64,
    pub records_dropped: u64,
}

pub struct BatchDispatcher<S> {
    sender: S,
    batch_size: usize,
    pending: Vec<QueryRecord>,
    stats: DeliveryStats,
}

impl<S: QuerySender> BatchDispatcher<S> {
    pub fn new(sender: S, batch_size: usize) -> Self {
        let batch_size = if batch_size == 0 {
            warn!("Batch size must be greater than 0, using 1");
            1
        } else {
            batch_size
        };

        BatchDispatcher {
            sender,
            batch_size,
            pending: Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE)),
            stats: DeliveryStats::default(),
        }
    }

    /// Queues `record`, shipping the pending batch as soon as it is full.
    pub async fn add(&mut self, record: QueryRecord) {
        self.pending.push(record);
        if self.pending.len() >= self.batch_size {
            self.flush().await;
        }
    }

    /// Ships whatever is pending as one request. The pending batch is emptied
    /// whether or not the send succeeds.
    pub async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.pending);
        let n_records = batch.len() as u64;
        debug!("Flushing {n_records} queries");

        match self.sender.send(&batch).await {
            Ok(()) => {
                info!("Data sent successfully ({n_records} queries)");
                self.stats.batches_sent += 1;
                self.stats.records_sent += n_records;
            }
            Err(e) => {
                error!("Error sending data to collector, {n_records} queries dropped: {e}");
                self.stats.batches_failed += 1;
                self.stats.records_dropped += n_records;
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub(crate) fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    #[cfg(test)]
    pub(crate) fn sender(&self) -> &S {
        &self.sender
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::ShippingError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every batch it is handed. Fails the calls whose index is in
    /// `fail_on`.
    #[derive(Default)]
    pub(crate) struct RecordingSender {
        pub(crate) batches: Mutex<Vec<Vec<QueryRecord>>>,
        pub(crate) fail_on: Vec<usize>,
    }

    #[async_trait]
    impl QuerySender for RecordingSender {
        async fn send(&self, batch: &[QueryRecord]) -> Result<(), ShippingError> {
            let mut batches = self.batches.lock().expect("lock poisoned");
            let call = batches.len();
            batches.push(batch.to_vec());
            if self.fail_on.contains(&call) {
                return Err(ShippingError::Destination(None, "connection reset".into()));
            }
            Ok(())
        }
    }

    impl RecordingSender {
        pub(crate) fn batch_sizes(&self) -> Vec<usize> {
            self.batches
                .lock()
                .expect("lock poisoned")
                .iter()
                .map(Vec::len)
                .collect()
        }
    }

    fn record(i: usize) -> QueryRecord {
        QueryRecord::new(
            "2021-07-23T14:20:30.123000Z",
            format!("10.0.{}.{}", i / 256, i % 256),
            format!("host{i}.example.com"),
        )
    }

    #[tokio::test]
    async fn test_full_batch_flushes_once_in_order() {
        let mut dispatcher = BatchDispatcher::new(RecordingSender::default(), 500);
        for i in 0..500 {
            dispatcher.add(record(i)).await;
        }

        assert_eq!(dispatcher.sender().batch_sizes(), vec![500]);
        assert_eq!(dispatcher.pending_len(), 0);
        let batches = dispatcher.sender().batches.lock().expect("lock poisoned");
        let expected: Vec<QueryRecord> = (0..500).map(record).collect();
        assert_eq!(batches[0], expected);
    }

    #[tokio::test]
    async fn test_next_add_starts_a_new_batch() {
        let mut dispatcher = BatchDispatcher::new(RecordingSender::default(), 500);
        for i in 0..501 {
            dispatcher.add(record(i)).await;
        }

        assert_eq!(dispatcher.sender().batch_sizes(), vec![500]);
        assert_eq!(dispatcher.pending_len(), 1);

        dispatcher.flush().await;
        assert_eq!(dispatcher.sender().batch_sizes(), vec![500, 1]);
        let batches = dispatcher.sender().batches.lock().expect("lock poisoned");
        assert_eq!(batches[1], vec![record(500)]);
    }

    #[tokio::test]
    async fn test_flush_on_empty_is_noop() {
        let mut dispatcher = BatchDispatcher::new(RecordingSender::default(), 3);
        dispatcher.flush().await;
        assert!(dispatcher.sender().batch_sizes().is_empty());
        assert_eq!(dispatcher.stats(), DeliveryStats::default());
    }

    #[tokio::test]
    async fn test_failed_batch_is_dropped_and_stream_continues() {
        let sender = RecordingSender {
            fail_on: vec![0],
            ..Default::default()
        };
        let mut dispatcher = BatchDispatcher::new(sender, 2);
        for i in 0..5 {
            dispatcher.add(record(i)).await;
        }
        dispatcher.flush().await;

        assert_eq!(dispatcher.sender().batch_sizes(), vec![2, 2, 1]);
        assert_eq!(
            dispatcher.stats(),
            DeliveryStats {
                batches_sent: 2,
                batches_failed: 1,
                records_sent: 3,
                records_dropped: 2,
            }
        );
        let batches = dispatcher.sender().batches.lock().expect("lock poisoned");
        assert_eq!(batches[1], vec![record(2), record(3)]);
    }

    #[tokio::test]
    async fn test_zero_batch_size_ships_every_record() {
        let mut dispatcher = BatchDispatcher::new(RecordingSender::default(), 0);
        assert_eq!(dispatcher.batch_size(), 1);
        dispatcher.add(record(0)).await;
        dispatcher.add(record(1)).await;
        assert_eq!(dispatcher.sender().batch_sizes(), vec![1, 1]);
    }
}
