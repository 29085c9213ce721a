// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Message queue between the listeners and the consumer
//!
//! The queue is unbounded: listeners never block on a slow consumer, and
//! datagrams are handed over in the order they were received.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::{Datagram, IoError, Result};

/// Create an unbounded channel
///
/// # Returns
/// - `(Sender<T>, Receiver<T>)`: Channel endpoints
///
/// `send()` only fails once every receiver has been dropped.
pub fn create_unbounded<T>() -> (Sender<T>, Receiver<T>) {
    unbounded()
}

/// Lifetime counters shared by the producer and consumer sides
#[derive(Debug, Default)]
pub struct QueueCounters {
    received: AtomicU64,
    processed: AtomicU64,
}

impl QueueCounters {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

/// Snapshot of queue health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub len: usize,
    pub is_empty: bool,
    pub received: u64,
    pub processed: u64,
}

impl QueueStats {
    /// Get statistics for a channel
    pub fn from_channel<T>(sender: &Sender<T>, counters: &QueueCounters) -> Self {
        Self {
            len: sender.len(),
            is_empty: sender.is_empty(),
            received: counters.received(),
            processed: counters.processed(),
        }
    }

    /// Datagrams received but not yet processed
    pub fn backlog(&self) -> u64 {
        self.received.saturating_sub(self.processed)
    }
}

/// Producer handle given to each listener
#[derive(Debug, Clone)]
pub struct QueueSender {
    inner: Sender<Datagram>,
    counters: Arc<QueueCounters>,
}

impl QueueSender {
    /// Enqueue a datagram; fails only when the consumer side is gone
    pub fn push(&self, datagram: Datagram) -> Result<()> {
        // counted first so `processed` never overtakes `received`
        self.counters.record_received();
        self.inner
            .send(datagram)
            .map_err(|_| IoError::NotRunning("message queue consumer disconnected".to_string()))
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats::from_channel(&self.inner, &self.counters)
    }
}

/// FIFO queue of received datagrams
#[derive(Debug)]
pub struct MessageQueue {
    sender: Sender<Datagram>,
    receiver: Receiver<Datagram>,
    counters: Arc<QueueCounters>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        let (sender, receiver) = create_unbounded();
        Self {
            sender,
            receiver,
            counters: Arc::new(QueueCounters::default()),
        }
    }

    pub fn sender(&self) -> QueueSender {
        QueueSender {
            inner: self.sender.clone(),
            counters: Arc::clone(&self.counters),
        }
    }

    pub fn receiver(&self) -> Receiver<Datagram> {
        self.receiver.clone()
    }

    pub fn counters(&self) -> Arc<QueueCounters> {
        Arc::clone(&self.counters)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats::from_channel(&self.sender, &self.counters)
    }
}
