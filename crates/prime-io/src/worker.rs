// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Consumer worker
//!
//! [`Consumer`] decodes each datagram, reports diagnostics and writes the
//! record. [`Consumer::spawn`] moves it onto the `prime-consumer` thread,
//! controlled through the returned [`ConsumerThread`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use prime_protocol::Decoder;
use tracing::{debug, info, warn};

use crate::channels::QueueCounters;
use crate::sink::Sink;
use crate::{Datagram, IoError, Result};

/// Consumer progress is logged every this many datagrams
const PROGRESS_INTERVAL: u64 = 1000;

const THREAD_NAME: &str = "prime-consumer";

/// Handle to the running consumer
///
/// Datagrams still queued when the consumer stops are discarded. The thread
/// is joined on drop.
pub struct ConsumerThread {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl ConsumerThread {
    /// Signal the consumer to stop and wait for it to finish
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.join() {
                warn!("[CONSUMER] Join error: {:?}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ConsumerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The single consumer of the message queue
///
/// Owns the decoder (and therefore the registry) and the sink, so decoding,
/// registry updates and output all happen in queue order on one thread.
pub struct Consumer {
    decoder: Decoder,
    sink: Sink,
    counters: Arc<QueueCounters>,
}

impl Consumer {
    pub fn new(decoder: Decoder, sink: Sink, counters: Arc<QueueCounters>) -> Self {
        Self {
            decoder,
            sink,
            counters,
        }
    }

    /// Decode one datagram and write its record
    ///
    /// Decode failures are logged and swallowed; only output errors are returned.
    pub fn process(&mut self, datagram: Datagram) -> Result<()> {
        let result = self.decoder.decode(&datagram.payload, &datagram.origin);
        let processed = {
            self.counters.record_processed();
            self.counters.processed()
        };
        if processed % PROGRESS_INTERVAL == 0 {
            debug!(
                "[CONSUMER] {} processed, {} received",
                processed,
                self.counters.received()
            );
        }

        match result {
            Ok(record) => {
                for diagnostic in &record.diagnostics {
                    warn!("[DECODER] {} (from {})", diagnostic, datagram.origin);
                }
                self.sink.write(&record)
            }
            Err(e) => {
                warn!("[DECODER] Dropped message from {}: {}", datagram.origin, e);
                Ok(())
            }
        }
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Run on a dedicated thread fed by `rx` until stopped or the queue closes
    pub fn spawn(mut self, rx: Receiver<Datagram>) -> Result<ConsumerThread> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                while !shutdown_clone.load(Ordering::Relaxed) {
                    match rx.recv_timeout(Duration::from_millis(100)) {
                        Ok(datagram) => {
                            if let Err(e) = self.process(datagram) {
                                warn!("[CONSUMER] Write failed: {}", e);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| IoError::Transport(format!("Failed to spawn {}: {}", THREAD_NAME, e)))?;

        Ok(ConsumerThread {
            handle: Some(handle),
            shutdown,
        })
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let stats = self.decoder.stats();
        info!(
            "[CONSUMER] Shutting down: {} json, {} compact, {} malformed, {} missing field, {} invalid field, {} unknown type, {} unknown opcode",
            stats.json,
            stats.compact,
            stats.malformed,
            stats.missing_field,
            stats.invalid_field,
            stats.unknown_type,
            stats.unknown_opcode
        );
        if let Err(e) = self.sink.flush() {
            warn!("[CONSUMER] Final flush failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::MessageQueue;
    use crate::sink::{MemorySink, SinkConfig};
    use crossbeam::channel;
    use prime_protocol::{DecoderConfig, Origin};
    use std::time::Instant;

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn consumer(queue: &MessageQueue, memory: &MemorySink) -> Consumer {
        let sink = Sink::new(Box::new(memory.clone()), SinkConfig::default()).unwrap();
        Consumer::new(
            Decoder::new(DecoderConfig::default()),
            sink,
            queue.counters(),
        )
    }

    #[test]
    fn test_consumer_thread_start_stop() {
        let queue = MessageQueue::new();
        let memory = MemorySink::new();
        let mut worker = consumer(&queue, &memory).spawn(queue.receiver()).unwrap();
        assert!(worker.is_running());

        let tx = queue.sender();
        for ts in 1..=3 {
            let payload = format!(r#"{{"type":"PRIME_UI_RTM_STOP","ts":{}}}"#, ts);
            tx.push(Datagram::new(payload, Origin::Local)).unwrap();
        }

        wait_for(|| memory.len() == 3);
        worker.stop();
        assert!(!worker.is_running());
        assert_eq!(memory.len(), 3);
        assert_eq!(queue.stats().processed, 3);
    }

    #[test]
    fn test_consumer_exits_when_queue_closes() {
        let (tx, rx) = channel::unbounded::<Datagram>();
        let queue = MessageQueue::new();
        let memory = MemorySink::new();
        let worker = consumer(&queue, &memory).spawn(rx).unwrap();

        drop(tx);
        wait_for(|| !worker.is_running());
        assert!(!worker.is_running());
    }

    #[test]
    fn test_consumer_survives_bad_input() {
        let queue = MessageQueue::new();
        let memory = MemorySink::new();
        let mut worker = consumer(&queue, &memory).spawn(queue.receiver()).unwrap();

        let tx = queue.sender();
        tx.push(Datagram::new(vec![0xff, 0x00, 0x13], Origin::Local)).unwrap();
        tx.push(Datagram::new("{\"type\":\"APP_REG\"}", Origin::Local)).unwrap();
        tx.push(Datagram::new(
            r#"{"type":"APP_REG","ts":1000,"data":{"proc_id":42}}"#,
            Origin::Local,
        ))
        .unwrap();

        wait_for(|| queue.stats().processed == 3);
        worker.stop();

        assert_eq!(
            memory.lines(),
            vec!["source:UDS,api:APP_REG,ts:1000,proc_id:42,"]
        );
    }
}
