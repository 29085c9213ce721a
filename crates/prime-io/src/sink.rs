// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Record output
//!
//! The sink writes each record as one line to the primary destination and
//! optionally mirrors it to the visualizer over UDP. Two type filters decide
//! which records reach each destination; filter-mux messages replace them at
//! runtime.

use std::collections::HashSet;
use std::io::Write;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use parking_lot::Mutex;
use prime_protocol::{FilterTarget, Record, SinkControl};
use tracing::{debug, info};

use crate::{IoError, Result};

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Set of type tags a destination accepts; empty accepts everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter {
    tags: HashSet<String>,
}

impl TypeFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, api: &str) -> bool {
        self.tags.is_empty() || self.tags.contains(api)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Sink construction options
#[derive(Debug, Clone, Default)]
pub struct SinkConfig {
    pub file_filter: Vec<String>,
    pub visual_filter: Vec<String>,
    /// Visualizer endpoint; `None` disables the mirror
    pub visualizer: Option<SocketAddr>,
}

#[derive(Debug)]
struct VisualizerMirror {
    socket: UdpSocket,
    target: SocketAddr,
}

impl VisualizerMirror {
    fn connect(target: SocketAddr) -> Result<Self> {
        let bind: SocketAddr = if target.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0u8; 4], 0))
        };
        let socket = UdpSocket::bind(bind).map_err(|source| IoError::Bind {
            address: bind.to_string(),
            source,
        })?;
        Ok(Self { socket, target })
    }

    fn send(&self, line: &str) {
        if let Err(e) = self.socket.send_to(line.as_bytes(), self.target) {
            debug!("[SINK] Visualizer send to {} failed: {}", self.target, e);
        }
    }
}

/// Handle for flushing the sink's writer from another thread
#[derive(Clone)]
pub struct SinkHandle {
    writer: SharedWriter,
}

impl SinkHandle {
    pub fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

/// Destination for rendered records
pub struct Sink {
    writer: SharedWriter,
    file_filter: TypeFilter,
    visual_filter: TypeFilter,
    visualizer: Option<VisualizerMirror>,
}

impl Sink {
    pub fn new(writer: Box<dyn Write + Send>, config: SinkConfig) -> Result<Self> {
        let visualizer = match config.visualizer {
            Some(target) => {
                info!("[SINK] Mirroring records to visualizer at {}", target);
                Some(VisualizerMirror::connect(target)?)
            }
            None => None,
        };
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            file_filter: TypeFilter::new(config.file_filter),
            visual_filter: TypeFilter::new(config.visual_filter),
            visualizer,
        })
    }

    /// Sink writing to standard output
    pub fn stdout(config: SinkConfig) -> Result<Self> {
        Self::new(Box::new(std::io::stdout()), config)
    }

    pub fn handle(&self) -> SinkHandle {
        SinkHandle {
            writer: Arc::clone(&self.writer),
        }
    }

    pub fn file_filter(&self) -> &TypeFilter {
        &self.file_filter
    }

    pub fn visual_filter(&self) -> &TypeFilter {
        &self.visual_filter
    }

    pub fn apply(&mut self, control: &SinkControl) {
        match control {
            SinkControl::SetFilter { target, tags } => {
                let filter = TypeFilter::new(tags.iter().cloned());
                info!("[SINK] {:?} filter now has {} type(s)", target, filter.len());
                match target {
                    FilterTarget::File => self.file_filter = filter,
                    FilterTarget::Visual => self.visual_filter = filter,
                }
            }
        }
    }

    /// Apply the record's sink control (if any), then write it where the filters allow
    ///
    /// Filter-mux records bypass the filters.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        if let Some(control) = &record.control {
            self.apply(control);
        }
        let bypass = record.control.is_some();
        let line = record.render();

        if bypass || self.file_filter.allows(&record.api) {
            let mut writer = self.writer.lock();
            writeln!(writer, "{}", line)?;
            writer.flush()?;
        }

        if let Some(mirror) = &self.visualizer {
            if bypass || self.visual_filter.allows(&record.api) {
                mirror.send(&line);
            }
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.handle().flush()
    }
}

/// In-memory writer capturing every line, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured output split into lines
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buffer.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prime_protocol::Origin;
    use std::time::Duration;

    fn record(api: &str) -> Record {
        Record::new(&Origin::Local, api, "1")
    }

    #[test]
    fn test_empty_filter_passes_everything() {
        let memory = MemorySink::new();
        let mut sink = Sink::new(Box::new(memory.clone()), SinkConfig::default()).unwrap();
        sink.write(&record("PRIME_UI_RTM_STOP")).unwrap();
        sink.write(&record("ANYTHING")).unwrap();
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_file_filter_replaced_at_runtime() {
        let memory = MemorySink::new();
        let mut sink = Sink::new(Box::new(memory.clone()), SinkConfig::default()).unwrap();

        let mut mux = record("PRIME_UI_LOG_FILE_FILTER_MUX");
        mux.control = Some(SinkControl::SetFilter {
            target: FilterTarget::File,
            tags: vec!["PRIME_LOG_DEV_MON_CONT".to_string()],
        });
        sink.write(&mux).unwrap();
        sink.write(&record("PRIME_UI_RTM_STOP")).unwrap();
        sink.write(&record("PRIME_LOG_DEV_MON_CONT")).unwrap();

        assert_eq!(
            memory.lines(),
            vec![
                "source:UDS,api:PRIME_UI_LOG_FILE_FILTER_MUX,ts:1,",
                "source:UDS,api:PRIME_LOG_DEV_MON_CONT,ts:1,",
            ]
        );
        assert!(sink.visual_filter().is_empty());
    }

    #[test]
    fn test_visualizer_receives_filtered_lines() {
        let viz = UdpSocket::bind("127.0.0.1:0").unwrap();
        viz.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let memory = MemorySink::new();
        let mut sink = Sink::new(
            Box::new(memory.clone()),
            SinkConfig {
                visual_filter: vec!["PRIME_UI_DEV_ERROR".to_string()],
                visualizer: Some(viz.local_addr().unwrap()),
                ..Default::default()
            },
        )
        .unwrap();

        sink.write(&record("PRIME_UI_RTM_STOP")).unwrap();
        sink.write(&record("PRIME_UI_DEV_ERROR")).unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = viz.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"source:UDS,api:PRIME_UI_DEV_ERROR,ts:1,");
        assert_eq!(memory.len(), 2);
    }
}
