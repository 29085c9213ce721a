// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Datagram listeners
//!
//! Each listener owns one bound socket and one named thread that pushes every
//! received datagram onto the message queue. Sockets use a short read timeout
//! so the thread notices shutdown without needing a wake-up datagram.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
#[cfg(unix)]
use std::os::unix::net::UnixDatagram;
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use prime_protocol::Origin;
use tracing::{debug, info, warn};

use crate::channels::QueueSender;
use crate::{Datagram, IoError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Largest payload a single datagram can carry
const MAX_DATAGRAM_SIZE: usize = 65535;

/// Where the logger listens; fixed for the life of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenMode {
    /// Remote mode: UDP on the given address
    Udp(SocketAddr),
    /// Local mode: datagram socket at the given filesystem path
    #[cfg(unix)]
    Local(PathBuf),
}

/// A running listener of either kind
#[derive(Debug)]
pub enum Listener {
    Udp(UdpListener),
    #[cfg(unix)]
    Local(LocalListener),
}

impl Listener {
    /// Bind according to `mode` and start receiving
    pub fn bind(mode: &ListenMode, max_datagram_size: usize, queue: QueueSender) -> Result<Self> {
        if !(1..=MAX_DATAGRAM_SIZE).contains(&max_datagram_size) {
            return Err(IoError::Config(format!(
                "max datagram size {} is outside 1-{}",
                max_datagram_size, MAX_DATAGRAM_SIZE
            )));
        }
        match mode {
            ListenMode::Udp(addr) => {
                UdpListener::bind(*addr, max_datagram_size, queue).map(Listener::Udp)
            }
            #[cfg(unix)]
            ListenMode::Local(path) => {
                LocalListener::bind(path, max_datagram_size, queue).map(Listener::Local)
            }
        }
    }

    pub fn stop(&mut self) {
        match self {
            Listener::Udp(listener) => listener.stop(),
            #[cfg(unix)]
            Listener::Local(listener) => listener.stop(),
        }
    }

    pub fn is_running(&self) -> bool {
        match self {
            Listener::Udp(listener) => listener.is_running(),
            #[cfg(unix)]
            Listener::Local(listener) => listener.is_running(),
        }
    }
}

/// Receive thread shared by both listener kinds
#[derive(Debug)]
struct ReceiveThread {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    name: String,
}

impl ReceiveThread {
    fn spawn<R>(name: &str, max_datagram_size: usize, queue: QueueSender, mut recv: R) -> Result<Self>
    where
        R: FnMut(&mut [u8]) -> std::io::Result<(usize, Origin)> + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let name_clone = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut buf = vec![0u8; max_datagram_size];
                while !shutdown_clone.load(Ordering::Relaxed) {
                    match recv(&mut buf) {
                        Ok((len, origin)) => {
                            if let Err(e) = queue.push(Datagram::new(&buf[..len], origin)) {
                                info!("[LISTENER] {} stopping: {}", name_clone, e);
                                break;
                            }
                        }
                        Err(e)
                            if matches!(
                                e.kind(),
                                ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                            ) =>
                        {
                            // Normal timeout, check shutdown flag
                            continue;
                        }
                        Err(e) => {
                            warn!("[LISTENER] {} receive failed: {}", name_clone, e);
                            thread::sleep(POLL_INTERVAL);
                        }
                    }
                }
                debug!("[LISTENER] {} exited", name_clone);
            })
            .map_err(|e| IoError::Transport(format!("Failed to spawn {}: {}", name, e)))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
            name: name.to_string(),
        })
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.join() {
                warn!("[LISTENER] {} join error: {:?}", self.name, e);
            }
        }
    }

    fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ReceiveThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Remote-mode listener on a UDP socket
///
/// Datagrams are tagged with the sender's IP address (without port).
#[derive(Debug)]
pub struct UdpListener {
    local_addr: SocketAddr,
    thread: ReceiveThread,
}

impl UdpListener {
    pub fn bind(addr: SocketAddr, max_datagram_size: usize, queue: QueueSender) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| IoError::Bind {
            address: addr.to_string(),
            source,
        })?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|e| IoError::Transport(format!("Failed to set read timeout: {}", e)))?;
        let local_addr = socket.local_addr()?;

        let thread = ReceiveThread::spawn(
            "prime-udp-listener",
            max_datagram_size,
            queue,
            move |buf: &mut [u8]| {
                socket
                    .recv_from(buf)
                    .map(|(len, peer)| (len, Origin::Remote(peer.ip().to_string())))
            },
        )?;

        info!("[LISTENER] Remote logger listening on {}", local_addr);
        Ok(Self { local_addr, thread })
    }

    /// Bound address (useful when binding port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop(&mut self) {
        self.thread.stop();
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_running()
    }
}

/// Local-mode listener on a filesystem datagram socket
///
/// A stale socket file left by a previous run is removed before binding, and
/// the file is removed again on stop.
#[cfg(unix)]
#[derive(Debug)]
pub struct LocalListener {
    path: PathBuf,
    thread: ReceiveThread,
}

#[cfg(unix)]
impl LocalListener {
    pub fn bind(path: &Path, max_datagram_size: usize, queue: QueueSender) -> Result<Self> {
        remove_socket_file(path).map_err(|source| IoError::Bind {
            address: path.display().to_string(),
            source,
        })?;
        let socket = UnixDatagram::bind(path).map_err(|source| IoError::Bind {
            address: path.display().to_string(),
            source,
        })?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|e| IoError::Transport(format!("Failed to set read timeout: {}", e)))?;

        let thread = ReceiveThread::spawn(
            "prime-uds-listener",
            max_datagram_size,
            queue,
            move |buf: &mut [u8]| socket.recv(buf).map(|len| (len, Origin::Local)),
        )?;

        info!("[LISTENER] Local logger listening on {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            thread,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stop(&mut self) {
        self.thread.stop();
        if let Err(e) = remove_socket_file(&self.path) {
            warn!(
                "[LISTENER] Failed to remove socket {}: {}",
                self.path.display(),
                e
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_running()
    }
}

#[cfg(unix)]
impl Drop for LocalListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Remove a socket file; a missing file is not an error
#[cfg(unix)]
pub fn remove_socket_file(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("[LISTENER] Removed socket file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::MessageQueue;

    #[test]
    fn test_udp_listener_tags_peer_ip() {
        let queue = MessageQueue::new();
        let mut listener =
            UdpListener::bind("127.0.0.1:0".parse().unwrap(), 65535, queue.sender()).unwrap();
        assert!(listener.is_running());

        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(b"hello", listener.local_addr()).unwrap();

        let datagram = queue.receiver().recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(datagram.payload, b"hello");
        assert_eq!(datagram.origin, Origin::Remote("127.0.0.1".to_string()));

        listener.stop();
        assert!(!listener.is_running());
    }

    #[test]
    fn test_udp_bind_conflict_is_reported() {
        let queue = MessageQueue::new();
        let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
        let err = UdpListener::bind(taken.local_addr().unwrap(), 65535, queue.sender()).unwrap_err();
        assert!(matches!(err, IoError::Bind { .. }));
    }

    #[test]
    fn test_zero_datagram_size_is_rejected() {
        let queue = MessageQueue::new();
        let mode = ListenMode::Udp("127.0.0.1:0".parse().unwrap());
        let err = Listener::bind(&mode, 0, queue.sender()).unwrap_err();
        assert!(matches!(err, IoError::Config(_)));
        let err = Listener::bind(&mode, 70_000, queue.sender()).unwrap_err();
        assert!(matches!(err, IoError::Config(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_local_listener_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logger.uds");
        std::fs::write(&path, b"stale").unwrap();

        let queue = MessageQueue::new();
        let listener = LocalListener::bind(&path, 65535, queue.sender()).unwrap();

        let client = UnixDatagram::unbound().unwrap();
        client.send_to(b"local", &path).unwrap();
        let datagram = queue.receiver().recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(datagram.origin, Origin::Local);
        assert_eq!(datagram.payload, b"local");

        drop(listener);
        assert!(!path.exists());
    }
}
