//! UDP ingestion channel.
//!
//! A background thread blocks on the socket and pushes each datagram, decoded
//! as UTF-8, onto an mpsc queue. The game loop drains that queue once per tick
//! with [`MessageSource::dequeue_all`], which never blocks.
//!
//! Stopping is cooperative: the stop flag is cleared, a zero-length datagram
//! is sent to the socket to wake a pending receive, and the thread is joined.
//! The socket is closed when the thread exits. The receive timeout bounds how
//! long the thread can stay blocked if the wake datagram is lost.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::IngestConfig;
use crate::error::{Error, Result};

/// Largest payload a UDP datagram can carry
const MAX_DATAGRAM: usize = 65_507;

/// Pause after the first of a run of unexpected receive errors
const ERROR_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ERROR_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Something the frame dispatcher can drain once per tick.
pub trait MessageSource {
    /// Pop every queued message without blocking, oldest first.
    fn dequeue_all(&self) -> Vec<String>;
}

struct Worker {
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

pub struct IngestionChannel {
    poll_interval: Duration,
    sender: Sender<String>,
    receiver: Receiver<String>,
    listening: Arc<AtomicBool>,
    worker: Option<Worker>,
}

impl IngestionChannel {
    pub fn new(poll_interval: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            poll_interval,
            sender,
            receiver,
            listening: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(Duration::from_millis(config.poll_interval_ms.max(1)))
    }

    /// Bind `port` on all interfaces and start the receive thread.
    ///
    /// Port 0 binds an ephemeral port. Calling this while already listening
    /// is a no-op that returns the existing address.
    pub fn start(&mut self, port: u16) -> Result<SocketAddr> {
        if let Some(worker) = &self.worker {
            debug!("UDP receiver already listening on {}", worker.local_addr);
            return Ok(worker.local_addr);
        }

        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        let socket = UdpSocket::bind(addr).map_err(|source| Error::Bind { port, source })?;
        socket.set_read_timeout(Some(self.poll_interval))?;
        let local_addr = socket.local_addr()?;

        self.listening.store(true, Ordering::SeqCst);
        let listening = Arc::clone(&self.listening);
        let sender = self.sender.clone();

        let spawned = thread::Builder::new()
            .name("strikesync-ingest".into())
            .spawn(move || listen_loop(socket, listening, sender));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.listening.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        info!("UDP receiver started on {}", local_addr);
        self.worker = Some(Worker { handle, local_addr });
        Ok(local_addr)
    }

    /// Stop the receive thread and close the socket. Safe to call when idle.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.listening.store(false, Ordering::SeqCst);
        wake(worker.local_addr);

        if worker.handle.join().is_err() {
            error!("UDP listen thread panicked");
        }
        info!("UDP receiver shut down");
    }

    pub fn is_listening(&self) -> bool {
        self.worker.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.worker.as_ref().map(|w| w.local_addr)
    }
}

impl MessageSource for IngestionChannel {
    fn dequeue_all(&self) -> Vec<String> {
        self.receiver.try_iter().collect()
    }
}

/// In-memory source for offline replay: each call to `dequeue_all` hands out
/// what was pushed since the previous call.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    queue: RefCell<VecDeque<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: impl Into<String>) {
        self.queue.borrow_mut().push_back(message.into());
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl MessageSource for ScriptedSource {
    fn dequeue_all(&self) -> Vec<String> {
        self.queue.borrow_mut().drain(..).collect()
    }
}

impl Drop for IngestionChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen_loop(socket: UdpSocket, listening: Arc<AtomicBool>, sender: Sender<String>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut errors = ErrorBackoff::default();

    while listening.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                errors.reset();
                if !listening.load(Ordering::SeqCst) {
                    break;
                }
                match std::str::from_utf8(&buf[..len]) {
                    Ok(text) => {
                        if sender.send(text.to_owned()).is_err() {
                            // Channel owner is gone
                            break;
                        }
                    }
                    Err(e) => warn!("Dropping non-UTF-8 datagram from {}: {}", from, e),
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) => {
                if !listening.load(Ordering::SeqCst) {
                    break;
                }
                let delay = errors.next_delay();
                if errors.count() == 1 {
                    error!("UDP receive error: {}", e);
                } else {
                    debug!("UDP receive error #{}: {}", errors.count(), e);
                }
                thread::sleep(delay);
            }
        }
    }

    if errors.count() > 1 {
        warn!("UDP listen thread saw {} receive errors in a row", errors.count());
    }
    debug!("UDP listen thread exiting");
}

/// Doubling delay across consecutive receive errors, reset by any datagram
#[derive(Debug, Default)]
struct ErrorBackoff {
    consecutive: u32,
}

impl ErrorBackoff {
    fn next_delay(&mut self) -> Duration {
        self.consecutive = self.consecutive.saturating_add(1);
        let shift = (self.consecutive - 1).min(16);
        ERROR_BACKOFF_MIN
            .saturating_mul(1 << shift)
            .min(ERROR_BACKOFF_MAX)
    }

    fn count(&self) -> u32 {
        self.consecutive
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

/// Unblock a pending `recv_from` on `target` with an empty datagram.
fn wake(target: SocketAddr) {
    let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, target.port()));
    let sent = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).and_then(|s| s.send_to(&[], loopback));
    if let Err(e) = sent {
        debug!("Wake datagram failed ({}), waiting for receive timeout", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn send_to(addr: SocketAddr, payloads: &[&str]) {
        let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let target = SocketAddr::from((Ipv4Addr::LOCALHOST, addr.port()));
        for payload in payloads {
            client.send_to(payload.as_bytes(), target).unwrap();
        }
    }

    fn collect(channel: &IngestionChannel, expected: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut out = Vec::new();
        while out.len() < expected && Instant::now() < deadline {
            out.extend(channel.dequeue_all());
            thread::sleep(Duration::from_millis(5));
        }
        out
    }

    #[test]
    fn test_scripted_source_drains_in_order() {
        let source = ScriptedSource::new();
        source.push("a");
        source.push("b");
        assert_eq!(source.len(), 2);
        assert_eq!(source.dequeue_all(), vec!["a", "b"]);
        assert!(source.is_empty());
        assert!(source.dequeue_all().is_empty());
    }

    #[test]
    fn test_dequeue_all_on_empty_queue_returns_immediately() {
        let channel = IngestionChannel::new(Duration::from_millis(20));
        let start = Instant::now();
        assert!(channel.dequeue_all().is_empty());
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_receives_in_arrival_order() {
        let mut channel = IngestionChannel::new(Duration::from_millis(20));
        let addr = channel.start(0).unwrap();

        send_to(addr, &["one", "two", "three"]);
        let messages = collect(&channel, 3);
        assert_eq!(messages, vec!["one", "two", "three"]);

        channel.stop();
    }

    #[test]
    fn test_second_start_is_noop() {
        let mut channel = IngestionChannel::new(Duration::from_millis(20));
        let first = channel.start(0).unwrap();
        let second = channel.start(0).unwrap();
        assert_eq!(first, second);
        assert!(channel.is_listening());
        channel.stop();
    }

    #[test]
    fn test_stop_is_prompt_and_idempotent() {
        let mut channel = IngestionChannel::new(Duration::from_secs(5));
        channel.start(0).unwrap();

        let start = Instant::now();
        channel.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!channel.is_listening());
        assert!(channel.local_addr().is_none());

        channel.stop();
        assert!(!channel.is_listening());
    }

    #[test]
    fn test_restart_after_stop() {
        let mut channel = IngestionChannel::new(Duration::from_millis(20));
        channel.start(0).unwrap();
        channel.stop();

        let addr = channel.start(0).unwrap();
        send_to(addr, &["again"]);
        assert_eq!(collect(&channel, 1), vec!["again"]);
    }

    #[test]
    fn test_bind_failure_is_reported() {
        let blocker = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = blocker.local_addr().unwrap().port();

        let mut channel = IngestionChannel::new(Duration::from_millis(20));
        let err = channel.start(port).unwrap_err();
        assert!(matches!(err, Error::Bind { port: p, .. } if p == port));
        assert!(!channel.is_listening());
    }

    #[test]
    fn test_error_backoff_doubles_and_caps() {
        let mut backoff = ErrorBackoff::default();
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        assert_eq!(backoff.next_delay(), Duration::from_millis(40));
        assert_eq!(backoff.count(), 3);

        for _ in 0..40 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), ERROR_BACKOFF_MAX);

        backoff.reset();
        assert_eq!(backoff.count(), 0);
        assert_eq!(backoff.next_delay(), ERROR_BACKOFF_MIN);
    }

    #[test]
    fn test_invalid_utf8_is_dropped() {
        let mut channel = IngestionChannel::new(Duration::from_millis(20));
        let addr = channel.start(0).unwrap();

        let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let target = SocketAddr::from((Ipv4Addr::LOCALHOST, addr.port()));
        client.send_to(&[0xff, 0xfe, 0xfd], target).unwrap();
        client.send_to(b"ok", target).unwrap();

        assert_eq!(collect(&channel, 1), vec!["ok"]);
    }
}
