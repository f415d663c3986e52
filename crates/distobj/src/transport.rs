// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message transports.
//!
//! The repository sees a transport as a bounded inbound queue it can poll
//! without blocking, plus a fire-and-forget send. Two implementations:
//!
//! - [`QueueTransport`]: in-process, fed by the embedding application
//! - [`TcpTransport`]: tokio TCP with `u32` big-endian length-prefixed frames

use crate::config::RepositoryConfig;
use crossbeam::queue::{ArrayQueue, SegQueue};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delay between retries while the inbound queue is full.
const BACKPRESSURE_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("empty frame")]
    EmptyFrame,

    #[error("inbound queue full")]
    QueueFull,
}

/// What the message pump needs from a connection.
pub trait Transport: Send + Sync {
    /// Next inbound message, without blocking.
    fn try_dequeue(&self) -> Option<Vec<u8>>;

    /// Queue an outbound message. Failures are logged, not returned.
    fn send(&self, message: Vec<u8>);

    /// False once the peer is gone and no more messages will arrive.
    fn is_open(&self) -> bool {
        true
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn try_dequeue(&self) -> Option<Vec<u8>> {
        (**self).try_dequeue()
    }

    fn send(&self, message: Vec<u8>) {
        (**self).send(message)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

// ---------------------------------------------------------------------------
// In-process transport
// ---------------------------------------------------------------------------

/// Bounded inbound queue plus a record of everything sent.
#[derive(Debug)]
pub struct QueueTransport {
    inbound: ArrayQueue<Vec<u8>>,
    sent: SegQueue<Vec<u8>>,
}

impl QueueTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            inbound: ArrayQueue::new(capacity.max(1)),
            sent: SegQueue::new(),
        }
    }

    /// Enqueue an inbound message; fails when the queue is full.
    pub fn push(&self, message: Vec<u8>) -> Result<(), TransportError> {
        self.inbound
            .push(message)
            .map_err(|_| TransportError::QueueFull)
    }

    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// Drain the outbound record, oldest first.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.sent.pop()).collect()
    }
}

impl Transport for QueueTransport {
    fn try_dequeue(&self) -> Option<Vec<u8>> {
        self.inbound.pop()
    }

    fn send(&self, message: Vec<u8>) {
        self.sent.push(message);
    }
}

// ---------------------------------------------------------------------------
// TCP transport
// ---------------------------------------------------------------------------

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` if the peer closed the connection between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_message_size: usize,
) -> Result<Option<Vec<u8>>, TransportError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(TransportError::EmptyFrame);
    }
    if len > max_message_size {
        return Err(TransportError::FrameTooLarge {
            len,
            max: max_message_size,
        });
    }

    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Ok(Some(frame))
}

/// Write one length-prefixed frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &[u8],
    max_message_size: usize,
) -> Result<(), TransportError> {
    if frame.is_empty() {
        return Err(TransportError::EmptyFrame);
    }
    if frame.len() > max_message_size {
        return Err(TransportError::FrameTooLarge {
            len: frame.len(),
            max: max_message_size,
        });
    }
    writer.write_all(&(frame.len() as u32).to_be_bytes()).await?;
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// TCP connection to the object server.
///
/// A reader task fills the inbound queue (waiting while it is full) and a
/// writer task drains the outbound channel. Both stop when the connection
/// drops; [`TcpTransport::is_connected`] reports it.
pub struct TcpTransport {
    inbound: Arc<ArrayQueue<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    connected: Arc<AtomicBool>,
    peer_addr: SocketAddr,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl TcpTransport {
    /// Connect to `server_host:server_port` from the configuration.
    pub async fn connect(config: &RepositoryConfig) -> Result<Self, TransportError> {
        let addr = config.server_addr();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: addr.clone(),
                source,
            })?;
        info!("Connected to object server at {}", addr);
        Self::from_stream(
            stream,
            config.inbound_queue_capacity,
            config.max_message_size,
        )
    }

    /// Wrap an established stream. Must be called inside a tokio runtime.
    pub fn from_stream(
        stream: TcpStream,
        queue_capacity: usize,
        max_message_size: usize,
    ) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        let (mut read_half, mut write_half) = stream.into_split();

        let inbound = Arc::new(ArrayQueue::new(queue_capacity.max(1)));
        let connected = Arc::new(AtomicBool::new(true));
        let (outbound, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let queue = Arc::clone(&inbound);
        let reader_connected = Arc::clone(&connected);
        let reader = tokio::spawn(async move {
            loop {
                match read_frame(&mut read_half, max_message_size).await {
                    Ok(Some(mut frame)) => {
                        while let Err(rejected) = queue.push(frame) {
                            frame = rejected;
                            tokio::time::sleep(BACKPRESSURE_DELAY).await;
                        }
                    }
                    Ok(None) => {
                        info!("Object server {} closed the connection", peer_addr);
                        break;
                    }
                    Err(e) => {
                        warn!("Read error from {}: {}", peer_addr, e);
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::Release);
        });

        let writer_connected = Arc::clone(&connected);
        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = write_frame(&mut write_half, &message, max_message_size).await {
                    warn!("Write error to {}: {}", peer_addr, e);
                    if !matches!(e, TransportError::FrameTooLarge { .. }) {
                        break;
                    }
                }
            }
            writer_connected.store(false, Ordering::Release);
            debug!("Writer for {} stopped", peer_addr);
        });

        Ok(Self {
            inbound,
            outbound,
            connected,
            peer_addr,
            reader,
            writer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Messages received but not yet dequeued.
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }
}

impl Transport for TcpTransport {
    fn try_dequeue(&self) -> Option<Vec<u8>> {
        self.inbound.pop()
    }

    fn send(&self, message: Vec<u8>) {
        if self.outbound.send(message).is_err() {
            warn!("Dropping outbound message to {}: connection closed", self.peer_addr);
        }
    }

    fn is_open(&self) -> bool {
        self.is_connected()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer_addr", &self.peer_addr)
            .field("connected", &self.is_connected())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn dequeue_within(transport: &TcpTransport, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(msg) = transport.try_dequeue() {
                return Some(msg);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn test_queue_transport() {
        let transport = QueueTransport::new(2);
        transport.push(vec![1]).unwrap();
        transport.push(vec![2]).unwrap();
        assert!(matches!(
            transport.push(vec![3]),
            Err(TransportError::QueueFull)
        ));

        assert_eq!(transport.try_dequeue(), Some(vec![1]));
        assert_eq!(transport.pending(), 1);

        transport.send(vec![9]);
        transport.send(vec![8]);
        assert_eq!(transport.take_sent(), vec![vec![9], vec![8]]);
        assert!(transport.take_sent().is_empty());
    }

    #[tokio::test]
    async fn test_frame_roundtrip_and_limits() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, b"hello", 16).await.unwrap();
        assert_eq!(read_frame(&mut b, 16).await.unwrap(), Some(b"hello".to_vec()));

        assert!(matches!(
            write_frame(&mut a, &[0u8; 17], 16).await,
            Err(TransportError::FrameTooLarge { len: 17, max: 16 })
        ));

        a.write_all(&100u32.to_be_bytes()).await.unwrap();
        assert!(matches!(
            read_frame(&mut b, 16).await,
            Err(TransportError::FrameTooLarge { len: 100, .. })
        ));

        drop(a);
        assert_eq!(read_frame(&mut b, 16).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tcp_transport_exchanges_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            write_frame(&mut stream, &[25, 0, 7, 0, 0, 0], 1024)
                .await
                .unwrap();
            read_frame(&mut stream, 1024).await.unwrap()
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let transport = TcpTransport::from_stream(stream, 8, 1024).unwrap();

        let msg = dequeue_within(&transport, Duration::from_secs(5)).await;
        assert_eq!(msg, Some(vec![25, 0, 7, 0, 0, 0]));

        transport.send(vec![27, 0, 7, 0, 0, 0]);
        let echoed = server.await.unwrap();
        assert_eq!(echoed, Some(vec![27, 0, 7, 0, 0, 0]));
    }

    #[tokio::test]
    async fn test_tcp_transport_reports_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let transport = TcpTransport::from_stream(stream, 8, 1024).unwrap();
        server.await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while transport.is_connected() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!transport.is_connected());
    }
}
