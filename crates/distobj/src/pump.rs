// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message pump.
//!
//! Drains the transport's inbound queue into the dispatcher. Undecodable
//! messages are logged and dropped; fatal dispatch errors stop the pump and
//! are returned to the caller.

use crate::codec::FieldValue;
use crate::dispatcher::{DispatchError, LifecycleDispatcher};
use crate::object::ObjectId;
use crate::protocol::{self, LifecycleMessage};
use crate::transport::Transport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

pub struct MessagePump<T: Transport> {
    dispatcher: LifecycleDispatcher,
    transport: T,
    stats: Arc<PumpStats>,
    shutdown: Arc<Notify>,
}

impl<T: Transport> MessagePump<T> {
    pub fn new(dispatcher: LifecycleDispatcher, transport: T) -> Self {
        Self {
            dispatcher,
            transport,
            stats: Arc::new(PumpStats::new()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn dispatcher(&self) -> &LifecycleDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut LifecycleDispatcher {
        &mut self.dispatcher
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> Arc<PumpStats> {
        Arc::clone(&self.stats)
    }

    /// Handle used to stop [`MessagePump::run`] from another task.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Process at most one inbound message.
    ///
    /// Returns `Ok(false)` when the queue was empty.
    pub fn poll_once(&mut self) -> Result<bool, DispatchError> {
        let Some(data) = self.transport.try_dequeue() else {
            return Ok(false);
        };
        self.stats.record_received(data.len());

        match self.process(&data) {
            Ok(()) => Ok(true),
            Err(e) if !e.is_fatal() => {
                warn!("Dropping message ({} bytes): {}", data.len(), e);
                self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(e) => {
                error!("Fatal dispatch error: {}", e);
                self.stats.fatal_errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Process messages until the queue is empty. Returns how many were taken.
    pub fn poll_until_empty(&mut self) -> Result<usize, DispatchError> {
        let mut count = 0;
        while self.poll_once()? {
            count += 1;
        }
        Ok(count)
    }

    fn process(&mut self, data: &[u8]) -> Result<(), DispatchError> {
        let message = protocol::parse_message(data)?;
        let counter = match &message {
            LifecycleMessage::Generate { .. } => &self.stats.generates,
            LifecycleMessage::UpdateField { .. } => &self.stats.field_updates,
            LifecycleMessage::Disable { .. } => &self.stats.disables,
            LifecycleMessage::Delete { .. } => &self.stats.deletes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.dispatcher.dispatch(message)
    }

    /// Send a field update for a live object through this pump's transport.
    pub fn send_field_update(
        &self,
        object_id: ObjectId,
        field_name: &str,
        args: &[FieldValue],
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .send_field_update(&self.transport, object_id, field_name, args)?;
        self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Drain the queue every `interval` until shutdown, disconnect or a
    /// fatal error.
    pub async fn run(&mut self, interval: Duration) -> Result<(), DispatchError> {
        let shutdown = Arc::clone(&self.shutdown);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Message pump started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let handled = self.poll_until_empty()?;
                    if handled > 0 {
                        debug!("Pump pass handled {} messages", handled);
                    }
                    if !self.transport.is_open() {
                        // Pick up anything that landed after the last pass.
                        self.poll_until_empty()?;
                        info!("Transport closed, stopping message pump");
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                _ = shutdown.notified() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }
        Ok(())
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for MessagePump<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePump")
            .field("dispatcher", &self.dispatcher)
            .field("transport", &self.transport)
            .finish()
    }
}

/// Pump counters.
#[derive(Debug)]
pub struct PumpStats {
    /// Messages taken from the inbound queue.
    pub messages_received: AtomicU64,

    /// Bytes taken from the inbound queue.
    pub bytes_received: AtomicU64,

    /// Messages dropped because they failed to decode.
    pub messages_dropped: AtomicU64,

    /// Errors that stopped the pump.
    pub fatal_errors: AtomicU64,

    pub generates: AtomicU64,
    pub field_updates: AtomicU64,
    pub disables: AtomicU64,
    pub deletes: AtomicU64,

    /// Outbound field updates handed to the transport.
    pub messages_sent: AtomicU64,

    pub created: Instant,
}

impl PumpStats {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            fatal_errors: AtomicU64::new(0),
            generates: AtomicU64::new(0),
            field_updates: AtomicU64::new(0),
            disables: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PumpStatsSnapshot {
        PumpStatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            fatal_errors: self.fatal_errors.load(Ordering::Relaxed),
            generates: self.generates.load(Ordering::Relaxed),
            field_updates: self.field_updates.load(Ordering::Relaxed),
            disables: self.disables.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

impl Default for PumpStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pump statistics.
#[derive(Debug, Clone)]
pub struct PumpStatsSnapshot {
    pub messages_received: u64,
    pub bytes_received: u64,
    pub messages_dropped: u64,
    pub fatal_errors: u64,
    pub generates: u64,
    pub field_updates: u64,
    pub disables: u64,
    pub deletes: u64,
    pub messages_sent: u64,
    pub uptime_secs: u64,
}

impl PumpStatsSnapshot {
    pub fn messages_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.messages_received as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}
