// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! FIFO dispatch queue drained by a single worker task.
//!
//! The gateway runs two of these: one for outbound commands and one for
//! inbound responses and notifications. Each queue owns exactly one worker,
//! so handlers for one queue run strictly in submission order while the two
//! queues drain independently.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  put()   ┌───────────────┐  recv()  ┌──────────────────┐
//! │   producer   │─────────▶│ mpsc channel  │─────────▶│  DispatchWorker  │
//! │ (any thread) │          │ (FIFO)        │          │  - MessageHandler│
//! └──────────────┘          └───────────────┘          │  - DispatchStats │
//!                                                      └──────────────────┘
//! ```
//!
//! A failing or panicking handler is counted and logged; the worker keeps
//! draining.
//!
//! # Example
//!
//! ```rust,ignore
//! let queue = DispatchQueue::spawn("send", 0, Arc::new(MyHandler), &Handle::current());
//! assert!(queue.put(message));
//! queue.terminate().await;
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::error::{CoreError, CoreResult};
use crate::message::Message;

tokio::task_local! {
    static CURRENT_QUEUE: String;
}

// =============================================================================
// MessageHandler Trait
// =============================================================================

/// Processes messages dequeued by a dispatch worker.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handles one message.
    ///
    /// Returning an error marks the message as failed in the queue
    /// statistics; it never stops the worker.
    async fn handle(&self, message: Message) -> CoreResult<()>;
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters of a dispatch queue.
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Messages accepted by `put`.
    pub enqueued: AtomicU64,
    /// Messages handled, successfully or not.
    pub processed: AtomicU64,
    /// Messages whose handler failed or panicked.
    pub failed: AtomicU64,
    /// Messages refused by `put`.
    pub rejected: AtomicU64,
    pending: AtomicU64,
}

impl DispatchStats {
    /// Returns the number of queued messages not yet dequeued.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Acquire)
    }

    /// Creates a snapshot of the counters.
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }
}

/// Snapshot of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStatsSnapshot {
    /// Messages accepted.
    pub enqueued: u64,
    /// Messages handled.
    pub processed: u64,
    /// Messages failed.
    pub failed: u64,
    /// Messages refused.
    pub rejected: u64,
    /// Messages waiting.
    pub pending: u64,
}

// =============================================================================
// Channel plumbing
// =============================================================================

enum QueueSender {
    Bounded(mpsc::Sender<Message>),
    Unbounded(mpsc::UnboundedSender<Message>),
}

enum QueueReceiver {
    Bounded(mpsc::Receiver<Message>),
    Unbounded(mpsc::UnboundedReceiver<Message>),
}

impl QueueReceiver {
    async fn recv(&mut self) -> Option<Message> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }

    fn close_and_count(&mut self) -> usize {
        let mut dropped = 0;
        match self {
            Self::Bounded(rx) => {
                rx.close();
                while rx.try_recv().is_ok() {
                    dropped += 1;
                }
            }
            Self::Unbounded(rx) => {
                rx.close();
                while rx.try_recv().is_ok() {
                    dropped += 1;
                }
            }
        }
        dropped
    }
}

fn channel(capacity: usize) -> (QueueSender, QueueReceiver) {
    if capacity == 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
    }
}

// =============================================================================
// DispatchQueue
// =============================================================================

/// A FIFO queue with one dedicated worker.
pub struct DispatchQueue {
    name: String,
    capacity: usize,
    sender: Mutex<Option<QueueSender>>,
    shutdown: Arc<Notify>,
    stats: Arc<DispatchStats>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchQueue {
    /// Creates the queue and spawns its worker on `runtime`.
    ///
    /// A `capacity` of zero means unbounded.
    pub fn spawn(
        name: impl Into<String>,
        capacity: usize,
        handler: Arc<dyn MessageHandler>,
        runtime: &Handle,
    ) -> Self {
        let name = name.into();
        let (tx, rx) = channel(capacity);
        let shutdown = Arc::new(Notify::new());
        let stats = Arc::new(DispatchStats::default());

        let worker = DispatchWorker {
            name: name.clone(),
            receiver: rx,
            handler,
            shutdown: shutdown.clone(),
            stats: stats.clone(),
        };
        let join = runtime.spawn(CURRENT_QUEUE.scope(name.clone(), worker.run()));

        debug!(queue = %name, capacity, "Dispatch queue created");

        Self {
            name,
            capacity,
            sender: Mutex::new(Some(tx)),
            shutdown,
            stats,
            worker: Mutex::new(Some(join)),
        }
    }

    /// Returns the queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a message; returns `false` if the queue refused it.
    pub fn put(&self, message: Message) -> bool {
        match self.try_put(message) {
            Ok(()) => true,
            Err(e) => {
                warn!(queue = %self.name, error = %e, "Message refused");
                false
            }
        }
    }

    /// Appends a message, reporting why it was refused.
    pub fn try_put(&self, message: Message) -> CoreResult<()> {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(CoreError::queue_closed(&self.name));
        };

        self.stats.pending.fetch_add(1, Ordering::AcqRel);
        let sent = match sender {
            QueueSender::Unbounded(tx) => tx
                .send(message)
                .map_err(|_| CoreError::queue_closed(&self.name)),
            QueueSender::Bounded(tx) => tx.try_send(message).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    CoreError::queue_full(&self.name, self.capacity)
                }
                mpsc::error::TrySendError::Closed(_) => CoreError::queue_closed(&self.name),
            }),
        };

        match sent {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.pending.fetch_sub(1, Ordering::AcqRel);
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Returns the number of messages waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.stats.pending() as usize
    }

    /// Returns `true` if no messages are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once the queue no longer accepts messages.
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Returns the queue statistics.
    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Stops accepting messages, lets the worker drain what is queued and
    /// waits for it to exit.
    ///
    /// Calling this again is a no-op.
    pub async fn terminate(&self) {
        // Dropping the sender closes the channel; the worker exits after the
        // last queued message.
        drop(self.sender.lock().take());
        self.join_worker().await;
    }

    /// Stops accepting messages and stops the worker after the message in
    /// progress. Messages still queued are discarded and logged.
    pub async fn shutdown_now(&self) {
        drop(self.sender.lock().take());
        self.shutdown.notify_one();
        self.join_worker().await;
    }

    async fn join_worker(&self) {
        let Some(join) = self.worker.lock().take() else {
            return;
        };

        // A handler running on this queue's own worker cannot wait for it.
        let on_own_worker = CURRENT_QUEUE
            .try_with(|current| current == &self.name)
            .unwrap_or(false);
        if on_own_worker {
            debug!(queue = %self.name, "Terminate requested from own worker; not joining");
            return;
        }

        if let Err(e) = join.await {
            error!(queue = %self.name, error = %e, "Dispatch worker ended abnormally");
        }
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

// =============================================================================
// DispatchWorker
// =============================================================================

struct DispatchWorker {
    name: String,
    receiver: QueueReceiver,
    handler: Arc<dyn MessageHandler>,
    shutdown: Arc<Notify>,
    stats: Arc<DispatchStats>,
}

impl DispatchWorker {
    #[instrument(skip(self), name = "dispatch_worker", fields(queue = %self.name))]
    async fn run(mut self) {
        info!("Dispatch worker started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    let dropped = self.receiver.close_and_count();
                    if dropped > 0 {
                        warn!(dropped, "Dispatch worker stopped with queued messages");
                    }
                    self.stats.pending.fetch_sub(dropped as u64, Ordering::AcqRel);
                    break;
                }

                message = self.receiver.recv() => {
                    match message {
                        Some(message) => {
                            self.stats.pending.fetch_sub(1, Ordering::AcqRel);
                            self.process(message).await;
                        }
                        None => {
                            debug!("Dispatch channel closed and drained");
                            break;
                        }
                    }
                }
            }
        }

        let stats = self.stats.snapshot();
        info!(
            enqueued = stats.enqueued,
            processed = stats.processed,
            failed = stats.failed,
            rejected = stats.rejected,
            "Dispatch worker stopped"
        );
    }

    async fn process(&self, message: Message) {
        let span = tracing::debug_span!(
            "dispatch",
            command = ?message.command,
            kind = ?message.kind,
            request_id = message.primary_request_id().unwrap_or("-"),
        );

        let result = AssertUnwindSafe(self.handler.handle(message).instrument(span))
            .catch_unwind()
            .await;

        self.stats.processed.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Message handler failed");
            }
            Err(_) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!("Message handler panicked; worker continues");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CommandType, Request};
    use crate::EndpointInfo;
    use std::time::Duration;
    use tokio::time::timeout;

    struct Recorder {
        seen: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl Recorder {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                delay,
            })
        }
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, message: Message) -> CoreResult<()> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let id = message.primary_request_id().unwrap_or_default().to_string();
            match id.as_str() {
                "fail" => return Err(CoreError::handler("boom")),
                "panic" => panic!("handler panic"),
                _ => {}
            }
            self.seen.lock().push(id);
            Ok(())
        }
    }

    fn msg(id: &str) -> Message {
        Message::single(
            CommandType::Read,
            EndpointInfo::new("X"),
            Request::new("a").with_id(id),
        )
    }

    #[tokio::test]
    async fn test_fifo_order_and_drain_on_terminate() {
        let recorder = Recorder::new(Duration::from_millis(1));
        let queue = DispatchQueue::spawn("send", 0, recorder.clone(), &Handle::current());

        for i in 0..20 {
            assert!(queue.put(msg(&i.to_string())));
        }
        timeout(Duration::from_secs(5), queue.terminate()).await.unwrap();

        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(*recorder.seen.lock(), expected);
        assert_eq!(queue.stats().snapshot().processed, 20);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn test_worker_survives_failure_and_panic() {
        let recorder = Recorder::new(Duration::ZERO);
        let queue = DispatchQueue::spawn("recv", 0, recorder.clone(), &Handle::current());

        assert!(queue.put(msg("fail")));
        assert!(queue.put(msg("panic")));
        assert!(queue.put(msg("ok")));
        timeout(Duration::from_secs(5), queue.terminate()).await.unwrap();

        assert_eq!(*recorder.seen.lock(), vec!["ok".to_string()]);
        let stats = queue.stats().snapshot();
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test]
    async fn test_put_after_terminate_is_refused() {
        let queue = DispatchQueue::spawn("send", 0, Recorder::new(Duration::ZERO), &Handle::current());
        queue.terminate().await;
        queue.terminate().await;

        assert!(queue.is_closed());
        assert!(!queue.put(msg("late")));
        assert!(matches!(queue.try_put(msg("late")), Err(CoreError::QueueClosed { .. })));
        assert_eq!(queue.stats().snapshot().rejected, 2);
    }

    #[tokio::test]
    async fn test_bounded_queue_reports_full() {
        let recorder = Recorder::new(Duration::from_millis(200));
        let queue = DispatchQueue::spawn("send", 1, recorder, &Handle::current());

        let mut refused = 0;
        for i in 0..5 {
            if let Err(CoreError::QueueFull { capacity, .. }) = queue.try_put(msg(&i.to_string())) {
                assert_eq!(capacity, 1);
                refused += 1;
            }
        }
        assert!(refused >= 3);
        queue.shutdown_now().await;
    }
}
