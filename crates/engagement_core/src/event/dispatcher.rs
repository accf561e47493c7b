//! Detached publish worker.
//!
//! Engines hand committed events to `EventDispatcher::submit`, which enqueues
//! on a bounded channel with `try_send` and returns immediately. A dedicated
//! worker thread drains the queue and calls the publisher once per event.

use super::payload::EngagementEvent;
use super::publisher::EventPublisher;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const WORKER_THREAD_NAME: &str = "engagement-events";

#[derive(Debug, Clone)]
pub struct EventDispatcherConfig {
    /// Max queued events before new submissions are dropped.
    pub queue_capacity: usize,
}

impl Default for EventDispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

/// Point-in-time dispatcher counters.
///
/// `submitted` counts events accepted into the queue; `dropped` counts
/// events rejected because the queue was full or closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub submitted: u64,
    pub published: u64,
    pub failed: u64,
    pub dropped: u64,
}

/// Outcome of `EventDispatcher::shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Whether the worker finished every queued event within the grace period.
    pub drained: bool,
    pub stats: DispatcherStats,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    done_rx: Receiver<()>,
}

/// Owns the publish queue and its worker thread.
pub struct EventDispatcher {
    queue_tx: RwLock<Option<Sender<EngagementEvent>>>,
    counters: Arc<Counters>,
    worker: Mutex<Option<Worker>>,
}

impl EventDispatcher {
    /// Spawns the worker thread.
    ///
    /// # Errors
    /// - Returns the OS error when the thread cannot be spawned.
    pub fn start(
        config: EventDispatcherConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> std::io::Result<Self> {
        let capacity = config.queue_capacity.max(1);
        let (queue_tx, queue_rx) = bounded::<EngagementEvent>(capacity);
        let (done_tx, done_rx) = bounded::<()>(1);
        let counters = Arc::new(Counters::default());

        let worker_counters = Arc::clone(&counters);
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_loop(queue_rx, publisher, worker_counters, done_tx))?;

        info!(
            "event=dispatcher_start module=event status=ok queue_capacity={}",
            capacity
        );
        Ok(Self {
            queue_tx: RwLock::new(Some(queue_tx)),
            counters,
            worker: Mutex::new(Some(Worker { handle, done_rx })),
        })
    }

    /// Enqueues `event` without blocking.
    ///
    /// A full queue or a shut-down dispatcher drops the event with a warning;
    /// the caller is never told.
    pub fn submit(&self, event: EngagementEvent) {
        let routing_key = event.routing_key();
        let guard = self
            .queue_tx
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(queue_tx) = guard.as_ref() else {
            self.record_drop(routing_key, "closed");
            return;
        };

        match queue_tx.try_send(event) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => self.record_drop(routing_key, "queue_full"),
            Err(TrySendError::Disconnected(_)) => self.record_drop(routing_key, "closed"),
        }
    }

    pub fn stats(&self) -> DispatcherStats {
        self.counters.snapshot()
    }

    /// Returns whether new events are still accepted.
    pub fn is_open(&self) -> bool {
        self.queue_tx
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Closes the queue and waits up to `grace` for queued events to drain.
    ///
    /// A worker still busy after `grace` is detached, not interrupted.
    /// Calling this again returns the current counters with `drained = true`.
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.close_queue();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let drained = match worker {
            None => true,
            Some(Worker { handle, done_rx }) => match done_rx.recv_timeout(grace) {
                Ok(()) => {
                    let _ = handle.join();
                    true
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "event=dispatcher_shutdown module=event status=error error_code=grace_expired grace_ms={}",
                        grace.as_millis()
                    );
                    drop(handle);
                    false
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(
                        "event=dispatcher_shutdown module=event status=error error_code=worker_exited"
                    );
                    let _ = handle.join();
                    false
                }
            },
        };

        let stats = self.stats();
        info!(
            "event=dispatcher_shutdown module=event status=ok drained={} submitted={} published={} failed={} dropped={}",
            drained, stats.submitted, stats.published, stats.failed, stats.dropped
        );
        ShutdownReport { drained, stats }
    }

    fn close_queue(&self) {
        let sender = self
            .queue_tx
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(sender);
    }

    fn record_drop(&self, routing_key: &str, reason: &str) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            "event=event_submit module=event status=dropped routing_key={} reason={}",
            routing_key, reason
        );
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        // The worker exits on its own once the last sender is gone.
        self.close_queue();
    }
}

fn worker_loop(
    queue_rx: Receiver<EngagementEvent>,
    publisher: Arc<dyn EventPublisher>,
    counters: Arc<Counters>,
    done_tx: Sender<()>,
) {
    for event in queue_rx.iter() {
        publish_once(publisher.as_ref(), &counters, &event);
    }
    let _ = done_tx.send(());
}

fn publish_once(publisher: &dyn EventPublisher, counters: &Counters, event: &EngagementEvent) {
    let routing_key = event.routing_key();
    let body = match event.to_json() {
        Ok(body) => body,
        Err(err) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                "event=event_publish module=event status=error routing_key={} error_code=encode_failed error={}",
                routing_key, err
            );
            return;
        }
    };

    match publisher.publish(routing_key, &body) {
        Ok(()) => {
            counters.published.fetch_add(1, Ordering::Relaxed);
            debug!(
                "event=event_publish module=event status=ok routing_key={}",
                routing_key
            );
        }
        Err(err) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                "event=event_publish module=event status=error routing_key={} error={}",
                routing_key, err
            );
        }
    }
}
