//! Event dispatcher actor.
//!
//! The single serialization point of the engine. Producers hold a cloneable
//! `DispatcherHandle` and enqueue readings into one bounded channel; the
//! `DispatcherTask` consumes it strictly one message at a time, commits each
//! reading to the `SnapshotStore` and then hands the event to the
//! `Broadcaster`. Per-producer order is the channel order.
//!
//! # Shutdown
//!
//! `DispatcherHandle::shutdown` clears the shared `accepting` flag before
//! enqueuing `Shutdown`, so new submissions fail with `NotAccepting`. When
//! the task sees `Shutdown` it closes its receiver, processes whatever was
//! already queued, closes every subscriber and exits.

use crate::broadcast::Broadcaster;
use crate::error::{EngineError, EngineResult};
use crate::store::SnapshotStore;
use pidbg_core::{CustomEntry, Event, Reading};
use pidbg_telemetry::Metrics;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Messages for the dispatcher actor.
#[derive(Debug)]
pub enum DispatcherMsg {
    /// Commit a reading and broadcast its event.
    Reading(Reading),
    /// Broadcast a fresh `meta` event to all subscribers.
    BroadcastMeta,
    /// Broadcast the current snapshot to all subscribers.
    BroadcastSnapshot,
    /// Drain the queue, close subscribers and stop.
    Shutdown,
}

pub struct DispatcherTask {
    rx: mpsc::Receiver<DispatcherMsg>,
    store: Arc<SnapshotStore>,
    broadcaster: Arc<Broadcaster>,
}

impl DispatcherTask {
    /// Run until `Shutdown` is received or every handle is dropped.
    pub async fn run(mut self) {
        debug!("DispatcherTask started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                DispatcherMsg::Shutdown => {
                    self.rx.close();
                    let mut drained = 0usize;
                    while let Some(queued) = self.rx.recv().await {
                        if !matches!(queued, DispatcherMsg::Shutdown) {
                            self.handle_message(queued);
                            drained += 1;
                        }
                    }
                    debug!(drained, "DispatcherTask drained intake");
                    break;
                }
                msg => self.handle_message(msg),
            }
        }

        self.broadcaster.close_all();
        info!(seq = self.store.seq(), "DispatcherTask terminated");
    }

    fn handle_message(&self, msg: DispatcherMsg) {
        match msg {
            DispatcherMsg::Reading(reading) => self.on_reading(reading),
            DispatcherMsg::BroadcastMeta => {
                let snapshot = self.store.read();
                self.broadcast_synthetic(self.broadcaster.meta_event(&snapshot));
            }
            DispatcherMsg::BroadcastSnapshot => {
                let snapshot = self.store.read();
                self.broadcast_synthetic(Event::snapshot(&snapshot).map_err(EngineError::from));
            }
            DispatcherMsg::Shutdown => trace!("Extra shutdown request ignored"),
        }
    }

    fn on_reading(&self, reading: Reading) {
        let kind = reading.kind();
        let started = Instant::now();

        match self.store.apply(reading) {
            Ok(Some(event)) => {
                let delivered = self.broadcaster.dispatch(&event);
                trace!(kind = %kind, seq = event.seq, delivered, "Event dispatched");
            }
            Ok(None) => trace!(kind = %kind, "Reading committed without event"),
            Err(e) => {
                warn!(kind = %kind, error = %e, "Reading rejected");
                Metrics::reading_rejected(kind.as_str());
                return;
            }
        }

        Metrics::reading_applied(kind.as_str());
        Metrics::dispatch_latency(kind.as_str(), started.elapsed().as_secs_f64() * 1000.0);
    }

    fn broadcast_synthetic(&self, event: EngineResult<Event>) {
        match event {
            Ok(event) => {
                let delivered = self.broadcaster.dispatch(&event);
                debug!(kind = %event.kind, delivered, "Synthetic event broadcast");
            }
            Err(e) => warn!(error = %e, "Failed to build synthetic event"),
        }
    }
}

/// Cloneable producer side of the dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<DispatcherMsg>,
    accepting: Arc<AtomicBool>,
}

impl DispatcherHandle {
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Enqueue a reading, waiting only for intake capacity.
    pub async fn submit(&self, reading: Reading) -> EngineResult<()> {
        self.send(DispatcherMsg::Reading(reading)).await
    }

    /// Enqueue a reading without waiting.
    pub fn try_submit(&self, reading: Reading) -> EngineResult<()> {
        if !self.is_accepting() {
            return Err(EngineError::NotAccepting);
        }
        self.tx
            .try_send(DispatcherMsg::Reading(reading))
            .map_err(|e| match e {
                TrySendError::Full(_) => EngineError::QueueFull,
                TrySendError::Closed(_) => EngineError::NotAccepting,
            })
    }

    /// Submit an application value for a named stream.
    ///
    /// The entry is validated here so callers learn about a bad name or a
    /// non-object payload directly.
    pub async fn push_custom(&self, name: impl Into<String>, payload: Value) -> EngineResult<()> {
        let reading = Reading::Custom(CustomEntry::new(name, payload));
        reading.validate()?;
        self.submit(reading).await
    }

    pub async fn broadcast_meta(&self) -> EngineResult<()> {
        self.send(DispatcherMsg::BroadcastMeta).await
    }

    pub async fn broadcast_snapshot(&self) -> EngineResult<()> {
        self.send(DispatcherMsg::BroadcastSnapshot).await
    }

    /// Stop accepting readings and ask the task to drain and stop.
    pub async fn shutdown(&self) {
        if self.accepting.swap(false, Ordering::AcqRel) {
            info!("Dispatcher shutdown requested");
        }
        let _ = self.tx.send(DispatcherMsg::Shutdown).await;
    }

    async fn send(&self, msg: DispatcherMsg) -> EngineResult<()> {
        if !self.is_accepting() {
            return Err(EngineError::NotAccepting);
        }
        self.tx
            .send(msg)
            .await
            .map_err(|_| EngineError::NotAccepting)
    }
}

/// Spawn the dispatcher actor.
///
/// Returns a handle for producers and the join handle of the task.
#[must_use]
pub fn spawn_dispatcher(
    capacity: usize,
    store: Arc<SnapshotStore>,
    broadcaster: Arc<Broadcaster>,
) -> (DispatcherHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);

    let task = DispatcherTask {
        rx,
        store,
        broadcaster,
    };
    let handle = DispatcherHandle {
        tx,
        accepting: Arc::new(AtomicBool::new(true)),
    };

    let join_handle = tokio::spawn(task.run());
    (handle, join_handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pidbg_core::{Capabilities, EventKind, PinState, Snapshot, ThresholdConfig};
    use serde_json::json;

    fn parts(buffer: usize) -> (Arc<SnapshotStore>, Arc<Broadcaster>) {
        let store = Arc::new(SnapshotStore::new(
            Snapshot::default(),
            ThresholdConfig::default(),
        ));
        let broadcaster = Arc::new(Broadcaster::new(
            store.clone(),
            Capabilities::default(),
            buffer,
        ));
        (store, broadcaster)
    }

    #[tokio::test]
    async fn test_per_pin_order_preserved() {
        let (store, bc) = parts(64);
        let (_id, mut rx) = bc.register().unwrap();
        let (handle, join) = spawn_dispatcher(16, store.clone(), bc.clone());

        for value in [1u8, 0, 1, 1, 0] {
            handle.submit(PinState::new(17, value).into()).await.unwrap();
        }
        handle.shutdown().await;
        join.await.unwrap();

        let mut values = Vec::new();
        while let Some(event) = rx.recv().await {
            if event.kind == EventKind::Pin {
                values.push(event.payload["value"].as_u64().unwrap());
            }
        }
        assert_eq!(values, vec![1, 0, 1, 1, 0]);
        assert_eq!(store.read().pins[&17].value, 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_rejects() {
        let (store, bc) = parts(8);
        let (handle, join) = spawn_dispatcher(16, store.clone(), bc.clone());

        for pin in 0..5u8 {
            handle.submit(PinState::new(pin, 1).into()).await.unwrap();
        }
        handle.shutdown().await;

        assert!(matches!(
            handle.submit(PinState::new(9, 1).into()).await,
            Err(EngineError::NotAccepting)
        ));
        assert!(matches!(
            handle.try_submit(PinState::new(9, 1).into()),
            Err(EngineError::NotAccepting)
        ));

        join.await.unwrap();
        assert_eq!(store.read().pins.len(), 5);
        assert!(bc.is_closed());
    }

    #[tokio::test]
    async fn test_try_submit_reports_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = DispatcherHandle {
            tx,
            accepting: Arc::new(AtomicBool::new(true)),
        };

        handle.try_submit(PinState::new(1, 0).into()).unwrap();
        assert!(matches!(
            handle.try_submit(PinState::new(1, 1).into()),
            Err(EngineError::QueueFull)
        ));
    }

    #[tokio::test]
    async fn test_invalid_reading_discarded_and_processing_continues() {
        let (store, bc) = parts(8);
        let (handle, join) = spawn_dispatcher(16, store.clone(), bc);

        handle.submit(PinState::new(4, 3).into()).await.unwrap();
        handle.submit(PinState::new(5, 1).into()).await.unwrap();
        handle.shutdown().await;
        join.await.unwrap();

        let snap = store.read();
        assert!(!snap.pins.contains_key(&4));
        assert!(snap.pins.contains_key(&5));
        assert_eq!(snap.seq, 1);
    }

    #[tokio::test]
    async fn test_push_custom_validates_payload() {
        let (store, bc) = parts(8);
        let (handle, join) = spawn_dispatcher(16, store.clone(), bc);

        assert!(matches!(
            handle.push_custom("x", json!([1])).await,
            Err(EngineError::InvalidReading(_))
        ));
        handle.push_custom("x", json!({"a": 1})).await.unwrap();
        handle.shutdown().await;
        join.await.unwrap();

        assert_eq!(store.read().custom["x"].payload, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_broadcast_snapshot_reaches_subscribers() {
        let (store, bc) = parts(8);
        let (_id, mut rx) = bc.register().unwrap();
        let (handle, join) = spawn_dispatcher(16, store, bc.clone());

        handle.broadcast_meta().await.unwrap();
        handle.broadcast_snapshot().await.unwrap();
        handle.shutdown().await;
        join.await.unwrap();

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::Meta,
                EventKind::Snapshot,
                EventKind::Meta,
                EventKind::Snapshot
            ]
        );
    }
}
