//! Broadcaster and subscriber registry.
//!
//! Every subscriber owns a bounded `mpsc` channel. Delivery uses `try_send`
//! only: a subscriber whose buffer is full is removed on the spot, which
//! drops its sender and ends the receiving stream. Nothing in here awaits,
//! so a slow reader can never hold up the dispatcher or other readers.
//!
//! # Join consistency
//!
//! `register` reads the snapshot, queues the `meta` and `snapshot` events
//! and inserts the subscriber while holding the registry lock, recording the
//! snapshot's `seq`. `dispatch` takes the same lock and skips reading events
//! whose `seq` is already covered by that snapshot. A new subscriber
//! therefore sees every committed reading exactly once: either inside its
//! join snapshot or as a live event after it.

use crate::error::{EngineError, EngineResult};
use crate::store::SnapshotStore;
use parking_lot::Mutex;
use pidbg_core::{Capabilities, Event, MetaPayload, Snapshot};
use pidbg_telemetry::Metrics;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opaque subscriber identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one subscriber. No transition leaves `Closed`.
///
/// State follows registry membership: a registered subscriber is `Active`,
/// anything else is `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Join events are being queued. Lasts only inside `register`, under the
    /// registry lock, so `state_of` never reports it.
    Connecting,
    /// Receiving live events.
    Active,
    /// Unregistered, dropped for slowness, or closed at shutdown.
    Closed,
}

struct Subscriber {
    tx: mpsc::Sender<Event>,
    joined_at_seq: u64,
}

impl Subscriber {
    /// Reading events already folded into this subscriber's join snapshot are skipped.
    fn wants(&self, event: &Event) -> bool {
        event.seq == 0 || event.seq > self.joined_at_seq
    }
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<SubscriberId, Subscriber>,
    closed: bool,
}

pub struct Broadcaster {
    registry: Mutex<Registry>,
    store: Arc<SnapshotStore>,
    capabilities: Capabilities,
    buffer: usize,
}

impl Broadcaster {
    pub fn new(store: Arc<SnapshotStore>, capabilities: Capabilities, buffer: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            store,
            capabilities,
            buffer,
        }
    }

    /// `meta` event describing the device and enabled samplers.
    pub fn meta_event(&self, snapshot: &Snapshot) -> EngineResult<Event> {
        Ok(Event::meta(&MetaPayload::from_snapshot(
            snapshot,
            self.capabilities,
        ))?)
    }

    /// Add a subscriber. Its channel already holds `meta` then `snapshot`.
    pub fn register(&self) -> EngineResult<(SubscriberId, mpsc::Receiver<Event>)> {
        let mut registry = self.registry.lock();
        if registry.closed {
            return Err(EngineError::NotAccepting);
        }

        let snapshot = self.store.read();
        let meta = self.meta_event(&snapshot)?;
        let initial = Event::snapshot(&snapshot)?;

        let (tx, rx) = mpsc::channel(self.buffer);
        let subscriber = Subscriber {
            tx,
            joined_at_seq: snapshot.seq,
        };
        for event in [meta, initial] {
            // Buffer holds at least two events and the receiver is alive.
            subscriber
                .tx
                .try_send(event)
                .map_err(|_| EngineError::QueueFull)?;
        }

        let id = SubscriberId::new();
        registry.subscribers.insert(id, subscriber);
        let count = registry.subscribers.len();
        drop(registry);

        Metrics::subscribers_active(count);
        info!(subscriber = %id, joined_at_seq = snapshot.seq, active = count, "Subscriber registered");
        Ok((id, rx))
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut registry = self.registry.lock();
        let removed = registry.subscribers.remove(&id).is_some();
        let count = registry.subscribers.len();
        drop(registry);

        if removed {
            Metrics::subscriber_dropped("unsubscribed");
            Metrics::subscribers_active(count);
            debug!(subscriber = %id, active = count, "Subscriber unregistered");
        }
        removed
    }

    /// Deliver an event to every interested subscriber without waiting.
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn dispatch(&self, event: &Event) -> usize {
        let mut registry = self.registry.lock();
        if registry.closed {
            return 0;
        }

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for (id, subscriber) in registry.subscribers.iter() {
            if !subscriber.wants(event) {
                continue;
            }
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => dropped.push((*id, "slow")),
                Err(TrySendError::Closed(_)) => dropped.push((*id, "closed")),
            }
        }

        for (id, reason) in &dropped {
            registry.subscribers.remove(id);
            Metrics::subscriber_dropped(reason);
            if *reason == "slow" {
                warn!(subscriber = %id, kind = %event.kind, "Subscriber buffer full, disconnecting");
            } else {
                debug!(subscriber = %id, "Subscriber receiver gone, removing");
            }
        }
        let count = registry.subscribers.len();
        drop(registry);

        Metrics::event_broadcast(event.kind.as_str());
        if !dropped.is_empty() {
            Metrics::subscribers_active(count);
        }
        delivered
    }

    /// Drop every subscriber and refuse new ones. Idempotent.
    pub fn close_all(&self) {
        let mut registry = self.registry.lock();
        registry.closed = true;
        let closed = registry.subscribers.len();
        registry.subscribers.clear();
        drop(registry);

        for _ in 0..closed {
            Metrics::subscriber_dropped("shutdown");
        }

        Metrics::subscribers_active(0);
        info!(closed, "Broadcaster closed all subscribers");
    }

    pub fn state_of(&self, id: SubscriberId) -> SubscriberState {
        if self.registry.lock().subscribers.contains_key(&id) {
            SubscriberState::Active
        } else {
            SubscriberState::Closed
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.registry.lock().closed
    }
}
