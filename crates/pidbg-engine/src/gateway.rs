//! Query gateway: the only surface transports use.

use crate::broadcast::{Broadcaster, SubscriberId, SubscriberState};
use crate::error::EngineResult;
use crate::store::SnapshotStore;
use futures_util::Stream;
use pidbg_core::{Event, Snapshot};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct QueryGateway {
    store: Arc<SnapshotStore>,
    broadcaster: Arc<Broadcaster>,
}

impl QueryGateway {
    pub fn new(store: Arc<SnapshotStore>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Read-only copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.store.read()
    }

    /// A `snapshot` event for a single requester, outside the broadcast path.
    pub fn snapshot_event(&self) -> EngineResult<Event> {
        Ok(Event::snapshot(&self.store.read())?)
    }

    /// Subscribe to the live event stream.
    ///
    /// The stream starts with `meta` and `snapshot`, then yields every
    /// later event in commit order until the subscriber is dropped for
    /// slowness or the engine shuts down.
    pub fn subscribe(&self) -> EngineResult<EventStream> {
        let (id, rx) = self.broadcaster.register()?;
        Ok(EventStream {
            id,
            rx,
            broadcaster: self.broadcaster.clone(),
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }
}

/// Live, ordered sequence of events. Dropping it unregisters the subscriber.
pub struct EventStream {
    id: SubscriberId,
    rx: mpsc::Receiver<Event>,
    broadcaster: Arc<Broadcaster>,
}

impl EventStream {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn state(&self) -> SubscriberState {
        self.broadcaster.state_of(self.id)
    }

    /// Next event, or `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.broadcaster.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use pidbg_core::{Capabilities, EventKind, PinState, Reading, ThresholdConfig};

    fn gateway() -> (Arc<SnapshotStore>, Arc<Broadcaster>, QueryGateway) {
        let store = Arc::new(SnapshotStore::new(
            Snapshot::default(),
            ThresholdConfig::default(),
        ));
        let bc = Arc::new(Broadcaster::new(store.clone(), Capabilities::default(), 8));
        let gw = QueryGateway::new(store.clone(), bc.clone());
        (store, bc, gw)
    }

    #[tokio::test]
    async fn test_stream_yields_join_events_then_live() {
        let (store, bc, gw) = gateway();
        let mut stream = gw.subscribe().unwrap();
        assert_eq!(stream.state(), SubscriberState::Active);

        let event = store
            .apply(Reading::Pin(PinState::new(3, 1)))
            .unwrap()
            .unwrap();
        bc.dispatch(&event);

        assert_eq!(stream.next().await.unwrap().kind, EventKind::Meta);
        assert_eq!(stream.next().await.unwrap().kind, EventKind::Snapshot);
        let live = stream.next().await.unwrap();
        assert_eq!(live.kind, EventKind::Pin);
        assert_eq!(live.payload["pin"], 3);
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let (_store, bc, gw) = gateway();
        let stream = gw.subscribe().unwrap();
        let id = stream.id();
        assert_eq!(gw.subscriber_count(), 1);

        drop(stream);
        assert_eq!(gw.subscriber_count(), 0);
        assert_eq!(bc.state_of(id), SubscriberState::Closed);
    }

    #[tokio::test]
    async fn test_stream_ends_on_close() {
        let (_store, bc, gw) = gateway();
        let mut stream = gw.subscribe().unwrap();
        bc.close_all();

        assert!(stream.recv().await.is_some());
        assert!(stream.recv().await.is_some());
        assert!(stream.recv().await.is_none());
        assert!(gw.subscribe().is_err());
    }

    #[test]
    fn test_pending_until_event_arrives() {
        let (store, bc, gw) = gateway();
        let mut stream = tokio_test::task::spawn(gw.subscribe().unwrap());

        tokio_test::assert_ready!(stream.poll_next());
        tokio_test::assert_ready!(stream.poll_next());
        tokio_test::assert_pending!(stream.poll_next());

        let event = store
            .apply(Reading::Pin(PinState::new(5, 1)))
            .unwrap()
            .unwrap();
        bc.dispatch(&event);
        assert!(stream.is_woken());
        let next = tokio_test::assert_ready!(stream.poll_next());
        assert_eq!(next.map(|e| e.kind), Some(EventKind::Pin));
    }

    #[test]
    fn test_snapshot_matches_store() {
        let (store, _bc, gw) = gateway();
        store.apply(Reading::Pin(PinState::new(8, 1))).unwrap();
        assert_eq!(gw.snapshot(), store.read());
        let event = gw.snapshot_event().unwrap();
        assert_eq!(event.kind, EventKind::Snapshot);
        assert_eq!(event.payload["seq"], 1);
    }
}
