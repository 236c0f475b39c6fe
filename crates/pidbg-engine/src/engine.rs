//! Engine lifecycle: wires the store, broadcaster and dispatcher together.

use crate::broadcast::Broadcaster;
use crate::config::{EngineConfig, MIN_SUBSCRIBER_BUFFER};
use crate::dispatcher::{spawn_dispatcher, DispatcherHandle};
use crate::gateway::QueryGateway;
use crate::store::SnapshotStore;
use pidbg_core::Snapshot;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct Engine {
    handle: DispatcherHandle,
    gateway: QueryGateway,
    join: JoinHandle<()>,
}

impl Engine {
    /// Start the engine on the current tokio runtime.
    pub fn start(config: EngineConfig) -> Self {
        let buffer = config.subscriber_buffer.max(MIN_SUBSCRIBER_BUFFER);
        if buffer != config.subscriber_buffer {
            warn!(
                requested = config.subscriber_buffer,
                used = buffer,
                "subscriber_buffer raised to minimum"
            );
        }
        let intake = config.intake_capacity.max(1);

        let initial = Snapshot::new(config.board, config.app, config.gpio_schema);
        let store = Arc::new(SnapshotStore::new(initial, config.thresholds));
        let broadcaster = Arc::new(Broadcaster::new(
            store.clone(),
            config.capabilities,
            buffer,
        ));
        let (handle, join) = spawn_dispatcher(intake, store.clone(), broadcaster.clone());
        let gateway = QueryGateway::new(store, broadcaster);

        info!(
            intake_capacity = intake,
            subscriber_buffer = buffer,
            "Engine started"
        );
        Self {
            handle,
            gateway,
            join,
        }
    }

    /// Producer handle for source adapters.
    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    pub fn gateway(&self) -> QueryGateway {
        self.gateway.clone()
    }

    /// Stop accepting readings, drain the intake, close all subscribers and
    /// wait for the dispatcher to finish.
    pub async fn shutdown(self) {
        self.handle.shutdown().await;
        if let Err(e) = self.join.await {
            warn!(error = %e, "Dispatcher task ended abnormally");
        }
        info!("Engine stopped");
    }
}
