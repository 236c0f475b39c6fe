//! State aggregation and broadcast engine for pidbg.
//!
//! Readings from any number of producers funnel through one ordered intake
//! (`DispatcherHandle`) into a single consuming task. That task is the only
//! writer of the `SnapshotStore`; after each commit it hands the resulting
//! `Event` to the `Broadcaster`, which fans it out to every subscriber over a
//! bounded per-subscriber channel. A subscriber whose buffer is full is
//! disconnected rather than allowed to stall the dispatcher.
//!
//! Transports talk to the engine only through `QueryGateway`.

pub mod broadcast;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod store;

pub use broadcast::{Broadcaster, SubscriberId, SubscriberState};
pub use config::{EngineConfig, MIN_SUBSCRIBER_BUFFER};
pub use dispatcher::{spawn_dispatcher, DispatcherHandle, DispatcherMsg, DispatcherTask};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use gateway::{EventStream, QueryGateway};
pub use store::SnapshotStore;
