//! DIRIGERA Hub State
//!
//! Keeps a long-lived connection to an IKEA DIRIGERA hub and distributes its
//! device updates to registered consumers.
//!
//! # Features
//!
//! - **Reconnecting worker**: one background thread fetches the device
//!   listing, opens the event stream and reconnects with bounded backoff
//! - **Snapshot cache**: the latest full listing, swapped in atomically
//! - **Per-device dispatch**: update events routed to subscribers in
//!   registration order, on the host's executor
//! - **Availability**: every tracked entity is told when the connection
//!   comes and goes
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────── worker thread ────────────┐
//! HubApi ──────► │ fetch → SnapshotCache → event stream  │
//!                │              │              │        │
//!                └──────────────┼──────────────┼────────┘
//!                               ▼              ▼
//!                    EntityRegistry     SubscriberRegistry
//!                   (availability)        (per device)
//!                               └──────┬───────┘
//!                                      ▼
//!                                  Executor ──► consumers
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dirigera_state::{DeviceEntity, Hub, HubEntity};
//!
//! let hub = Hub::new(api)?;
//!
//! hub.on_connected(|snapshot| {
//!     println!("{} sensors online", snapshot.device_count());
//! });
//!
//! hub.start()?;
//!
//! if let Some(sensors) = hub.open_close_sensors() {
//!     for record in sensors {
//!         let entity: Arc<dyn HubEntity> = Arc::new(DeviceEntity::new(record));
//!         hub.add_entity(entity);
//!     }
//! }
//!
//! hub.stop();
//! ```

pub mod backoff;
pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod executor;
pub mod hub;
pub mod logging;
pub mod registry;
pub mod router;
mod supervisor;

pub use backoff::Backoff;
pub use cache::{Snapshot, SnapshotCache};
pub use config::HubConfig;
pub use entity::{DeviceEntity, DeviceState, EntityRegistry, HubEntity};
pub use error::{HubError, Result};
pub use executor::{Executor, InlineExecutor, Job, ThreadExecutor};
pub use hub::{Hub, StopOutcome, CALLBACK_THREAD_NAME};
pub use logging::{init_logging, LoggingMode};
pub use registry::{EventCallback, SubscriberId, SubscriberRegistry};
pub use router::{parse_event, route_event};
pub use supervisor::{ConnectListener, ConnectionState};

// Re-export the device vocabulary for convenience
pub use dirigera_api::{DeviceId, DeviceRecord, DeviceType, HubApi, StreamHandler};

/// Commonly used imports
pub mod prelude {
    pub use crate::{
        ConnectionState, DeviceEntity, DeviceId, DeviceRecord, Hub, HubConfig, HubEntity,
        HubError, Snapshot, StopOutcome, SubscriberId,
    };
}
