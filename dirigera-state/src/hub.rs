//! Hub lifecycle and consumer-facing surface
//!
//! [`Hub`] owns the background worker and is the only type a host needs to
//! hold. Consumers register interest in devices through it, read the cached
//! device listing from it, and are told about availability by it.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use dirigera_api::{DeviceId, DeviceRecord, HubApi};
use parking_lot::Mutex;
use serde_json::Value;

use crate::backoff::Backoff;
use crate::cache::Snapshot;
use crate::config::HubConfig;
use crate::entity::HubEntity;
use crate::error::{HubError, Result};
use crate::executor::{Executor, ThreadExecutor};
use crate::logging;
use crate::registry::SubscriberId;
use crate::supervisor::{ConnectionState, Supervisor};

/// Name of the callback thread created by [`Hub::new`] and [`Hub::with_config`]
pub const CALLBACK_THREAD_NAME: &str = "dirigera-callbacks";

/// How a call to [`Hub::stop`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Every worker exited within the shutdown timeout
    Stopped,
    /// At least one worker was still running when the timeout elapsed
    TimedOut,
    /// No worker was running
    NotRunning,
}

struct Worker {
    handle: JoinHandle<()>,
    /// Disconnects when the worker thread exits, panic included
    done_rx: mpsc::Receiver<()>,
}

/// Connection to one DIRIGERA hub
///
/// # Example
///
/// ```rust,ignore
/// use dirigera_state::Hub;
///
/// let hub = Hub::new(api)?;
/// hub.register_subscriber("sensor-1", |body| println!("update: {body}"));
/// hub.start()?;
///
/// // ...
///
/// hub.stop();
/// ```
pub struct Hub {
    config: HubConfig,
    supervisor: Arc<Supervisor>,
    workers: Mutex<Vec<Worker>>,
}

impl Hub {
    /// Create a hub with default configuration and its own callback thread
    pub fn new(api: Arc<dyn HubApi>) -> Result<Self> {
        Self::with_config(api, HubConfig::default())
    }

    /// Create a hub with custom configuration and its own callback thread
    pub fn with_config(api: Arc<dyn HubApi>, config: HubConfig) -> Result<Self> {
        let executor = ThreadExecutor::new(CALLBACK_THREAD_NAME).map_err(HubError::ThreadSpawn)?;
        Ok(Self::with_executor(api, config, Arc::new(executor)))
    }

    /// Create a hub that hands consumer callbacks to `executor`
    pub fn with_executor(
        api: Arc<dyn HubApi>,
        config: HubConfig,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let backoff = Backoff::new(config.backoff_ladder.clone());
        Self {
            supervisor: Arc::new(Supervisor::new(api, backoff, executor)),
            config,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Spawn the background worker
    ///
    /// Installs the configured [`LoggingMode`](crate::LoggingMode) output
    /// first, unless the host already has a subscriber. Calling this while a
    /// worker is already running starts a second one; that is logged but not
    /// prevented. A stopped hub cannot be restarted.
    pub fn start(&self) -> Result<()> {
        logging::init_logging(self.config.log_mode)?;

        // stop() raises the flag before it takes the worker list
        let mut workers = self.workers.lock();
        if self.supervisor.stop.is_set() {
            return Err(HubError::Stopped);
        }

        if !workers.is_empty() {
            tracing::warn!(
                "Hub already has {} running worker(s); starting another",
                workers.len()
            );
        }

        let (done_tx, done_rx) = mpsc::channel::<()>();
        let supervisor = Arc::clone(&self.supervisor);

        let handle = thread::Builder::new()
            .name(self.config.worker_thread_name.clone())
            .spawn(move || {
                let _done = done_tx;
                supervisor.run();
            })
            .map_err(HubError::ThreadSpawn)?;

        workers.push(Worker { handle, done_rx });
        Ok(())
    }

    /// Stop the worker and wait for it, bounded by the shutdown timeout
    ///
    /// Sets the stop flag, asks the hub to close an open event stream, then
    /// waits. Returns [`StopOutcome::TimedOut`] rather than hanging if the
    /// worker does not exit in time; a later `stop()` waits for it again.
    pub fn stop(&self) -> StopOutcome {
        self.supervisor.request_stop();
        let mut workers = std::mem::take(&mut *self.workers.lock());

        if workers.is_empty() {
            self.supervisor.set_state(ConnectionState::Stopped);
            return StopOutcome::NotRunning;
        }

        tracing::info!("Stopping hub worker");
        self.supervisor.api.close_event_stream();

        let deadline = Instant::now() + self.config.shutdown_timeout;
        let mut still_running = Vec::new();

        for worker in workers.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match worker.done_rx.recv_timeout(remaining) {
                Err(RecvTimeoutError::Timeout) => still_running.push(worker),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.handle.join().is_err() {
                        tracing::warn!("Hub worker panicked");
                    }
                }
            }
        }

        if still_running.is_empty() {
            tracing::info!("Hub worker stopped");
            return StopOutcome::Stopped;
        }

        tracing::warn!(
            "Hub worker did not stop within {:?}; {} still running",
            self.config.shutdown_timeout,
            still_running.len()
        );
        self.workers.lock().extend(still_running);
        StopOutcome::TimedOut
    }

    /// Register a callback for update events of one device
    ///
    /// The callback receives the event's `data` object and runs on the
    /// executor, never on the worker thread.
    pub fn register_subscriber<F>(&self, device_id: impl Into<DeviceId>, callback: F) -> SubscriberId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.supervisor
            .registry
            .register(device_id.into(), Arc::new(callback))
    }

    pub fn unregister_subscriber(&self, id: SubscriberId) -> bool {
        self.supervisor.registry.unregister(id)
    }

    /// Hand `payload` to the device's subscribers
    ///
    /// Returns false if nobody subscribed to `device_id`, which tells the
    /// caller the device still needs a consumer.
    pub fn dispatch(&self, device_id: &DeviceId, payload: Value) -> bool {
        self.supervisor.registry.dispatch(device_id, payload)
    }

    /// Push a full record to the device's subscribers
    pub fn update_entities(&self, record: &DeviceRecord) -> bool {
        match serde_json::to_value(record) {
            Ok(payload) => self.dispatch(&record.id, payload),
            Err(e) => {
                tracing::warn!("Failed to encode device {}: {}", record.id, e);
                false
            }
        }
    }

    /// Track an entity for availability and subscribe it to its device
    ///
    /// Only a weak handle is kept. Once the host drops the entity, its
    /// subscription stays registered but becomes a no-op.
    pub fn add_entity(&self, entity: Arc<dyn HubEntity>) -> SubscriberId {
        self.supervisor.entities.insert(&entity);

        let weak = Arc::downgrade(&entity);
        self.supervisor.registry.register(
            entity.device_id().clone(),
            Arc::new(move |body: &Value| {
                if let Some(entity) = weak.upgrade() {
                    entity.handle_update(body);
                }
            }),
        )
    }

    /// Forget an entity and drop its subscription
    pub fn remove_entity(&self, entity_id: &str, subscription: SubscriberId) -> bool {
        let removed = self.supervisor.entities.remove(entity_id);
        let unsubscribed = self.supervisor.registry.unregister(subscription);
        removed || unsubscribed
    }

    /// Run `listener` after every successful snapshot refresh
    pub fn on_connected<F>(&self, listener: F)
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.supervisor.add_connect_listener(Arc::new(listener));
    }

    /// The cached listing, or `None` before the first successful fetch
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.supervisor.cache.snapshot()
    }

    pub fn environment_sensors(&self) -> Option<Vec<DeviceRecord>> {
        self.supervisor.cache.environment_sensors()
    }

    pub fn open_close_sensors(&self) -> Option<Vec<DeviceRecord>> {
        self.supervisor.cache.open_close_sensors()
    }

    pub fn location(&self, device_id: &DeviceId) -> Option<String> {
        self.supervisor.cache.location(device_id)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn subscriber_count(&self, device_id: &DeviceId) -> usize {
        self.supervisor.registry.subscriber_count(device_id)
    }

    /// Number of tracked entities still alive
    pub fn entity_count(&self) -> usize {
        self.supervisor.entities.len()
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        // Signal only; the worker finishes on its own
        if !self.workers.get_mut().is_empty() {
            self.supervisor.request_stop();
            self.supervisor.api.close_event_stream();
        }
    }
}
