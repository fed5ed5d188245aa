//! Connection supervisor
//!
//! The supervisor runs on one dedicated worker thread and owns the
//! reconnection state machine:
//!
//! ```text
//!            start / stream closed
//! Disconnected ──────────────────────► Connecting ◄──┐ fetch failed:
//!                                         │  │       │ backoff, retry
//!                          fetch succeeded│  └───────┘
//!                                         ▼
//!                                     Connected ── stream closed ──► Connecting
//!
//!                 any ── stop requested ──► Stopping ──► Stopped
//! ```
//!
//! All blocking work (device fetch, backoff sleep, the open event stream)
//! happens on the worker. Consumer code never runs there: dispatch and
//! availability changes are handed to the [`Executor`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dirigera_api::{HubApi, StreamHandler};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::backoff::Backoff;
use crate::cache::{Snapshot, SnapshotCache};
use crate::entity::EntityRegistry;
use crate::executor::Executor;
use crate::registry::SubscriberRegistry;
use crate::router::route_event;

/// Where the supervisor is in its connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No worker has run yet
    Disconnected,
    /// Fetching the device listing, possibly backing off between attempts
    Connecting,
    /// Snapshot is fresh and the event stream is (being) opened
    Connected,
    /// Stop requested; the worker is unwinding
    Stopping,
    /// The worker has exited
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Stopping => "stopping",
            ConnectionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Callback run after every successful snapshot refresh
pub type ConnectListener = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Cooperative stop flag the worker can also sleep on
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    pub(crate) fn set(&self) {
        *self.stopped.lock() = true;
        self.cvar.notify_all();
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleep for `timeout` unless stopped first; returns whether stopped
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

/// State shared between the [`Hub`](crate::Hub) facade and its worker
pub(crate) struct Supervisor {
    pub(crate) api: Arc<dyn HubApi>,
    pub(crate) cache: SnapshotCache,
    pub(crate) registry: SubscriberRegistry,
    pub(crate) entities: EntityRegistry,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) stop: StopSignal,
    backoff: Mutex<Backoff>,
    state: RwLock<ConnectionState>,
    connect_listeners: RwLock<Vec<ConnectListener>>,
}

impl Supervisor {
    pub(crate) fn new(
        api: Arc<dyn HubApi>,
        backoff: Backoff,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            api,
            cache: SnapshotCache::new(),
            registry: SubscriberRegistry::new(Arc::clone(&executor)),
            entities: EntityRegistry::new(),
            executor,
            stop: StopSignal::default(),
            backoff: Mutex::new(backoff),
            state: RwLock::new(ConnectionState::Disconnected),
            connect_listeners: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub(crate) fn add_connect_listener(&self, listener: ConnectListener) {
        self.connect_listeners.write().push(listener);
    }

    /// Flag the worker to stop and mark the transition
    pub(crate) fn request_stop(&self) {
        self.stop.set();
        let mut state = self.state.write();
        if *state != ConnectionState::Stopped {
            *state = ConnectionState::Stopping;
        }
    }

    pub(crate) fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write();
        // Once stopping, only the worker's final transition may land
        let stopping = matches!(*state, ConnectionState::Stopping | ConnectionState::Stopped);
        if stopping && next != ConnectionState::Stopped {
            return;
        }
        if *state != next {
            tracing::debug!("Hub connection {} -> {}", *state, next);
            *state = next;
        }
    }

    fn set_availability(&self, available: bool) {
        self.entities
            .broadcast_availability(available, self.executor.as_ref());
    }

    /// Worker body; returns once the stop flag is observed
    pub(crate) fn run(&self) {
        tracing::info!("Hub worker started");

        while !self.stop.is_set() {
            self.set_state(ConnectionState::Connecting);
            self.set_availability(false);

            let Some(snapshot) = self.fetch_snapshot() else {
                break;
            };

            tracing::info!(
                "Hub connected: {} environment sensor(s), {} open/close sensor(s)",
                snapshot.environment_sensors.len(),
                snapshot.open_close_sensors.len()
            );
            self.cache.replace(snapshot);

            if self.stop.is_set() {
                break;
            }

            self.set_state(ConnectionState::Connected);
            self.set_availability(true);
            self.notify_connected();

            let handler = ConnectionHandler {
                supervisor: self,
                opened: AtomicBool::new(false),
            };
            let result = self.api.open_event_stream(&handler);
            let opened = handler.opened.load(Ordering::SeqCst);

            match &result {
                Ok(()) if opened => {
                    tracing::info!("Hub event stream ended");
                    continue;
                }
                Ok(()) => tracing::warn!("Hub event stream ended before opening"),
                Err(e) => tracing::warn!("Hub event stream failed: {}", e),
            }

            // Only an opened stream resets the backoff
            let delay = self.backoff.lock().next_delay();
            tracing::debug!("Reconnecting hub event stream in {:?}", delay);
            if self.stop.wait_timeout(delay) {
                break;
            }
        }

        self.set_state(ConnectionState::Stopped);
        tracing::info!("Hub worker stopped");
    }

    /// Fetch the device listing, backing off between failures
    ///
    /// Consumers are marked unavailable once on the first failure of a
    /// disconnected span, not on every retry. Returns `None` if a stop was
    /// requested before a fetch succeeded.
    fn fetch_snapshot(&self) -> Option<Snapshot> {
        let mut marked_unavailable = false;

        loop {
            if self.stop.is_set() {
                return None;
            }

            tracing::debug!("Fetching hub device listing");
            match self.api.fetch_devices() {
                Ok(devices) => return Some(Snapshot::from_raw(&devices)),
                Err(e) => {
                    if !marked_unavailable {
                        self.set_availability(false);
                        marked_unavailable = true;
                    }

                    let delay = self.backoff.lock().next_delay();
                    if e.is_transient() {
                        tracing::warn!(
                            "Failed to fetch hub devices, retrying in {:?}: {}",
                            delay,
                            e
                        );
                    } else {
                        tracing::error!(
                            "Hub returned an unusable device listing, retrying in {:?}: {}",
                            delay,
                            e
                        );
                    }

                    if self.stop.wait_timeout(delay) {
                        return None;
                    }
                }
            }
        }
    }

    fn notify_connected(&self) {
        let Some(snapshot) = self.cache.snapshot() else {
            return;
        };

        let listeners = self.connect_listeners.read().clone();
        for listener in listeners {
            let snapshot = Arc::clone(&snapshot);
            self.executor
                .execute(Box::new(move || listener(snapshot.as_ref())));
        }
    }
}

/// Stream callbacks for one connection
struct ConnectionHandler<'a> {
    supervisor: &'a Supervisor,
    opened: AtomicBool,
}

impl StreamHandler for ConnectionHandler<'_> {
    fn on_open(&self) {
        tracing::debug!("Hub event stream open");
        self.opened.store(true, Ordering::SeqCst);
        self.supervisor.backoff.lock().reset();

        // A stop that raced with opening found no stream to close
        if self.supervisor.stop.is_set() {
            self.supervisor.api.close_event_stream();
        }
    }

    fn on_message(&self, text: &str) {
        route_event(&self.supervisor.registry, text);
    }

    fn on_error(&self, message: &str) {
        tracing::debug!("Hub event stream error: {}", message);
    }

    fn on_close(&self) {
        tracing::debug!("Hub event stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InlineExecutor;
    use dirigera_api::{ApiError, DeviceId};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::thread;

    /// Hub whose fetches follow a script and whose stream delivers a fixed
    /// list of frames, then stays open until closed
    struct ScriptedHub {
        fetches: Mutex<VecDeque<dirigera_api::Result<Vec<Value>>>>,
        frames: Vec<String>,
        streams_opened: Mutex<usize>,
        streaming: StopSignal,
        closed: StopSignal,
    }

    impl ScriptedHub {
        fn new(fetches: Vec<dirigera_api::Result<Vec<Value>>>, frames: Vec<String>) -> Self {
            Self {
                fetches: Mutex::new(VecDeque::from(fetches)),
                frames,
                streams_opened: Mutex::new(0),
                streaming: StopSignal::default(),
                closed: StopSignal::default(),
            }
        }
    }

    impl HubApi for ScriptedHub {
        fn fetch_devices(&self) -> dirigera_api::Result<Vec<Value>> {
            self.fetches
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn open_event_stream(&self, handler: &dyn StreamHandler) -> dirigera_api::Result<()> {
            *self.streams_opened.lock() += 1;
            handler.on_open();
            for frame in &self.frames {
                handler.on_message(frame);
            }
            self.streaming.set();

            while !self.closed.wait_timeout(Duration::from_millis(50)) {}
            handler.on_close();
            Ok(())
        }

        fn close_event_stream(&self) {
            self.closed.set();
        }
    }

    fn supervisor_with(hub: ScriptedHub) -> (Arc<ScriptedHub>, Supervisor) {
        let hub = Arc::new(hub);
        let ladder = vec![Duration::from_millis(1); 3];
        let supervisor = Supervisor::new(
            Arc::clone(&hub) as Arc<dyn HubApi>,
            Backoff::new(ladder),
            Arc::new(InlineExecutor),
        );
        (hub, supervisor)
    }

    #[test]
    fn test_stop_signal_wait_is_interrupted() {
        let signal = Arc::new(StopSignal::default());
        let waiter = Arc::clone(&signal);
        let started = Instant::now();

        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        signal.set();

        assert!(handle.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_stop_signal_wait_times_out() {
        let signal = StopSignal::default();
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
        assert!(!signal.is_set());
    }

    #[test]
    fn test_request_stop_is_sticky() {
        let (_hub, supervisor) = supervisor_with(ScriptedHub::new(Vec::new(), Vec::new()));

        supervisor.request_stop();
        supervisor.set_state(ConnectionState::Connected);
        assert_eq!(supervisor.state(), ConnectionState::Stopping);
        supervisor.set_state(ConnectionState::Stopped);
        assert_eq!(supervisor.state(), ConnectionState::Stopped);
    }

    #[test]
    fn test_run_exits_immediately_when_already_stopped() {
        let (hub, supervisor) = supervisor_with(ScriptedHub::new(Vec::new(), Vec::new()));

        supervisor.request_stop();
        supervisor.run();

        assert_eq!(supervisor.state(), ConnectionState::Stopped);
        assert_eq!(*hub.streams_opened.lock(), 0);
        assert!(!supervisor.cache.is_populated());
    }

    #[test]
    fn test_run_retries_then_routes_events() {
        let received = Arc::new(Mutex::new(Vec::new()));

        let (hub, supervisor) = supervisor_with(ScriptedHub::new(
            vec![
                Err(ApiError::Transport("connection refused".into())),
                Ok(vec![json!({"id": "door-1", "deviceType": "openCloseSensor"})]),
            ],
            vec![r#"{"data": {"id": "door-1", "attributes": {"isOpen": true}}}"#.into()],
        ));

        let sink = Arc::clone(&received);
        supervisor.registry.register(
            DeviceId::new("door-1"),
            Arc::new(move |body: &Value| sink.lock().push(body.clone())),
        );

        let supervisor = Arc::new(supervisor);
        let worker = Arc::clone(&supervisor);
        let handle = thread::spawn(move || worker.run());

        assert!(hub.streaming.wait_timeout(Duration::from_secs(5)));
        assert_eq!(supervisor.state(), ConnectionState::Connected);

        supervisor.request_stop();
        supervisor.api.close_event_stream();
        handle.join().unwrap();

        assert_eq!(supervisor.state(), ConnectionState::Stopped);
        assert_eq!(*hub.streams_opened.lock(), 1);
        assert_eq!(supervisor.cache.open_close_sensors().map(|s| s.len()), Some(1));
        assert_eq!(
            *received.lock(),
            vec![json!({"id": "door-1", "attributes": {"isOpen": true}})]
        );
    }

    /// Serves the listing but refuses every event stream
    struct RefusingHub {
        attempts: Mutex<usize>,
        refused_three: StopSignal,
    }

    impl HubApi for RefusingHub {
        fn fetch_devices(&self) -> dirigera_api::Result<Vec<Value>> {
            Ok(vec![json!({"id": "door-1", "deviceType": "openCloseSensor"})])
        }

        fn open_event_stream(&self, _handler: &dyn StreamHandler) -> dirigera_api::Result<()> {
            let mut attempts = self.attempts.lock();
            *attempts += 1;
            if *attempts >= 3 {
                self.refused_three.set();
            }
            Err(ApiError::Transport("websocket upgrade refused".into()))
        }

        fn close_event_stream(&self) {}
    }

    #[test]
    fn test_refused_stream_walks_the_ladder() {
        let hub = Arc::new(RefusingHub {
            attempts: Mutex::new(0),
            refused_three: StopSignal::default(),
        });
        let supervisor = Arc::new(Supervisor::new(
            Arc::clone(&hub) as Arc<dyn HubApi>,
            Backoff::new(vec![Duration::from_millis(1); 3]),
            Arc::new(InlineExecutor),
        ));

        let worker = Arc::clone(&supervisor);
        let handle = thread::spawn(move || worker.run());

        assert!(hub.refused_three.wait_timeout(Duration::from_secs(5)));
        supervisor.request_stop();
        handle.join().unwrap();

        // A successful fetch alone must not rewind the ladder
        assert_eq!(supervisor.backoff.lock().step(), 2);
        assert!(supervisor.cache.is_populated());
    }

    #[test]
    fn test_unusable_listing_is_retried() {
        let (hub, supervisor) = supervisor_with(ScriptedHub::new(
            vec![
                Err(ApiError::Parse("expected array".into())),
                Ok(vec![json!({"id": "env-1", "deviceType": "environmentSensor"})]),
            ],
            Vec::new(),
        ));

        let supervisor = Arc::new(supervisor);
        let worker = Arc::clone(&supervisor);
        let handle = thread::spawn(move || worker.run());

        assert!(hub.streaming.wait_timeout(Duration::from_secs(5)));
        assert_eq!(supervisor.cache.environment_sensors().map(|s| s.len()), Some(1));
        assert_eq!(supervisor.backoff.lock().step(), 0);

        supervisor.request_stop();
        supervisor.api.close_event_stream();
        handle.join().unwrap();
    }
}
