//! Scripted hub and recording consumers for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dirigera_api::{ApiError, DeviceId, HubApi, StreamHandler};
use dirigera_state::HubEntity;
use parking_lot::{Condvar, Mutex};
use serde_json::{json, Value};

#[derive(Default)]
struct StreamControl {
    open: bool,
    pending: VecDeque<String>,
    disconnect: bool,
    close_requested: bool,
    released: bool,
}

/// Hub double with a scripted device listing and a stream driven by the test
///
/// Fetches pop results off the script; once it is exhausted every fetch
/// returns the last successful listing. The event stream blocks until the
/// test disconnects it or the supervisor asks it to close.
pub struct MockHub {
    fetches: Mutex<VecDeque<Result<Vec<Value>, ApiError>>>,
    last_listing: Mutex<Vec<Value>>,
    stream: Mutex<StreamControl>,
    cvar: Condvar,
    honor_close: AtomicBool,
    refuse_streams: AtomicBool,
    pub fetch_count: AtomicUsize,
    pub streams_opened: AtomicUsize,
    pub streams_refused: AtomicUsize,
    pub close_requests: AtomicUsize,
}

impl MockHub {
    pub fn new(fetches: Vec<Result<Vec<Value>, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            fetches: Mutex::new(VecDeque::from(fetches)),
            last_listing: Mutex::new(Vec::new()),
            stream: Mutex::new(StreamControl::default()),
            cvar: Condvar::new(),
            honor_close: AtomicBool::new(true),
            refuse_streams: AtomicBool::new(false),
            fetch_count: AtomicUsize::new(0),
            streams_opened: AtomicUsize::new(0),
            streams_refused: AtomicUsize::new(0),
            close_requests: AtomicUsize::new(0),
        })
    }

    /// Queue a raw frame for delivery on the open (or next) stream
    pub fn push_message(&self, text: impl Into<String>) {
        self.stream.lock().pending.push_back(text.into());
        self.cvar.notify_all();
    }

    /// End the current stream as a remote close would
    pub fn disconnect(&self) {
        self.stream.lock().disconnect = true;
        self.cvar.notify_all();
    }

    /// Make `close_event_stream` a no-op, like a wedged transport
    pub fn ignore_close(&self) {
        self.honor_close.store(false, Ordering::SeqCst);
    }

    /// Fail every stream before it opens, as a refused websocket upgrade would
    pub fn refuse_streams(&self) {
        self.refuse_streams.store(true, Ordering::SeqCst);
    }

    /// Let any open stream end regardless of `ignore_close`
    pub fn release(&self) {
        self.stream.lock().released = true;
        self.cvar.notify_all();
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.lock().open
    }

    fn should_end(&self, control: &StreamControl) -> bool {
        control.released
            || control.disconnect
            || (control.close_requested && self.honor_close.load(Ordering::SeqCst))
    }
}

impl HubApi for MockHub {
    fn fetch_devices(&self) -> dirigera_api::Result<Vec<Value>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        match self.fetches.lock().pop_front() {
            Some(Ok(listing)) => {
                *self.last_listing.lock() = listing.clone();
                Ok(listing)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last_listing.lock().clone()),
        }
    }

    fn open_event_stream(&self, handler: &dyn StreamHandler) -> dirigera_api::Result<()> {
        if self.refuse_streams.load(Ordering::SeqCst) {
            self.streams_refused.fetch_add(1, Ordering::SeqCst);
            return Err(ApiError::Transport("websocket upgrade refused".into()));
        }

        {
            let mut control = self.stream.lock();
            control.open = true;
            control.close_requested = false;
        }
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        handler.on_open();

        loop {
            let mut control = self.stream.lock();
            while control.pending.is_empty() && !self.should_end(&control) {
                self.cvar.wait_for(&mut control, Duration::from_millis(50));
            }

            if let Some(frame) = control.pending.pop_front() {
                drop(control);
                handler.on_message(&frame);
                continue;
            }

            control.open = false;
            let remote = std::mem::take(&mut control.disconnect);
            drop(control);

            if remote {
                handler.on_error("connection reset by peer");
                handler.on_close();
                return Err(ApiError::StreamClosed);
            }
            handler.on_close();
            return Ok(());
        }
    }

    fn close_event_stream(&self) {
        self.close_requests.fetch_add(1, Ordering::SeqCst);
        self.stream.lock().close_requested = true;
        self.cvar.notify_all();
    }
}

/// Entity that records every availability change it is told about
pub struct RecordingEntity {
    entity_id: String,
    device_id: DeviceId,
    pub availability: Mutex<Vec<bool>>,
    pub updates: Mutex<Vec<Value>>,
}

impl RecordingEntity {
    pub fn new(device_id: &str) -> Arc<Self> {
        Arc::new(Self {
            entity_id: format!("{device_id}-entity"),
            device_id: DeviceId::new(device_id),
            availability: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        })
    }
}

impl HubEntity for RecordingEntity {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn set_available(&self, available: bool) {
        self.availability.lock().push(available);
    }

    fn handle_update(&self, body: &Value) {
        self.updates.lock().push(body.clone());
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub fn environment_sensor(id: &str, location: &str) -> Value {
    json!({
        "id": id,
        "deviceType": "environmentSensor",
        "customIcon": location,
        "isReachable": true,
        "lastSeen": "2024-03-01T12:00:00.000Z",
        "attributes": {
            "customName": format!("[{location}] Sensor {id}"),
            "currentTemperature": 21.5,
            "currentRH": 40.0,
            "currentPM25": null,
            "vocIndex": 100.0
        }
    })
}

pub fn open_close_sensor(id: &str, location: &str) -> Value {
    json!({
        "id": id,
        "deviceType": "openCloseSensor",
        "customIcon": location,
        "isReachable": true,
        "attributes": {
            "customName": "Front door",
            "isOpen": false,
            "batteryPercentage": 87
        }
    })
}

/// Two environment sensors and one open/close sensor
pub fn standard_listing() -> Vec<Value> {
    vec![
        environment_sensor("env-1", "placement_living"),
        environment_sensor("env-2", "placement_bedroom"),
        open_close_sensor("dev-1", "placement_door"),
    ]
}
