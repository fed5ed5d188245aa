//! Hub collaborator contract
//!
//! The transport, authentication and wire protocol of the hub live behind
//! these traits. The state crate only relies on three operations: a blocking
//! device listing, a blocking event stream, and a way to ask that stream to
//! end from another thread.

use serde_json::Value;

use crate::error::Result;

/// Callbacks invoked by [`HubApi::open_event_stream`] while the stream is open
///
/// All methods are called on the thread that opened the stream.
pub trait StreamHandler: Send + Sync {
    /// The stream is established and events will follow
    fn on_open(&self);

    /// One text frame from the hub
    fn on_message(&self, text: &str);

    /// A transport or protocol error was observed; the stream may still close
    fn on_error(&self, message: &str);

    /// The stream has ended, for whatever reason
    fn on_close(&self);
}

/// Blocking client for a single hub
///
/// Implementations must allow `close_event_stream` to be called from a
/// different thread than the one blocked in `open_event_stream`.
pub trait HubApi: Send + Sync {
    /// Fetch the full device listing as raw JSON objects
    fn fetch_devices(&self) -> Result<Vec<Value>>;

    /// Open the event stream and block until it ends
    ///
    /// Returns `Ok(())` on a clean close (remote close or a close request) and
    /// an error when the stream could not be opened or broke.
    fn open_event_stream(&self, handler: &dyn StreamHandler) -> Result<()>;

    /// Request the open event stream, if any, to end
    fn close_event_stream(&self);
}
