//! # DIRIGERA API
//!
//! Device model and collaborator contract for the IKEA DIRIGERA hub.
//!
//! This crate does not speak the hub's wire protocol itself. It defines:
//!
//! - the device vocabulary ([`DeviceRecord`], [`DeviceType`], [`DeviceAttributes`])
//!   decoded from the hub's JSON, including in-place patching from partial
//!   update events;
//! - the [`HubApi`] / [`StreamHandler`] traits a transport implementation
//!   provides to the state crate;
//! - small naming helpers used by consumers to classify open/close sensors.
//!
//! ```rust,ignore
//! use dirigera_api::{DeviceRecord, OpeningKind};
//!
//! let mut sensor = DeviceRecord::from_value(&raw)?;
//! sensor.apply_update(&event_body)?;
//! let kind = OpeningKind::from_placement(sensor.location.as_deref(), None);
//! ```

pub mod client;
pub mod error;
pub mod model;
pub mod naming;

pub use client::{HubApi, StreamHandler};
pub use error::{ApiError, Result};
pub use model::{DeviceAttributes, DeviceId, DeviceRecord, DeviceType};
pub use naming::{split_name_location, OpeningKind};
