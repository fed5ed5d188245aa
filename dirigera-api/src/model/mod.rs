//! Model types for dirigera-api

mod device;
mod device_id;
mod device_type;

pub use device::{DeviceAttributes, DeviceRecord};
pub use device_id::DeviceId;
pub use device_type::DeviceType;
