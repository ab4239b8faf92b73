mod http;
mod interface;
mod link;
pub mod mock;
mod protocol;
#[cfg(test)]
mod tests;

pub use http::{HttpCameraDevice, HttpSensorDevice};
pub use interface::{CameraDevice, SensorDevice};
pub use link::{DeviceLink, LinkTimings, PollOutcome};
pub use protocol::{CameraStatus, ImagePayload, SensorReading, SensorStatus};
