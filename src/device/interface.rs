use super::protocol::{CameraStatus, SensorStatus};
use crate::error::DeviceError;
use async_trait::async_trait;

/// One request against the RFID/weight/height station
#[async_trait]
pub trait SensorDevice: Send + Sync {
    fn name(&self) -> &str;

    async fn read_status(&self) -> Result<SensorStatus, DeviceError>;
}

/// One shot request against the camera
#[async_trait]
pub trait CameraDevice: Send + Sync {
    fn name(&self) -> &str;

    async fn capture(&self) -> Result<CameraStatus, DeviceError>;
}
