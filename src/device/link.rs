use super::http::{HttpCameraDevice, HttpSensorDevice};
use super::interface::{CameraDevice, SensorDevice};
use super::protocol::{CameraStatus, ImagePayload, SensorReading, SensorStatus};
use crate::config::{CameraConfig, SensorConfig};
use crate::error::{DeviceError, Result, SmartGidError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Request timing used by [`DeviceLink`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkTimings {
    pub poll_interval: Duration,
    pub sensor_timeout: Duration,
    pub camera_timeout: Duration,
}

impl LinkTimings {
    pub fn from_config(sensor: &SensorConfig, camera: &CameraConfig) -> Self {
        Self {
            poll_interval: sensor.poll_interval(),
            sensor_timeout: sensor.request_timeout(),
            camera_timeout: camera.request_timeout(),
        }
    }
}

impl Default for LinkTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            sensor_timeout: Duration::from_secs(2),
            camera_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of one poll that did not produce a reading
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Waiting,
    Failed(DeviceError),
}

/// Single request/response boundary to the sensor station and the camera.
/// Every request is bounded by its per-request timeout; retry policy belongs
/// to the caller.
#[derive(Clone)]
pub struct DeviceLink {
    sensor: Arc<dyn SensorDevice>,
    camera: Arc<dyn CameraDevice>,
    timings: LinkTimings,
}

impl DeviceLink {
    pub fn new(
        sensor: Arc<dyn SensorDevice>,
        camera: Arc<dyn CameraDevice>,
        timings: LinkTimings,
    ) -> Self {
        Self {
            sensor,
            camera,
            timings,
        }
    }

    /// Link to the ESP32 devices at the configured addresses
    pub fn connect(sensor: &SensorConfig, camera: &CameraConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SmartGidError::component("device_link", e.to_string()))?;

        info!(
            "Device link: sensor at {}, camera at {}",
            sensor.address, camera.address
        );

        Ok(Self::new(
            Arc::new(HttpSensorDevice::new(client.clone(), &sensor.address)),
            Arc::new(HttpCameraDevice::new(client, &camera.address)),
            LinkTimings::from_config(sensor, camera),
        ))
    }

    pub fn timings(&self) -> LinkTimings {
        self.timings
    }

    /// Ask the camera for one image
    pub async fn request_capture(&self) -> std::result::Result<ImagePayload, DeviceError> {
        let device = self.camera.name().to_string();

        let status = timeout(self.timings.camera_timeout, self.camera.capture())
            .await
            .map_err(|_| DeviceError::Timeout {
                device: device.clone(),
                timeout: self.timings.camera_timeout,
            })??;

        match status {
            CameraStatus::Ok(payload) => {
                debug!("Camera returned {} bytes", payload.decoded_len());
                Ok(payload)
            }
            CameraStatus::Error { message } => Err(DeviceError::Rejected { device, message }),
        }
    }

    /// Poll the sensor until it reports a reading or `cancel` fires
    pub async fn poll_for_reading(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<SensorReading, DeviceError> {
        self.poll_for_reading_observed(cancel, |_, _| {}).await
    }

    /// Like [`poll_for_reading`](Self::poll_for_reading), reporting every
    /// unsuccessful attempt to `observer`. Transport failures never end the
    /// loop; only a reading or cancellation does.
    pub async fn poll_for_reading_observed<F>(
        &self,
        cancel: &CancellationToken,
        mut observer: F,
    ) -> std::result::Result<SensorReading, DeviceError>
    where
        F: FnMut(u32, &PollOutcome),
    {
        let device = self.sensor.name().to_string();
        let cancelled = || DeviceError::Cancelled {
            device: device.clone(),
        };
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            attempt += 1;

            let outcome = match timeout(self.timings.sensor_timeout, self.sensor.read_status())
                .await
            {
                Ok(Ok(SensorStatus::Ready(reading))) => {
                    // a reading that lands after cancellation is dropped
                    if cancel.is_cancelled() {
                        debug!("Discarding reading {} received after cancel", reading.tag_id);
                        return Err(cancelled());
                    }
                    info!("Sensor reading received on attempt {}", attempt);
                    return Ok(reading);
                }
                Ok(Ok(SensorStatus::Waiting)) => PollOutcome::Waiting,
                Ok(Err(e)) => {
                    warn!("Sensor not reachable yet: {}", e);
                    PollOutcome::Failed(e)
                }
                Err(_) => PollOutcome::Failed(DeviceError::Timeout {
                    device: device.clone(),
                    timeout: self.timings.sensor_timeout,
                }),
            };

            observer(attempt, &outcome);

            tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = sleep(self.timings.poll_interval) => {}
            }
        }
    }
}
