use super::interface::{CameraDevice, SensorDevice};
use super::protocol::{CameraStatus, SensorStatus};
use crate::error::DeviceError;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, trace};

const SENSOR_NAME: &str = "sensor";
const CAMERA_NAME: &str = "camera";

fn endpoint(address: &str, path: &str) -> String {
    format!("{}/{}", address.trim_end_matches('/'), path)
}

fn transport_error(device: &str, error: reqwest::Error) -> DeviceError {
    if error.is_connect() {
        DeviceError::transport(device, format!("connection failed: {}", error))
    } else {
        DeviceError::transport(device, error)
    }
}

/// ESP32 sensor station reached over HTTP
pub struct HttpSensorDevice {
    client: Client,
    url: String,
}

impl HttpSensorDevice {
    pub fn new(client: Client, address: &str) -> Self {
        Self {
            client,
            url: endpoint(address, "get-data"),
        }
    }
}

#[async_trait]
impl SensorDevice for HttpSensorDevice {
    fn name(&self) -> &str {
        SENSOR_NAME
    }

    async fn read_status(&self) -> Result<SensorStatus, DeviceError> {
        trace!("GET {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| transport_error(SENSOR_NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::transport(
                SENSOR_NAME,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(SENSOR_NAME, e))?;

        SensorStatus::decode(SENSOR_NAME, &body)
    }
}

/// ESP32-CAM reached over HTTP
pub struct HttpCameraDevice {
    client: Client,
    url: String,
}

impl HttpCameraDevice {
    pub fn new(client: Client, address: &str) -> Self {
        Self {
            client,
            url: endpoint(address, "capture"),
        }
    }
}

#[async_trait]
impl CameraDevice for HttpCameraDevice {
    fn name(&self) -> &str {
        CAMERA_NAME
    }

    async fn capture(&self) -> Result<CameraStatus, DeviceError> {
        debug!("Sending capture request to {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| transport_error(CAMERA_NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Rejected {
                device: CAMERA_NAME.to_string(),
                message: format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                ),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(CAMERA_NAME, e))?;

        CameraStatus::decode(CAMERA_NAME, &body)
    }
}
