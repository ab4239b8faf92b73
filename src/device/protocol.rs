use crate::error::DeviceError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// RFID tag, weight and height measured by the sensor station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub tag_id: String,
    pub weight_kg: f64,
    pub height_cm: f64,
}

/// Base64-encoded image exactly as delivered by the camera
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImagePayload(String);

impl ImagePayload {
    pub fn new<S: Into<String>>(encoded: S) -> Result<Self, base64::DecodeError> {
        let encoded = encoded.into();
        STANDARD.decode(encoded.as_bytes())?;
        Ok(Self(encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Size of the image once decoded
    pub fn decoded_len(&self) -> usize {
        let padding = self.0.bytes().rev().take_while(|b| *b == b'=').count();
        self.0.len() / 4 * 3 - padding
    }
}

impl TryFrom<String> for ImagePayload {
    type Error = base64::DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImagePayload> for String {
    fn from(value: ImagePayload) -> Self {
        value.0
    }
}

// Payloads are large; keep logs readable.
impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImagePayload({} bytes)", self.decoded_len())
    }
}

/// Decoded answer of `GET /get-data`
#[derive(Debug, Clone, PartialEq)]
pub enum SensorStatus {
    Ready(SensorReading),
    Waiting,
}

/// Decoded answer of `GET /capture`
#[derive(Debug, Clone, PartialEq)]
pub enum CameraStatus {
    Ok(ImagePayload),
    Error { message: String },
}

#[derive(Debug, Deserialize)]
struct RawSensorResponse {
    status: String,
    uid: Option<String>,
    weight: Option<f64>,
    height: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawCameraResponse {
    status: String,
    image: Option<String>,
    message: Option<String>,
}

impl SensorStatus {
    /// Decode a sensor body. Any status other than ready counts as waiting;
    /// the firmware reports a scanned tag as either "ready" or "ok".
    pub fn decode(device: &str, body: &[u8]) -> Result<Self, DeviceError> {
        let raw: RawSensorResponse =
            serde_json::from_slice(body).map_err(|e| DeviceError::malformed(device, e))?;

        if !matches!(raw.status.as_str(), "ready" | "ok") {
            return Ok(SensorStatus::Waiting);
        }

        match (raw.uid, raw.weight, raw.height) {
            (Some(tag_id), Some(weight_kg), Some(height_cm)) if !tag_id.is_empty() => {
                Ok(SensorStatus::Ready(SensorReading {
                    tag_id,
                    weight_kg,
                    height_cm,
                }))
            }
            _ => Err(DeviceError::malformed(
                device,
                "ready response without uid, weight and height",
            )),
        }
    }
}

impl CameraStatus {
    pub fn decode(device: &str, body: &[u8]) -> Result<Self, DeviceError> {
        let raw: RawCameraResponse =
            serde_json::from_slice(body).map_err(|e| DeviceError::malformed(device, e))?;

        if raw.status != "ok" {
            return Ok(CameraStatus::Error {
                message: raw
                    .message
                    .unwrap_or_else(|| format!("status \"{}\"", raw.status)),
            });
        }

        let image = raw
            .image
            .ok_or_else(|| DeviceError::malformed(device, "ok response without image"))?;
        let payload = ImagePayload::new(image).map_err(|e| DeviceError::malformed(device, e))?;

        Ok(CameraStatus::Ok(payload))
    }
}
