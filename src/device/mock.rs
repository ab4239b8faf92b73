use super::interface::{CameraDevice, SensorDevice};
use super::protocol::{CameraStatus, ImagePayload, SensorReading, SensorStatus};
use crate::error::DeviceError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

/// Scripted answer of a mock device request
#[derive(Debug, Clone)]
pub enum MockResponse<T> {
    /// Answer with the value after the configured latency
    Reply(T),
    /// Fail the request
    Fail(DeviceError),
    /// Never answer
    Hang,
}

struct Script<T> {
    queue: Mutex<VecDeque<MockResponse<T>>>,
    fallback: MockResponse<T>,
    latency: Duration,
    requests: AtomicU32,
}

impl<T: Clone> Script<T> {
    fn new(fallback: MockResponse<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            latency: Duration::ZERO,
            requests: AtomicU32::new(0),
        }
    }

    async fn next(&self) -> Result<T, DeviceError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let response = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match response {
            MockResponse::Reply(value) => Ok(value),
            MockResponse::Fail(error) => Err(error),
            MockResponse::Hang => std::future::pending().await,
        }
    }
}

/// Sensor station that plays back a script, then keeps answering "waiting"
pub struct MockSensorDevice {
    script: Script<SensorStatus>,
}

impl MockSensorDevice {
    pub fn new() -> Self {
        Self {
            script: Script::new(MockResponse::Reply(SensorStatus::Waiting)),
        }
    }

    /// Sensor that reports `reading` once `waiting_polls` polls have gone by
    pub fn ready_after(waiting_polls: usize, reading: SensorReading) -> Self {
        let sensor = Self::new();
        for _ in 0..waiting_polls {
            sensor.push(MockResponse::Reply(SensorStatus::Waiting));
        }
        sensor.push(MockResponse::Reply(SensorStatus::Ready(reading)));
        sensor
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.script.latency = latency;
        self
    }

    pub fn push(&self, response: MockResponse<SensorStatus>) {
        self.script.queue.lock().push_back(response);
    }

    pub fn request_count(&self) -> u32 {
        self.script.requests.load(Ordering::SeqCst)
    }
}

impl Default for MockSensorDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorDevice for MockSensorDevice {
    fn name(&self) -> &str {
        "mock-sensor"
    }

    async fn read_status(&self) -> Result<SensorStatus, DeviceError> {
        let status = self.script.next().await;
        debug!("Mock sensor answered {:?}", status);
        status
    }
}

/// Camera that plays back a script, then answers with a fixed image
pub struct MockCameraDevice {
    script: Script<CameraStatus>,
}

impl MockCameraDevice {
    pub fn new(fallback: ImagePayload) -> Self {
        Self {
            script: Script::new(MockResponse::Reply(CameraStatus::Ok(fallback))),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.script.latency = latency;
        self
    }

    pub fn push(&self, response: MockResponse<CameraStatus>) {
        self.script.queue.lock().push_back(response);
    }

    pub fn push_image(&self, payload: ImagePayload) {
        self.push(MockResponse::Reply(CameraStatus::Ok(payload)));
    }

    pub fn push_error(&self, message: &str) {
        self.push(MockResponse::Reply(CameraStatus::Error {
            message: message.to_string(),
        }));
    }

    pub fn request_count(&self) -> u32 {
        self.script.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraDevice for MockCameraDevice {
    fn name(&self) -> &str {
        "mock-camera"
    }

    async fn capture(&self) -> Result<CameraStatus, DeviceError> {
        let status = self.script.next().await;
        debug!("Mock camera answered {:?}", status);
        status
    }
}
