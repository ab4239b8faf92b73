use super::mock::{MockCameraDevice, MockResponse, MockSensorDevice};
use super::*;
use crate::error::DeviceError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reading(tag: &str) -> SensorReading {
    SensorReading {
        tag_id: tag.to_string(),
        weight_kg: 42.5,
        height_cm: 70.0,
    }
}

fn image(encoded: &str) -> ImagePayload {
    ImagePayload::new(encoded).unwrap()
}

fn mock_link(sensor: Arc<MockSensorDevice>, camera: Arc<MockCameraDevice>) -> DeviceLink {
    DeviceLink::new(sensor, camera, LinkTimings::default())
}

#[tokio::test]
async fn test_http_sensor_decodes_ready_reading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ready",
            "uid": "RFID-1",
            "weight": 42.5,
            "height": 70
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sensor = HttpSensorDevice::new(reqwest::Client::new(), &server.uri());
    let status = sensor.read_status().await.unwrap();
    assert_eq!(status, SensorStatus::Ready(reading("RFID-1")));
}

#[tokio::test]
async fn test_http_sensor_non_success_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get-data"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sensor = HttpSensorDevice::new(reqwest::Client::new(), &server.uri());
    let err = sensor.read_status().await.unwrap_err();
    assert!(matches!(err, DeviceError::Transport { .. }));
}

#[tokio::test]
async fn test_http_camera_rejects_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/capture"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let camera = HttpCameraDevice::new(reqwest::Client::new(), &format!("{}/", server.uri()));
    let err = camera.capture().await.unwrap_err();
    assert!(matches!(err, DeviceError::Rejected { .. }));
}

#[tokio::test]
async fn test_link_polls_http_sensor_until_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get-data"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get-data"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "waiting"})),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "uid": "TAG-9",
            "weight": 30.0,
            "height": 55.0
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/capture"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "ok", "image": "QQ=="})),
        )
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let link = DeviceLink::new(
        Arc::new(HttpSensorDevice::new(client.clone(), &server.uri())),
        Arc::new(HttpCameraDevice::new(client, &server.uri())),
        LinkTimings {
            poll_interval: Duration::from_millis(10),
            sensor_timeout: Duration::from_secs(2),
            camera_timeout: Duration::from_secs(2),
        },
    );

    let mut attempts = Vec::new();
    let got = link
        .poll_for_reading_observed(&CancellationToken::new(), |attempt, outcome| {
            attempts.push((attempt, outcome.clone()))
        })
        .await
        .unwrap();

    assert_eq!(got.tag_id, "TAG-9");
    assert_eq!(attempts.len(), 3);
    assert!(matches!(attempts[0].1, PollOutcome::Failed(_)));
    assert_eq!(attempts[1].1, PollOutcome::Waiting);

    let payload = link.request_capture().await.unwrap();
    assert_eq!(payload.as_str(), "QQ==");
}

#[tokio::test(start_paused = true)]
async fn test_poll_absorbs_failures_and_timeouts() {
    let sensor = Arc::new(MockSensorDevice::new());
    sensor.push(MockResponse::Fail(DeviceError::transport("mock-sensor", "refused")));
    sensor.push(MockResponse::Hang);
    sensor.push(MockResponse::Reply(SensorStatus::Waiting));
    sensor.push(MockResponse::Reply(SensorStatus::Ready(reading("RFID-7"))));
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    let link = mock_link(Arc::clone(&sensor), camera);

    let start = Instant::now();
    let got = link.poll_for_reading(&CancellationToken::new()).await.unwrap();

    assert_eq!(got.tag_id, "RFID-7");
    assert_eq!(sensor.request_count(), 4);
    // three 1s pauses plus one 2s request timeout
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_poll_cancelled_before_start_issues_no_request() {
    let sensor = Arc::new(MockSensorDevice::new());
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    let link = mock_link(Arc::clone(&sensor), camera);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = link.poll_for_reading(&cancel).await.unwrap_err();
    assert!(matches!(err, DeviceError::Cancelled { .. }));
    assert_eq!(sensor.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_stops_during_pause_when_cancelled() {
    let sensor = Arc::new(MockSensorDevice::new());
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    let link = mock_link(Arc::clone(&sensor), camera);
    let cancel = CancellationToken::new();

    let start = Instant::now();
    let canceller = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            cancel.cancel();
        }
    };
    let (result, _) = tokio::join!(link.poll_for_reading(&cancel), canceller);

    assert!(matches!(result, Err(DeviceError::Cancelled { .. })));
    assert_eq!(start.elapsed(), Duration::from_millis(2500));
    assert_eq!(sensor.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_reading_arriving_after_cancel_is_discarded() {
    let sensor = Arc::new(
        MockSensorDevice::ready_after(0, reading("LATE")).with_latency(Duration::from_millis(500)),
    );
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    let link = mock_link(Arc::clone(&sensor), camera);
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        }
    };
    let (result, _) = tokio::join!(link.poll_for_reading(&cancel), canceller);

    assert!(matches!(result, Err(DeviceError::Cancelled { .. })));
    assert_eq!(sensor.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capture_error_status_is_rejected() {
    let sensor = Arc::new(MockSensorDevice::new());
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    camera.push_error("sensor busy");
    let link = mock_link(sensor, Arc::clone(&camera));

    let err = link.request_capture().await.unwrap_err();
    assert_eq!(
        err,
        DeviceError::Rejected {
            device: "mock-camera".to_string(),
            message: "sensor busy".to_string(),
        }
    );

    let payload = link.request_capture().await.unwrap();
    assert_eq!(payload, image("QQ=="));
    assert_eq!(camera.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_capture_times_out() {
    let sensor = Arc::new(MockSensorDevice::new());
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    camera.push(MockResponse::Hang);
    let link = mock_link(sensor, camera);

    let start = Instant::now();
    let err = link.request_capture().await.unwrap_err();
    assert!(matches!(err, DeviceError::Timeout { .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}
