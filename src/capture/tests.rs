use super::*;
use crate::backend::InMemoryGoatRepository;
use crate::device::mock::{MockCameraDevice, MockResponse, MockSensorDevice};
use crate::device::{DeviceLink, ImagePayload, LinkTimings, SensorReading};
use crate::draft::{Gender, GoatAttributes, RegistrationDraftStore};
use crate::error::{DeviceError, SmartGidError};
use crate::events::{EventBus, EventFilter, WizardEvent};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

fn image(encoded: &str) -> ImagePayload {
    ImagePayload::new(encoded).unwrap()
}

fn policy(shot_count: usize) -> CapturePolicy {
    CapturePolicy {
        shot_count,
        ..CapturePolicy::default()
    }
}

fn stage_with(
    camera: Arc<MockCameraDevice>,
    policy: CapturePolicy,
    bus: &EventBus,
) -> CaptureSequenceStage {
    let link = DeviceLink::new(
        Arc::new(MockSensorDevice::new()),
        camera,
        LinkTimings::default(),
    );
    CaptureSequenceStage::new(link, bus.clone(), policy)
}

fn ready_store(shot_count: usize) -> RegistrationDraftStore {
    let mut store = RegistrationDraftStore::new("farm-1", shot_count);
    store.set_sensor_reading(SensorReading {
        tag_id: "RFID-1".to_string(),
        weight_kg: 42.5,
        height_cm: 70.0,
    });
    store.set_attributes(GoatAttributes {
        name: "Billy".to_string(),
        gender: Some(Gender::Male),
        breed: "Boer".to_string(),
        birth_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        health_status: Default::default(),
    });
    store
}

#[tokio::test(start_paused = true)]
async fn test_error_twice_then_ok_fills_slot_zero_after_three_requests() {
    let bus = EventBus::new(32);
    let camera = Arc::new(MockCameraDevice::new(image("Zm9v")));
    camera.push_error("sensor busy");
    camera.push_error("sensor busy");
    camera.push_image(image("QQ=="));
    let mut stage = stage_with(camera.clone(), policy(1), &bus);
    let mut store = ready_store(1);

    let start = Instant::now();
    stage.run(&mut store).await.unwrap();

    assert_eq!(camera.request_count(), 3);
    let images = store.draft().images.images();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].index, 0);
    assert_eq!(images[0].payload.as_str(), "QQ==");
    // two backoffs, no reposition after the last slot
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    assert_eq!(stage.phase(), CapturePhase::Reviewing);
}

#[tokio::test(start_paused = true)]
async fn test_slots_fill_in_order_with_reposition_pauses() {
    let bus = EventBus::new(64);
    let mut events = bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["shot_captured", "repositioning", "review_ready"]),
        "test",
    );
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    camera.push_image(image("MA=="));
    camera.push_error("flash not ready");
    camera.push_image(image("MQ=="));
    camera.push_image(image("Mg=="));
    camera.push_image(image("Mw=="));
    let mut stage = stage_with(camera, policy(4), &bus);
    let mut store = ready_store(4);

    let start = Instant::now();
    stage.run(&mut store).await.unwrap();

    // three 1.5s reposition pauses and one 2s backoff
    assert_eq!(start.elapsed(), Duration::from_millis(6500));
    assert!(store.draft().images.is_contiguous());
    assert_eq!(store.draft().images.payloads(), vec!["MA==", "MQ==", "Mg==", "Mw=="]);

    let captured: Vec<usize> = events
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            WizardEvent::ShotCaptured { slot, .. } => Some(slot),
            WizardEvent::ReviewReady { shot_count } => Some(100 + shot_count),
            _ => None,
        })
        .collect();
    assert_eq!(captured, vec![0, 1, 2, 3, 104]);
}

#[tokio::test(start_paused = true)]
async fn test_later_slot_never_requested_before_earlier_commit() {
    let bus = EventBus::new(64);
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    let mut stage = stage_with(camera.clone(), policy(4), &bus);
    let mut store = ready_store(4);

    // slot 1 is still repositioning at 1s: only one request so far
    let partial = timeout(Duration::from_secs(1), stage.run(&mut store)).await;
    assert!(partial.is_err());
    assert_eq!(camera.request_count(), 1);
    assert_eq!(store.draft().images.len(), 1);
    assert_eq!(stage.phase(), CapturePhase::Repositioning(0));

    stage.run(&mut store).await.unwrap();
    assert_eq!(camera.request_count(), 4);
    assert!(store.draft().images.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_attempt_limit_surfaces_capture_exhausted() {
    let bus = EventBus::new(64);
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    camera.push_image(image("MA=="));
    for _ in 0..5 {
        camera.push_error("lens error");
    }
    let mut stage = stage_with(camera.clone(), policy(4), &bus);
    let mut store = ready_store(4);

    match stage.run(&mut store).await {
        Err(SmartGidError::CaptureExhausted {
            slot,
            attempts,
            last_error,
        }) => {
            assert_eq!(slot, 1);
            assert_eq!(attempts, 5);
            assert!(matches!(last_error, DeviceError::Rejected { .. }));
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert_eq!(camera.request_count(), 6);
    assert_eq!(store.draft().images.len(), 1);
    assert_eq!(stage.phase(), CapturePhase::Shooting(1));
    assert_eq!(stage.attempt().consecutive_failures, 5);

    // running again retries the same slot with a fresh attempt count
    stage.run(&mut store).await.unwrap();
    assert!(store.draft().images.is_complete());
    assert_eq!(stage.attempt().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_policy_keeps_retrying() {
    let bus = EventBus::new(64);
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    for _ in 0..12 {
        camera.push_error("lens error");
    }
    let unbounded = CapturePolicy {
        max_attempts: None,
        ..policy(1)
    };
    let mut stage = stage_with(camera.clone(), unbounded, &bus);
    let mut store = ready_store(1);

    stage.run(&mut store).await.unwrap();
    assert_eq!(camera.request_count(), 13);
}

#[tokio::test(start_paused = true)]
async fn test_camera_timeout_counts_as_failed_attempt() {
    let bus = EventBus::new(32);
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    camera.push(MockResponse::Hang);
    let mut stage = stage_with(camera.clone(), policy(1), &bus);
    let mut store = ready_store(1);

    let start = Instant::now();
    stage.run(&mut store).await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(12));
    assert_eq!(camera.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retake_all_always_resets_to_first_slot() {
    let bus = EventBus::new(64);
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    let mut stage = stage_with(camera, policy(4), &bus);
    let mut store = ready_store(4);

    // from a finished sequence
    stage.run(&mut store).await.unwrap();
    stage.retake_all(&mut store).unwrap();
    assert!(store.draft().images.is_empty());
    assert_eq!(stage.phase(), CapturePhase::Shooting(0));

    // from the middle of a sequence
    let _ = timeout(Duration::from_secs(2), stage.run(&mut store)).await;
    assert_eq!(store.draft().images.len(), 2);
    stage.retake_all(&mut store).unwrap();
    assert!(store.draft().images.is_empty());
    assert_eq!(stage.phase(), CapturePhase::Shooting(0));
    assert_eq!(stage.attempt(), ShotAttempt::new(0));

    // twice in a row
    stage.retake_all(&mut store).unwrap();
    assert!(store.draft().images.is_empty());
    assert_eq!(stage.phase(), CapturePhase::Shooting(0));

    // sensor and attributes survive
    assert!(store.draft().sensor.is_some());
    assert_eq!(store.draft().attributes.name, "Billy");
}

#[tokio::test(start_paused = true)]
async fn test_failed_submit_returns_to_review_and_resends_identical_payload() {
    let bus = EventBus::new(64);
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    let mut stage = stage_with(camera.clone(), policy(4), &bus);
    let mut store = ready_store(4);
    let repo = InMemoryGoatRepository::new();
    repo.fail_next_creates(2);

    stage.run(&mut store).await.unwrap();

    for _ in 0..2 {
        let err = stage.submit(&mut store, &repo).await.unwrap_err();
        assert!(matches!(err, SmartGidError::SubmitFailed { .. }));
        assert_eq!(stage.phase(), CapturePhase::Reviewing);
        assert!(store.draft().images.is_complete());
    }

    let record = stage.submit(&mut store, &repo).await.unwrap();
    assert_eq!(stage.phase(), CapturePhase::Submitted);
    assert_eq!(record.photos.len(), 4);
    assert_eq!(camera.request_count(), 4);

    let requests = repo.create_requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|body| body == &requests[0]));
    assert_eq!(repo.records().len(), 1);

    assert!(stage.retake_all(&mut store).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_retake_after_abandoned_submit_creates_nothing() {
    let bus = EventBus::new(64);
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    let mut stage = stage_with(camera, policy(2), &bus);
    let mut store = ready_store(2);
    let repo = InMemoryGoatRepository::new().with_latency(Duration::from_secs(5));

    stage.run(&mut store).await.unwrap();
    let abandoned = timeout(Duration::from_secs(1), stage.submit(&mut store, &repo)).await;
    assert!(abandoned.is_err());
    assert_eq!(stage.phase(), CapturePhase::Submitting);

    stage.retake_all(&mut store).unwrap();
    sleep(Duration::from_secs(10)).await;
    assert!(repo.records().is_empty());
    assert!(store.draft().images.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_submit_requires_review_and_complete_draft() {
    let bus = EventBus::new(32);
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    let mut stage = stage_with(camera, policy(1), &bus);
    let mut store = RegistrationDraftStore::new("farm-1", 1);
    let repo = InMemoryGoatRepository::new();

    assert!(matches!(
        stage.submit(&mut store, &repo).await,
        Err(SmartGidError::InvalidTransition { .. })
    ));

    stage.run(&mut store).await.unwrap();
    assert!(matches!(
        stage.submit(&mut store, &repo).await,
        Err(SmartGidError::ValidationFailed { .. })
    ));
    assert_eq!(stage.phase(), CapturePhase::Reviewing);
    assert!(repo.create_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_cancel_stops_sequence() {
    let bus = EventBus::new(32);
    let camera = Arc::new(MockCameraDevice::new(image("QQ==")));
    let session = CancellationToken::new();
    let mut stage = stage_with(camera.clone(), policy(4), &bus).with_session(session.clone());
    let mut store = ready_store(4);

    let canceller = async {
        sleep(Duration::from_secs(2)).await;
        session.cancel();
    };
    let (result, _) = tokio::join!(stage.run(&mut store), canceller);

    assert!(matches!(result, Err(SmartGidError::Terminated)));
    assert_eq!(camera.request_count(), 2);
    assert_eq!(store.draft().images.len(), 2);
}
