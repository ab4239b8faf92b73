use super::*;
use crate::backend::{GoatRepository, InMemoryGoatRepository};
use crate::device::{ImagePayload, SensorReading};
use crate::error::SmartGidError;
use chrono::NaiveDate;
use tempfile::TempDir;

fn reading() -> SensorReading {
    SensorReading {
        tag_id: "RFID-1".to_string(),
        weight_kg: 42.5,
        height_cm: 70.0,
    }
}

fn attributes() -> GoatAttributes {
    GoatAttributes {
        name: "Billy".to_string(),
        gender: Some(Gender::Male),
        breed: "Boer".to_string(),
        birth_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        health_status: ["Vaccinated", "Dewormed"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

fn image(b64: &str) -> ImagePayload {
    ImagePayload::new(b64).unwrap()
}

fn complete_store() -> RegistrationDraftStore {
    let mut store = RegistrationDraftStore::new("farm-1", 2);
    store.set_sensor_reading(reading());
    store.set_attributes(attributes());
    store.set_images(vec![image("QQ=="), image("Qg==")]).unwrap();
    store
}

#[test]
fn test_gender_parsing() {
    assert_eq!("male".parse::<Gender>().unwrap(), Gender::Male);
    assert_eq!(" Doe ".parse::<Gender>().unwrap(), Gender::Female);
    assert!("wether?".parse::<Gender>().is_err());
    assert_eq!(Gender::Female.to_string(), "Female");
}

#[test]
fn test_missing_attribute_fields() {
    let mut attrs = GoatAttributes::default();
    assert_eq!(
        attrs.missing_fields(),
        vec!["name", "gender", "breed", "birth date"]
    );
    attrs.name = "   ".to_string();
    attrs.breed = "Saanen".to_string();
    assert_eq!(attrs.missing_fields(), vec!["name", "gender", "birth date"]);
    assert!(attributes().is_complete());
}

#[test]
fn test_image_sequence_fills_in_order() {
    let mut images = ImageSequence::new(3);
    assert_eq!(images.next_slot(), Some(0));
    assert!(images.commit(1, image("QQ==")).is_err());

    images.commit(0, image("QQ==")).unwrap();
    images.commit(1, image("Qg==")).unwrap();
    assert!(images.commit(1, image("Qw==")).is_err());
    assert_eq!(images.next_slot(), Some(2));
    assert!(images.is_contiguous());

    images.commit(2, image("Qw==")).unwrap();
    assert!(images.is_complete());
    assert_eq!(images.next_slot(), None);
    assert!(images.commit(3, image("RA==")).is_err());
    assert_eq!(images.payloads(), vec!["QQ==", "Qg==", "Qw=="]);

    images.clear();
    assert!(images.is_empty());
    assert_eq!(images.capacity(), 3);
}

#[test]
fn test_submission_payload_requires_every_part() {
    let mut store = RegistrationDraftStore::new("farm-1", 2);
    match store.submission_payload() {
        Err(SmartGidError::ValidationFailed { missing }) => {
            assert!(missing.contains(&"sensor reading"));
            assert!(missing.contains(&"name"));
            assert!(missing.contains(&"photos"));
        }
        other => panic!("expected validation failure, got {:?}", other),
    }

    store.set_sensor_reading(reading());
    store.set_attributes(attributes());
    store.commit_image(0, image("QQ==")).unwrap();
    assert!(store.submission_payload().is_err());

    store.commit_image(1, image("Qg==")).unwrap();
    let payload = store.submission_payload().unwrap();
    assert_eq!(payload.rfid_tag, "RFID-1");
    assert_eq!(payload.weight, 42.5);
    assert_eq!(payload.owner, "farm-1");
    assert_eq!(payload.health_status, vec!["Dewormed", "Vaccinated"]);
    assert_eq!(payload.photos, vec!["QQ==", "Qg=="]);
}

#[test]
fn test_set_images_rejects_overflow() {
    let mut store = RegistrationDraftStore::new("farm-1", 1);
    assert!(store
        .set_images(vec![image("QQ=="), image("Qg==")])
        .is_err());
    assert!(store.draft().images.is_empty());
}

#[test]
fn test_clear_sensor_reading_keeps_attributes() {
    let mut store = complete_store();
    store.clear_sensor_reading();
    assert!(store.draft().sensor.is_none());
    assert_eq!(store.draft().attributes, attributes());
    assert_eq!(store.draft().images.len(), 2);
}

#[tokio::test]
async fn test_failed_submit_keeps_draft_and_resends_same_payload() {
    let repo = InMemoryGoatRepository::new();
    repo.fail_next_creates(1);
    let mut store = complete_store();
    let before = store.draft().clone();

    let err = store.submit(&repo).await.unwrap_err();
    assert!(matches!(err, SmartGidError::SubmitFailed { .. }));
    assert_eq!(store.draft(), &before);

    let record = store.submit(&repo).await.unwrap();
    assert_eq!(record.rfid_tag.as_deref(), Some("RFID-1"));

    let requests = repo.create_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);

    // cleared after success, owner and slot count kept
    assert!(store.draft().sensor.is_none());
    assert!(store.draft().images.is_empty());
    assert_eq!(store.draft().owner_id, "farm-1");
    assert_eq!(store.draft().images.capacity(), 2);
    assert_ne!(store.draft().session_id, before.session_id);
}

#[tokio::test]
async fn test_submit_with_incomplete_draft_never_calls_registry() {
    let repo = InMemoryGoatRepository::new();
    let mut store = RegistrationDraftStore::new("farm-1", 4);
    store.set_sensor_reading(reading());

    let err = store.submit(&repo).await.unwrap_err();
    assert!(matches!(err, SmartGidError::ValidationFailed { .. }));
    assert!(repo.create_requests().is_empty());
    assert!(repo.list_for_owner("farm-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checkpoint_save_load_and_clear() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("drafts").join("current.json");

    let store = complete_store().with_checkpoint(&path);
    store.save().await.unwrap();
    assert!(path.exists());

    let mut resumed = RegistrationDraftStore::load(&path, 2).await.unwrap().unwrap();
    assert_eq!(resumed.draft(), store.draft());
    assert_eq!(resumed.checkpoint_path(), Some(path.as_path()));

    resumed.clear().await.unwrap();
    assert!(!path.exists());
    assert!(RegistrationDraftStore::load(&path, 2).await.unwrap().is_none());

    // clearing twice is harmless
    resumed.clear().await.unwrap();
}

#[tokio::test]
async fn test_save_without_checkpoint_is_noop() {
    let store = complete_store();
    store.save().await.unwrap();
    assert!(store.checkpoint_path().is_none());
}

#[tokio::test]
async fn test_load_rejects_corrupt_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("draft.json");
    tokio::fs::write(&path, "{not json").await.unwrap();
    assert!(matches!(
        RegistrationDraftStore::load(&path, 2).await,
        Err(SmartGidError::Json(_))
    ));
}

#[tokio::test]
async fn test_load_rejects_checkpoint_with_other_slot_count() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("draft.json");

    let store = RegistrationDraftStore::new("farm-1", 0).with_checkpoint(&path);
    store.save().await.unwrap();
    assert!(matches!(
        RegistrationDraftStore::load(&path, 4).await,
        Err(SmartGidError::Component { .. })
    ));
    assert!(RegistrationDraftStore::load(&path, 0).await.is_err());

    let store = complete_store().with_checkpoint(&path);
    store.save().await.unwrap();
    assert!(RegistrationDraftStore::load(&path, 4).await.is_err());
    assert!(RegistrationDraftStore::load(&path, 2).await.unwrap().is_some());
}

#[tokio::test]
async fn test_submit_succeeds_when_checkpoint_cannot_be_removed() {
    let temp_dir = TempDir::new().unwrap();
    // a directory in place of the checkpoint file cannot be removed as a file
    let path = temp_dir.path().join("draft.json");
    tokio::fs::create_dir(&path).await.unwrap();

    let repo = InMemoryGoatRepository::new();
    let mut store = complete_store().with_checkpoint(&path);

    let record = store.submit(&repo).await.unwrap();
    assert_eq!(record.rfid_tag.as_deref(), Some("RFID-1"));
    assert_eq!(repo.records().len(), 1);
    assert!(store.draft().sensor.is_none());
    assert!(store.draft().images.is_empty());
    assert_eq!(repo.create_requests().len(), 1);
}
