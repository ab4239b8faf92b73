use super::model::{GoatAttributes, RegistrationDraft};
use crate::backend::{GoatRecord, GoatRepository, NewGoat};
use crate::device::{ImagePayload, SensorReading};
use crate::error::{Result, SmartGidError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Owns the draft of the current registration session.
///
/// Stages write their results through the mutation methods; nothing else
/// holds the draft. When a checkpoint path is configured, [`save`](Self::save)
/// writes the draft there so [`load`](Self::load) can resume the session
/// after a restart.
#[derive(Debug)]
pub struct RegistrationDraftStore {
    draft: RegistrationDraft,
    checkpoint: Option<PathBuf>,
}

impl RegistrationDraftStore {
    pub fn new(owner_id: &str, shot_count: usize) -> Self {
        Self {
            draft: RegistrationDraft::new(owner_id, shot_count),
            checkpoint: None,
        }
    }

    pub fn with_checkpoint<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.checkpoint = Some(path.into());
        self
    }

    /// Restore a checkpointed draft, `None` if there is nothing to resume.
    ///
    /// The checkpoint must have been taken with `shot_count` photo slots.
    pub async fn load<P: AsRef<Path>>(path: P, shot_count: usize) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(path).await.map_err(|e| {
            SmartGidError::component("draft", format!("Failed to read draft checkpoint: {}", e))
        })?;
        let draft: RegistrationDraft = serde_json::from_str(&json)?;

        let capacity = draft.images.capacity();
        if capacity == 0 || capacity != shot_count {
            return Err(SmartGidError::component(
                "draft",
                format!(
                    "Checkpoint {} has {} photo slots, expected {}",
                    path.display(),
                    capacity,
                    shot_count
                ),
            ));
        }

        if !draft.images.is_contiguous() {
            return Err(SmartGidError::component(
                "draft",
                format!("Checkpoint {} has out-of-order photos", path.display()),
            ));
        }

        info!(
            "Resuming registration {} started {}",
            draft.session_id, draft.started_at
        );
        Ok(Some(Self {
            draft,
            checkpoint: Some(path.to_path_buf()),
        }))
    }

    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }

    pub fn checkpoint_path(&self) -> Option<&Path> {
        self.checkpoint.as_deref()
    }

    pub fn set_owner(&mut self, owner_id: &str) {
        self.draft.owner_id = owner_id.to_string();
    }

    /// Replace the sensor reading wholesale
    pub fn set_sensor_reading(&mut self, reading: SensorReading) {
        debug!("Draft sensor reading set to tag {}", reading.tag_id);
        self.draft.sensor = Some(reading);
    }

    /// Drop only the sensor reading, keeping attributes and photos
    pub fn clear_sensor_reading(&mut self) {
        self.draft.sensor = None;
    }

    pub fn set_attributes(&mut self, attributes: GoatAttributes) {
        self.draft.attributes = attributes;
    }

    /// Replace all photos; payloads fill slots from 0 in order
    pub fn set_images(&mut self, payloads: Vec<ImagePayload>) -> Result<()> {
        let capacity = self.draft.images.capacity();
        if payloads.len() > capacity {
            return Err(SmartGidError::component(
                "draft",
                format!("{} photos given for {} slots", payloads.len(), capacity),
            ));
        }

        self.draft.images.clear();
        for (slot, payload) in payloads.into_iter().enumerate() {
            self.draft.images.commit(slot, payload)?;
        }
        Ok(())
    }

    pub fn commit_image(&mut self, slot: usize, payload: ImagePayload) -> Result<()> {
        self.draft.images.commit(slot, payload)
    }

    pub fn clear_images(&mut self) {
        self.draft.images.clear();
    }

    /// Create payload for the registry; identical on every call for the same draft
    pub fn submission_payload(&self) -> Result<NewGoat> {
        self.draft.to_new_goat()
    }

    /// Send the draft to the registry. On success the draft is cleared; on
    /// failure it is kept untouched so the same payload can be resent.
    ///
    /// A created record is never reported as a failure, even when the
    /// checkpoint cannot be removed afterwards.
    pub async fn submit(&mut self, repository: &dyn GoatRepository) -> Result<GoatRecord> {
        let payload = self.submission_payload()?;

        match repository.create(&payload).await {
            Ok(record) => {
                info!("Goat {} registered as {}", payload.rfid_tag, record.id);
                if let Err(e) = self.clear().await {
                    warn!("Goat {} saved but draft not cleared: {}", record.id, e);
                }
                Ok(record)
            }
            Err(e) => {
                error!("Registry rejected goat {}: {}", payload.rfid_tag, e);
                Err(SmartGidError::SubmitFailed {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Start over with an empty draft and remove any checkpoint
    pub async fn clear(&mut self) -> Result<()> {
        let owner = self.draft.owner_id.clone();
        let shot_count = self.draft.images.capacity();
        self.draft = RegistrationDraft::new(&owner, shot_count);

        if let Some(path) = &self.checkpoint {
            match fs::remove_file(path).await {
                Ok(()) => debug!("Removed draft checkpoint {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(SmartGidError::component(
                        "draft",
                        format!("Failed to remove draft checkpoint: {}", e),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Write the checkpoint, if one is configured
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.checkpoint else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                SmartGidError::component(
                    "draft",
                    format!("Failed to create checkpoint directory: {}", e),
                )
            })?;
        }

        let json = serde_json::to_string_pretty(&self.draft)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).await.map_err(|e| {
            SmartGidError::component("draft", format!("Failed to write draft checkpoint: {}", e))
        })?;
        fs::rename(&staging, path).await.map_err(|e| {
            SmartGidError::component("draft", format!("Failed to move draft checkpoint: {}", e))
        })?;

        debug!("Saved draft checkpoint to {}", path.display());
        Ok(())
    }

    /// Like [`save`](Self::save), logging instead of failing
    pub async fn save_quietly(&self) {
        if let Err(e) = self.save().await {
            warn!("Draft checkpoint not written: {}", e);
        }
    }
}
