use crate::backend::NewGoat;
use crate::device::{ImagePayload, SensorReading};
use crate::error::{Result, SmartGidError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Breeds offered by the details prompt. Free text is accepted as well.
pub const KNOWN_BREEDS: &[&str] = &[
    "Native",
    "Boer",
    "Anglo-Nubian",
    "Saanen",
    "Toggenburg",
    "Mixed",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "buck" => Ok(Gender::Male),
            "female" | "f" | "doe" => Ok(Gender::Female),
            other => Err(format!("unknown gender '{}', expected Male or Female", other)),
        }
    }
}

/// Operator-entered details of the goat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoatAttributes {
    pub name: String,
    pub gender: Option<Gender>,
    pub breed: String,
    pub birth_date: Option<NaiveDate>,
    pub health_status: BTreeSet<String>,
}

impl GoatAttributes {
    /// Required fields that are still empty, in form order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.gender.is_none() {
            missing.push("gender");
        }
        if self.breed.trim().is_empty() {
            missing.push("breed");
        }
        if self.birth_date.is_none() {
            missing.push("birth date");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// One filled photo slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedImage {
    pub index: usize,
    pub payload: ImagePayload,
}

/// Fixed number of photo slots, filled strictly in index order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSequence {
    capacity: usize,
    images: Vec<CapturedImage>,
}

impl ImageSequence {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            images: Vec::with_capacity(capacity),
        }
    }

    /// Fill `slot`, which must be the next empty one
    pub fn commit(&mut self, slot: usize, payload: ImagePayload) -> Result<()> {
        match self.next_slot() {
            Some(next) if next == slot => {
                self.images.push(CapturedImage {
                    index: slot,
                    payload,
                });
                Ok(())
            }
            Some(next) => Err(SmartGidError::component(
                "draft",
                format!("photo {} committed while slot {} is next", slot, next),
            )),
            None => Err(SmartGidError::component(
                "draft",
                format!("photo {} committed to a full sequence", slot),
            )),
        }
    }

    /// Index of the first empty slot, `None` when every slot is filled
    pub fn next_slot(&self) -> Option<usize> {
        (self.images.len() < self.capacity).then_some(self.images.len())
    }

    pub fn is_complete(&self) -> bool {
        self.images.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[CapturedImage] {
        &self.images
    }

    pub fn payloads(&self) -> Vec<String> {
        self.images
            .iter()
            .map(|image| image.payload.as_str().to_string())
            .collect()
    }

    /// Slots hold indices `0..len` with no gaps
    pub fn is_contiguous(&self) -> bool {
        self.images.len() <= self.capacity
            && self
                .images
                .iter()
                .enumerate()
                .all(|(i, image)| image.index == i)
    }
}

/// Everything gathered for one goat before it is submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationDraft {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub owner_id: String,
    pub sensor: Option<SensorReading>,
    pub attributes: GoatAttributes,
    pub images: ImageSequence,
}

impl RegistrationDraft {
    pub fn new(owner_id: &str, shot_count: usize) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            owner_id: owner_id.to_string(),
            sensor: None,
            attributes: GoatAttributes::default(),
            images: ImageSequence::new(shot_count),
        }
    }

    /// Everything still preventing a submit
    pub fn missing_for_submit(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.owner_id.trim().is_empty() {
            missing.push("owner");
        }
        if self.sensor.is_none() {
            missing.push("sensor reading");
        }
        missing.extend(self.attributes.missing_fields());
        if !self.images.is_complete() {
            missing.push("photos");
        }
        missing
    }

    /// Build the create payload; fails unless every part is present
    pub fn to_new_goat(&self) -> Result<NewGoat> {
        let missing = self.missing_for_submit();
        match (&self.sensor, self.attributes.gender, self.attributes.birth_date) {
            (Some(sensor), Some(gender), Some(birth_date)) if missing.is_empty() => Ok(NewGoat {
                name: self.attributes.name.trim().to_string(),
                gender: gender.to_string(),
                breed: self.attributes.breed.trim().to_string(),
                birth_date,
                health_status: self.attributes.health_status.iter().cloned().collect(),
                rfid_tag: sensor.tag_id.clone(),
                weight: sensor.weight_kg,
                height: sensor.height_cm,
                owner: self.owner_id.clone(),
                photos: self.images.payloads(),
            }),
            _ => Err(SmartGidError::ValidationFailed { missing }),
        }
    }
}
