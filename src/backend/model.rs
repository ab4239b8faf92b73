use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Body of the create call, in the registry's wire format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoat {
    pub name: String,
    pub gender: String,
    pub breed: String,
    pub birth_date: NaiveDate,
    pub health_status: Vec<String>,
    pub rfid_tag: String,
    pub weight: f64,
    pub height: f64,
    pub owner: String,
    pub photos: Vec<String>,
}

/// Goat as stored by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoatRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub breed: String,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub health_status: Vec<String>,
    #[serde(default)]
    pub rfid_tag: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    /// Fields this client does not interpret (listing data, timestamps, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoatUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_status: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
}

impl GoatUpdate {
    pub fn is_empty(&self) -> bool {
        *self == GoatUpdate::default()
    }
}

impl GoatRecord {
    /// Record the registry would return for `goat`
    pub fn from_new(id: String, goat: &NewGoat) -> Self {
        Self {
            id,
            name: goat.name.clone(),
            gender: goat.gender.clone(),
            breed: goat.breed.clone(),
            birth_date: Some(goat.birth_date.to_string()),
            health_status: goat.health_status.clone(),
            rfid_tag: Some(goat.rfid_tag.clone()),
            weight: Some(goat.weight),
            height: Some(goat.height),
            owner: Some(goat.owner.clone()),
            photos: goat.photos.clone(),
            extra: serde_json::Map::new(),
        }
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &GoatUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(gender) = &update.gender {
            self.gender = gender.clone();
        }
        if let Some(breed) = &update.breed {
            self.breed = breed.clone();
        }
        if let Some(birth_date) = update.birth_date {
            self.birth_date = Some(birth_date.to_string());
        }
        if let Some(health_status) = &update.health_status {
            self.health_status = health_status.clone();
        }
        if let Some(weight) = update.weight {
            self.weight = Some(weight);
        }
        if let Some(height) = update.height {
            self.height = Some(height);
        }
        if let Some(photos) = &update.photos {
            self.photos = photos.clone();
        }
    }
}
