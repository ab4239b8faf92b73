use super::model::{GoatRecord, GoatUpdate, NewGoat};
use super::repository::GoatRepository;
use crate::config::BackendConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, info};

/// Goat registry REST API
pub struct HttpGoatRepository {
    client: Client,
    base_url: String,
}

impl HttpGoatRepository {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::new(client, &config.base_url))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Parse a registry response, surfacing `{error}` bodies on failure
async fn read_body(response: Response) -> Result<Value, BackendError> {
    let status = response.status();
    let text = response.text().await?;
    let body: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("API Request Failed")
            .to_string();
        return Err(BackendError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(body)
}

/// The registry answers with either the record itself or `{ goat: record }`
fn into_record(body: Value) -> Result<GoatRecord, BackendError> {
    let body = match body {
        Value::Object(mut map) if map.contains_key("goat") => {
            map.remove("goat").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(body).map_err(|e| BackendError::Decode {
        details: e.to_string(),
    })
}

fn into_records(body: Value) -> Result<Vec<GoatRecord>, BackendError> {
    let body = match body {
        Value::Object(mut map) if map.contains_key("goats") => {
            map.remove("goats").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(body).map_err(|e| BackendError::Decode {
        details: e.to_string(),
    })
}

#[async_trait]
impl GoatRepository for HttpGoatRepository {
    async fn create(&self, goat: &NewGoat) -> Result<GoatRecord, BackendError> {
        info!(
            "Registering goat {} ({} photos)",
            goat.rfid_tag,
            goat.photos.len()
        );
        let response = self
            .client
            .post(self.url("add-goat"))
            .json(goat)
            .send()
            .await?;
        into_record(read_body(response).await?)
    }

    async fn update(&self, id: &str, update: &GoatUpdate) -> Result<GoatRecord, BackendError> {
        debug!("Updating goat {}", id);
        let response = self
            .client
            .put(self.url(&format!("update-goat/{}", id)))
            .json(update)
            .send()
            .await?;
        into_record(read_body(response).await?)
    }

    async fn get(&self, id: &str) -> Result<GoatRecord, BackendError> {
        let response = self
            .client
            .get(self.url(&format!("get-goat/{}", id)))
            .send()
            .await?;
        into_record(read_body(response).await?)
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        info!("Deleting goat {}", id);
        let response = self
            .client
            .delete(self.url(&format!("delete-goat/{}", id)))
            .send()
            .await?;
        read_body(response).await?;
        Ok(())
    }

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<GoatRecord>, BackendError> {
        let response = self
            .client
            .get(self.url(&format!("get-goats/{}", owner)))
            .send()
            .await?;
        into_records(read_body(response).await?)
    }
}
