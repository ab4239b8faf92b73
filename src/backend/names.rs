use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

pub const FALLBACK_NAME: &str = "Goaty McGoatface";

#[derive(Deserialize)]
struct NameResponse {
    results: Vec<NameResult>,
}

#[derive(Deserialize)]
struct NameResult {
    name: PersonName,
}

#[derive(Deserialize)]
struct PersonName {
    first: String,
}

/// Random first names for the details form
pub struct NameSuggester {
    client: Client,
    url: String,
}

impl NameSuggester {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    /// Never fails; falls back to [`FALLBACK_NAME`]
    pub async fn suggest(&self) -> String {
        match self.fetch().await {
            Ok(name) => name,
            Err(e) => {
                warn!("Name suggestion failed: {}", e);
                FALLBACK_NAME.to_string()
            }
        }
    }

    async fn fetch(&self) -> anyhow::Result<String> {
        let response: NameResponse = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .results
            .into_iter()
            .next()
            .map(|result| result.name.first)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("empty name list"))
    }
}
