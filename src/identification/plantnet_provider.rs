// PlantNetProvider - plant identification via the Pl@ntNet API

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::provider::{IdentificationProvider, PlantCandidate};
use crate::error::DiscoveryError;

const PLANTNET_URL: &str = "https://my-api.plantnet.org/v2/identify/all";

/// Bound on a single identification request; the pipeline has no retry, so
/// this is what keeps a run from hanging indefinitely.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Plant identification provider backed by the Pl@ntNet recognition API.
///
/// Submits one multipart image upload per call with an "organs=auto" hint
/// and decodes the ranked results array into typed candidates.
pub struct PlantNetProvider {
    api_key: String,
    endpoint: String,
    client: Client,
}

impl PlantNetProvider {
    pub fn new(api_key: String) -> Result<Self, String> {
        Self::new_with_endpoint(api_key, PLANTNET_URL.to_string())
    }

    /// Construct against a custom endpoint (used by tests against a local server)
    pub fn new_with_endpoint(api_key: String, endpoint: String) -> Result<Self, String> {
        let key_prefix: String = api_key.chars().take(8).collect();
        eprintln!(
            "Identification/PlantNet: Initialized with API key ({}...)",
            key_prefix
        );
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            api_key,
            endpoint,
            client,
        })
    }
}

// ── Pl@ntNet API response shapes ──

#[derive(Deserialize)]
struct PlantNetResponse {
    #[serde(default)]
    results: Vec<PlantNetResult>,
}

#[derive(Deserialize)]
struct PlantNetResult {
    #[serde(default)]
    species: Option<PlantNetSpecies>,
}

#[derive(Deserialize)]
struct PlantNetSpecies {
    #[serde(rename = "scientificNameWithoutAuthor", default)]
    scientific_name_without_author: String,

    #[serde(rename = "commonNames", default)]
    common_names: Vec<String>,
}

/// Decode a Pl@ntNet response body into candidates.
///
/// A missing or empty results array decodes to an empty list ("no match"),
/// never an error. Results without a species object are dropped.
fn decode_candidates(body: &str) -> Result<Vec<PlantCandidate>, String> {
    let response: PlantNetResponse = serde_json::from_str(body)
        .map_err(|e| format!("Failed to parse Pl@ntNet response: {}", e))?;

    Ok(response
        .results
        .into_iter()
        .filter_map(|r| r.species)
        .map(|species| PlantCandidate {
            scientific_name: species.scientific_name_without_author,
            // Aliases arrive padded from some datasets; trim here so the
            // enrichment page titles never carry leading underscores
            common_names: species
                .common_names
                .into_iter()
                .map(|name| name.trim().to_string())
                .collect(),
        })
        .collect())
}

#[async_trait]
impl IdentificationProvider for PlantNetProvider {
    fn name(&self) -> &str {
        "plantnet"
    }

    async fn identify(&self, image_bytes: Vec<u8>) -> Result<Vec<PlantCandidate>, DiscoveryError> {
        eprintln!(
            "Identification/PlantNet: identify ({} image bytes)",
            image_bytes.len()
        );

        let part = multipart::Part::bytes(image_bytes)
            .file_name(crate::files::STAGING_FILENAME)
            .mime_str("image/jpeg")
            .map_err(|e| DiscoveryError::Service(format!("Invalid mime type: {}", e)))?;
        let form = multipart::Form::new()
            .part("images", part)
            .text("organs", "auto");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("api-key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| DiscoveryError::Network(format!("Pl@ntNet request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eprintln!("Identification/PlantNet: API error {} — {}", status, body);
            return Err(DiscoveryError::Service(format!(
                "Pl@ntNet returned {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DiscoveryError::Network(format!("Failed to read Pl@ntNet response: {}", e)))?;

        let candidates = decode_candidates(&body).map_err(DiscoveryError::Service)?;

        eprintln!(
            "Identification/PlantNet: Returning {} candidates",
            candidates.len()
        );
        Ok(candidates)
    }
}
