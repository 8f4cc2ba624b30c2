// WikipediaProvider - species descriptions via the Wikipedia REST summary API

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::provider::{DescriptionProvider, NO_DESCRIPTION_FOUND};

/// Language editions queried for each name variant, in order.
/// Coverage differs per edition, which is why more than one is tried.
const LOCALES: [&str; 2] = ["en", "fr"];

/// Wikimedia requires a client-identifying User-Agent on API traffic
const USER_AGENT: &str = "MyBloomApp/1.0 (contact: support@mybloom.example)";

/// Summary pages for missing articles sometimes come back 200 with this
/// boilerplate as the extract; it means "no content" and must be skipped.
const UNAVAILABLE_SENTINEL: &str = "Other reasons this message may be displayed:";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Encyclopedia description provider backed by the Wikipedia REST API.
///
/// Encyclopedia coverage is inconsistent across scientific vs. common names
/// and across language editions, so each lookup walks an ordered list of
/// name variants against each locale and accepts the first usable extract.
pub struct WikipediaProvider {
    client: Client,
    base_url_template: String,
}

impl WikipediaProvider {
    pub fn new() -> Result<Self, String> {
        Self::new_with_template("https://{locale}.wikipedia.org".to_string())
    }

    /// Construct against a custom host template (used by tests against a
    /// local server). The template must contain a "{locale}" placeholder.
    pub fn new_with_template(base_url_template: String) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url_template,
        })
    }

    async fn fetch_extract(&self, locale: &str, title: &str) -> Option<String> {
        let base = self.base_url_template.replace("{locale}", locale);
        let url = format!("{}/api/rest_v1/page/summary/{}", base, title);

        // Failures at this boundary are recovered locally: log and move on
        // to the next variant/locale pair.
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Enrichment/Wikipedia: {} failed: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            eprintln!("Enrichment/Wikipedia: {} returned {}", url, response.status());
            return None;
        }

        let summary: SummaryResponse = match response.json().await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Enrichment/Wikipedia: Failed to parse summary from {}: {}", url, e);
                return None;
            }
        };

        usable_extract(summary.extract)
    }
}

// ── Wikipedia REST API response shape ──

#[derive(Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    extract: String,
}

/// An extract is usable if it is non-empty and not the "content unavailable"
/// boilerplate.
fn usable_extract(extract: String) -> Option<String> {
    if extract.is_empty() || extract.eq_ignore_ascii_case(UNAVAILABLE_SENTINEL) {
        None
    } else {
        Some(extract)
    }
}

/// Build the ordered list of page titles to try: the scientific name in
/// joined ("_") and verbatim forms first, then each non-blank common name in
/// both forms, de-duplicated preserving first occurrence.
fn name_variants(scientific_name: &str, common_names: &[String]) -> Vec<String> {
    let mut variants = vec![
        scientific_name.replace(' ', "_"),
        scientific_name.to_string(),
    ];
    for name in common_names {
        if name.trim().is_empty() {
            continue;
        }
        variants.push(name.replace(' ', "_"));
        variants.push(name.to_string());
    }

    let mut deduped: Vec<String> = Vec::with_capacity(variants.len());
    for v in variants {
        if !deduped.contains(&v) {
            deduped.push(v);
        }
    }
    deduped
}

#[async_trait]
impl DescriptionProvider for WikipediaProvider {
    fn name(&self) -> &str {
        "wikipedia"
    }

    async fn describe(&self, scientific_name: &str, common_names: &[String]) -> String {
        for variant in name_variants(scientific_name, common_names) {
            for locale in LOCALES {
                if let Some(extract) = self.fetch_extract(locale, &variant).await {
                    eprintln!(
                        "Enrichment/Wikipedia: Found description for \"{}\" ({})",
                        variant, locale
                    );
                    return extract;
                }
            }
        }

        eprintln!(
            "Enrichment/Wikipedia: No description found for \"{}\"",
            scientific_name
        );
        NO_DESCRIPTION_FOUND.to_string()
    }
}
