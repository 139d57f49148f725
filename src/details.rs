use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::warn;

use crate::error::ProtmapError;

/// Descriptive metadata fetched for one accession.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProteinDetails {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sequence: Option<String>,
}

/// Boundary to the protein-details source. Takes a batch of accessions and
/// returns details for the subset it could resolve; an `Err` means the whole
/// batch failed and nothing useful was fetched.
pub trait ProteinDetailClient {
    fn fetch_details(
        &self,
        accessions: &[String],
    ) -> Result<BTreeMap<String, ProteinDetails>, ProtmapError>;
}

pub struct UniprotDetailHttpClient {
    client: Client,
    base_url: String,
}

pub const DEFAULT_DETAIL_SERVICE_URL: &str = "https://rest.uniprot.org";

impl UniprotDetailHttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProtmapError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("protmap/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ProtmapError::DetailHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ProtmapError::DetailHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn send_with_retries(&self, url: &str) -> Result<reqwest::blocking::Response, ProtmapError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = self.client.get(url).send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(ProtmapError::DetailHttp(err.to_string()));
                }
            }
        }
    }

    fn entry_url(&self, accession: &str) -> String {
        format!("{}/uniprotkb/{accession}.json", self.base_url)
    }
}

impl ProteinDetailClient for UniprotDetailHttpClient {
    fn fetch_details(
        &self,
        accessions: &[String],
    ) -> Result<BTreeMap<String, ProteinDetails>, ProtmapError> {
        let mut details = BTreeMap::new();
        for accession in accessions {
            let response = self.send_with_retries(&self.entry_url(accession))?;
            let status = response.status();
            if status.is_server_error() {
                let message = response
                    .text()
                    .unwrap_or_else(|_| "detail request failed".to_string());
                return Err(ProtmapError::DetailStatus {
                    status: status.as_u16(),
                    message,
                });
            }
            if !status.is_success() {
                // unknown accessions are expected, the rest of the batch goes on
                warn!(
                    "detail service returned status {} for accession {accession}",
                    status.as_u16()
                );
                continue;
            }
            let raw: Value = response
                .json()
                .map_err(|err| ProtmapError::DetailHttp(err.to_string()))?;
            details.insert(accession.clone(), extract_details(&raw));
        }
        Ok(details)
    }
}

pub fn extract_details(raw: &Value) -> ProteinDetails {
    let name = raw
        .get("proteinDescription")
        .and_then(|v| v.get("recommendedName"))
        .and_then(|v| v.get("fullName"))
        .and_then(|v| v.get("value"))
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .or_else(|| {
            raw.get("proteinDescription")
                .and_then(|v| v.get("submissionNames"))
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.first())
                .and_then(|v| v.get("fullName"))
                .and_then(|v| v.get("value"))
                .and_then(|v| v.as_str())
                .map(|v| v.to_string())
        });

    let mut description = None;
    if let Some(comments) = raw.get("comments").and_then(|v| v.as_array()) {
        for comment in comments {
            if comment.get("commentType").and_then(|v| v.as_str()) == Some("FUNCTION") {
                description = comment
                    .get("texts")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|v| v.get("value"))
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string());
                break;
            }
        }
    }

    let sequence = raw
        .get("sequence")
        .and_then(|v| v.get("value"))
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());

    ProteinDetails {
        name,
        description,
        sequence,
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_details_from_entry_json() {
        let raw: Value = serde_json::from_str(
            r#"{
                "primaryAccession": "P12345",
                "proteinDescription": {
                    "recommendedName": { "fullName": { "value": "Serum albumin" } }
                },
                "comments": [
                    { "commentType": "FUNCTION",
                      "texts": [ { "value": "Binds water and ions." } ] }
                ],
                "sequence": { "value": "MKWVTFISLL" }
            }"#,
        )
        .unwrap();

        let details = extract_details(&raw);
        assert_eq!(details.name.as_deref(), Some("Serum albumin"));
        assert_eq!(details.description.as_deref(), Some("Binds water and ions."));
        assert_eq!(details.sequence.as_deref(), Some("MKWVTFISLL"));
    }

    #[test]
    fn extract_details_tolerates_sparse_entries() {
        let raw: Value = serde_json::from_str(r#"{ "primaryAccession": "P12345" }"#).unwrap();
        let details = extract_details(&raw);
        assert_eq!(details, ProteinDetails::default());
    }
}
