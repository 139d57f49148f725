use std::collections::{BTreeMap, BTreeSet};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, error};

use crate::accession::DatabaseTag;
use crate::error::ProtmapError;

pub const DEFAULT_MAPPING_SERVICE_URL: &str = "https://www.uniprot.org";

/// Hard upper bound on accessions per outbound request; the service truncates
/// longer queries.
pub const MAX_ACCESSIONS_PER_REQUEST: usize = 100;

const MAX_REQUEST_TRIES: usize = 5;
const WAIT_BEFORE_NEW_TRY: Duration = Duration::from_secs(1);

const MAPPING_TOOL: &str = "mapping";
const TAB_FORMAT: &str = "tab";
const FROM_HEADER_TAG: &str = "From";
const NULL_ACCESSION_TAG: &str = "null";

/// One batch request to the mapping service, already in wire terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingQuery {
    pub from: &'static str,
    pub to: &'static str,
    /// Space-joined accessions, at most [`MAX_ACCESSIONS_PER_REQUEST`] of them.
    pub query: String,
}

/// Transport seam under the batching client: one idempotent GET per batch,
/// returning the tab-format body. `None` models an empty response body, which
/// the service uses for "no mappings at all".
pub trait MappingTransport {
    fn fetch_tab(&self, query: &MappingQuery) -> Result<Option<String>, ProtmapError>;
}

pub struct HttpMappingTransport {
    client: Client,
    base_url: String,
}

impl HttpMappingTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProtmapError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("protmap/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ProtmapError::MappingHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ProtmapError::MappingHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl MappingTransport for HttpMappingTransport {
    fn fetch_tab(&self, query: &MappingQuery) -> Result<Option<String>, ProtmapError> {
        let url = format!("{}/{}", self.base_url, MAPPING_TOOL);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("from", query.from),
                ("to", query.to),
                ("format", TAB_FORMAT),
                ("query", query.query.as_str()),
            ])
            .send()
            .map_err(|err| ProtmapError::MappingHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "mapping request failed".to_string());
            return Err(ProtmapError::MappingStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| ProtmapError::MappingHttp(err.to_string()))?;
        if body.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(body))
        }
    }
}

/// Batch lookups against the remote accession-mapping service.
pub trait MappingClient {
    /// Maps each accession to its mapped accessions in `to`. Accessions the
    /// service knows nothing about are absent from the result; a failed batch
    /// only degrades coverage, it never fails the call.
    fn fetch_mappings(
        &self,
        from: DatabaseTag,
        to: DatabaseTag,
        accessions: &BTreeSet<String>,
    ) -> BTreeMap<String, BTreeSet<String>>;
}

/// Splits requests into bounded batches and retries each batch independently,
/// so one bad batch cannot take down a whole resolution cycle.
pub struct MappingServiceClient<T: MappingTransport> {
    transport: T,
}

impl<T: MappingTransport> MappingServiceClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    fn fetch_batch(&self, query: &MappingQuery, result: &mut BTreeMap<String, BTreeSet<String>>) {
        let mut tries = 0;
        while tries < MAX_REQUEST_TRIES {
            match self.transport.fetch_tab(query) {
                Ok(Some(body)) => {
                    parse_tab_response(&body, result);
                    return;
                }
                Ok(None) => {
                    debug!(
                        "empty response from mapping service for query {} from {} to {}",
                        query.query, query.from, query.to
                    );
                    return;
                }
                Err(err) => {
                    error!(
                        "try {tries}: mapping request from {} to {} failed: {err}",
                        query.from, query.to
                    );
                    tries += 1;
                    if tries < MAX_REQUEST_TRIES {
                        thread::sleep(WAIT_BEFORE_NEW_TRY);
                    }
                }
            }
        }
        error!(
            "giving up on a batch of {} accessions from {} to {} after {MAX_REQUEST_TRIES} tries",
            query.query.split_whitespace().count(),
            query.from,
            query.to
        );
    }
}

impl<T: MappingTransport> MappingClient for MappingServiceClient<T> {
    fn fetch_mappings(
        &self,
        from: DatabaseTag,
        to: DatabaseTag,
        accessions: &BTreeSet<String>,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let mut result = BTreeMap::new();
        if accessions.is_empty() {
            return result;
        }

        let ordered: Vec<&String> = accessions.iter().collect();
        for batch in ordered.chunks(MAX_ACCESSIONS_PER_REQUEST) {
            let query = MappingQuery {
                from: from.service_tag(),
                to: to.service_tag(),
                query: batch
                    .iter()
                    .map(|accession| accession.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            };
            debug!(
                "querying {} accessions (of {}) from {from} to {to}",
                batch.len(),
                accessions.len()
            );
            self.fetch_batch(&query, &mut result);
        }

        debug!(
            "found {} mapped accessions for {} accessions from {from} to {to}",
            result.len(),
            accessions.len()
        );
        result
    }
}

/// Parses a tab-format response body: an optional `From ...` header line,
/// then one `accession<TAB>mapping` pair per line. The literal mapping value
/// `null` is the service's "no result" marker and is discarded.
fn parse_tab_response(body: &str, result: &mut BTreeMap<String, BTreeSet<String>>) {
    for (index, line) in body.lines().enumerate() {
        if index == 0 && line.starts_with(FROM_HEADER_TAG) {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(accession), Some(mapping)) = (fields.next(), fields.next()) else {
            continue;
        };
        if mapping == NULL_ACCESSION_TAG {
            continue;
        }
        result
            .entry(accession.to_string())
            .or_default()
            .insert(mapping.to_string());
    }
}
