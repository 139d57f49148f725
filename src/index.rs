use std::thread;
use std::time::Duration;

use tracing::error;

use crate::error::ProtmapError;
use crate::record::{ProteinRecord, sanitize_accession};

/// Outcome of a repository health check, modeled on a search-server ping.
#[derive(Debug, Clone, Copy)]
pub struct PingStatus {
    pub ok: bool,
    pub elapsed: Duration,
}

/// Narrow boundary to the search index holding the protein catalog. The
/// shipped implementation is a local document store ([`crate::store`]); a
/// remote search engine drops in behind the same trait.
pub trait CatalogRepository {
    fn ping(&self) -> PingStatus;
    fn save_all(&self, records: &[ProteinRecord]) -> Result<(), ProtmapError>;
    fn delete_all(&self) -> Result<(), ProtmapError>;
    fn delete(&self, accession: &str) -> Result<(), ProtmapError>;
    fn find_by_accession(&self, accession: &str) -> Result<Vec<ProteinRecord>, ProtmapError>;
    fn find_by_uniprot_mapping(&self, mapping: &str) -> Result<Vec<ProteinRecord>, ProtmapError>;
    fn find_by_ensembl_mapping(&self, mapping: &str) -> Result<Vec<ProteinRecord>, ProtmapError>;
    fn find_by_other_mapping(&self, mapping: &str) -> Result<Vec<ProteinRecord>, ProtmapError>;
    /// Page `page_number` (zero-based) of `page_size` records in stable
    /// accession order; an empty page means the catalog is exhausted.
    fn find_all(
        &self,
        page_number: usize,
        page_size: usize,
    ) -> Result<Vec<ProteinRecord>, ProtmapError>;
}

/// Read-side queries. Accession terms are sanitized before reaching the
/// repository because `[`, `]` and `:` are reserved in the index query
/// syntax.
pub struct CatalogSearchService<R: CatalogRepository> {
    repository: R,
}

impl<R: CatalogRepository> CatalogSearchService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn find_by_accession(&self, accession: &str) -> Result<Vec<ProteinRecord>, ProtmapError> {
        self.repository
            .find_by_accession(&sanitize_accession(accession))
    }

    pub fn find_by_accessions(
        &self,
        accessions: &[String],
    ) -> Result<Vec<ProteinRecord>, ProtmapError> {
        let mut found = Vec::new();
        for accession in accessions {
            found.extend(self.find_by_accession(accession)?);
        }
        Ok(found)
    }

    pub fn find_by_uniprot_mapping(
        &self,
        mapping: &str,
    ) -> Result<Vec<ProteinRecord>, ProtmapError> {
        self.repository.find_by_uniprot_mapping(mapping)
    }

    pub fn find_by_ensembl_mapping(
        &self,
        mapping: &str,
    ) -> Result<Vec<ProteinRecord>, ProtmapError> {
        self.repository.find_by_ensembl_mapping(mapping)
    }

    pub fn find_by_other_mapping(&self, mapping: &str) -> Result<Vec<ProteinRecord>, ProtmapError> {
        self.repository.find_by_other_mapping(mapping)
    }

    pub fn find_all(
        &self,
        page_number: usize,
        page_size: usize,
    ) -> Result<Vec<ProteinRecord>, ProtmapError> {
        self.repository.find_all(page_number, page_size)
    }
}

const NUM_SAVE_TRIES: usize = 10;
const WAIT_BETWEEN_SAVE_TRIES: Duration = Duration::from_secs(30);
const MAX_PING_ELAPSED: Duration = Duration::from_secs(10);

/// Reliable-save wrapper: each save is gated on a health check and retried
/// with a fixed pause. Exhausted retries surface as `false`, never as an
/// error, so callers log and move on.
pub struct IndexWriteService<R: CatalogRepository> {
    repository: R,
    num_tries: usize,
    wait_between_tries: Duration,
}

impl<R: CatalogRepository> IndexWriteService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            num_tries: NUM_SAVE_TRIES,
            wait_between_tries: WAIT_BETWEEN_SAVE_TRIES,
        }
    }

    /// Same service with a custom retry cap and pause.
    pub fn with_retry_policy(repository: R, num_tries: usize, wait_between_tries: Duration) -> Self {
        Self {
            repository,
            num_tries,
            wait_between_tries,
        }
    }

    pub fn save(&self, record: &ProteinRecord) -> bool {
        self.save_all(std::slice::from_ref(record))
    }

    pub fn save_all(&self, records: &[ProteinRecord]) -> bool {
        if records.is_empty() {
            error!("reliable-save: trying to save an empty record list");
            return false;
        }

        let mut tries = 0;
        while tries < self.num_tries {
            let ping = self.repository.ping();
            if ping.ok && ping.elapsed < MAX_PING_ELAPSED {
                match self.repository.save_all(records) {
                    Ok(()) => return true,
                    Err(err) => error!("[try {tries}] catalog index save failed: {err}"),
                }
            } else {
                error!(
                    "[try {tries}] catalog index too busy (ping ok: {}, elapsed: {:?})",
                    ping.ok, ping.elapsed
                );
            }
            tries += 1;
            if tries < self.num_tries {
                error!("re-trying in {:?}...", self.wait_between_tries);
                thread::sleep(self.wait_between_tries);
            }
        }

        false
    }

    pub fn delete_all(&self) -> Result<(), ProtmapError> {
        self.repository.delete_all()
    }

    pub fn delete(&self, accession: &str) -> Result<(), ProtmapError> {
        self.repository.delete(accession)
    }
}
