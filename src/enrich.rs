use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::details::ProteinDetailClient;
use crate::index::{CatalogRepository, CatalogSearchService, IndexWriteService};
use crate::mapping::MappingClient;
use crate::record::ProteinRecord;
use crate::resolver::MappingResolver;

pub const CATALOG_PAGE_SIZE: usize = 1000;

/// Detail lookups go out in fixed chunks to keep individual requests small.
const DETAIL_FETCH_STEP: usize = 50;

/// Counters for one paginated enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    pub pages: usize,
    pub records_updated: usize,
    pub pages_failed: usize,
}

/// Drives enrichment over the persisted catalog: resolves cross-database
/// mappings and descriptive details for batches of records and writes them
/// back through the reliable-save service.
///
/// Pages are processed strictly sequentially. A failure only ends the page it
/// happened on; the pagination loop itself always runs to the end of the
/// catalog, so coverage is best-effort and re-runnable.
pub struct ProteinEnrichmentService<C, D, R>
where
    C: MappingClient,
    D: ProteinDetailClient,
    R: CatalogRepository,
{
    resolver: MappingResolver<C>,
    details: D,
    search: CatalogSearchService<R>,
    index: IndexWriteService<R>,
    page_size: usize,
}

impl<C, D, R> ProteinEnrichmentService<C, D, R>
where
    C: MappingClient,
    D: ProteinDetailClient,
    R: CatalogRepository,
{
    pub fn new(
        resolver: MappingResolver<C>,
        details: D,
        search: CatalogSearchService<R>,
        index: IndexWriteService<R>,
    ) -> Self {
        Self {
            resolver,
            details,
            search,
            index,
            page_size: CATALOG_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Resolves mappings for the distinct accessions across `records` in one
    /// classification cycle, applies all three mapping kinds, and persists
    /// the full batch with a single reliable save.
    pub fn enrich_mappings(&self, records: &mut [ProteinRecord]) -> bool {
        if records.is_empty() {
            return true;
        }

        let accessions: BTreeSet<String> = records
            .iter()
            .map(|record| record.accession.clone())
            .collect();
        let to_uniprot = self.resolver.resolve_to_uniprot(&accessions);
        let to_ensembl = self.resolver.resolve_to_ensembl(&accessions);
        let to_others = self.resolver.resolve_to_others(&accessions);

        for record in records.iter_mut() {
            if let Some(mapping) = to_uniprot.get(&record.accession) {
                record.uniprot_mapping = Some(mapping.clone());
            }
            if let Some(mapping) = to_ensembl.get(&record.accession) {
                record.ensembl_mapping = Some(mapping.clone());
            }
            // replaced wholesale; an absent resolution leaves an empty set,
            // never a null field
            record.other_mappings = to_others
                .get(&record.accession)
                .cloned()
                .unwrap_or_default();
            debug!(
                "protein {} mapped to uniprot {:?}, ensembl {:?}, {} others",
                record.accession,
                record.uniprot_mapping,
                record.ensembl_mapping,
                record.other_mappings.len()
            );
        }

        let saved = self.index.save_all(records);
        if !saved {
            error!("could not persist {} mapping-enriched records", records.len());
        }
        saved
    }

    /// Fetches details for the records still missing name, description, or
    /// sequence, and persists only that subset.
    pub fn enrich_details(&self, records: &[ProteinRecord]) -> bool {
        let missing: Vec<ProteinRecord> = records
            .iter()
            .filter(|record| record.needs_details())
            .cloned()
            .collect();
        if missing.is_empty() {
            debug!("no records in this batch are missing details");
            return true;
        }
        self.apply_details(missing)
    }

    fn apply_details(&self, mut records: Vec<ProteinRecord>) -> bool {
        if records.is_empty() {
            return true;
        }

        let accessions: Vec<String> = records
            .iter()
            .map(|record| record.accession.clone())
            .collect();

        let mut details = BTreeMap::new();
        let mut processed = 0;
        while processed < accessions.len() {
            let upper = usize::min(accessions.len(), processed + DETAIL_FETCH_STEP);
            match self.details.fetch_details(&accessions[processed..upper]) {
                Ok(fetched) => details.extend(fetched),
                Err(err) => {
                    error!(
                        "cannot retrieve protein details for {} accessions: {err}",
                        accessions.len()
                    );
                    return false;
                }
            }
            processed = upper;
            debug!(
                "processed {processed} of {} accessions, details for {} so far",
                accessions.len(),
                details.len()
            );
        }

        for record in records.iter_mut() {
            let Some(fetched) = details.get(&record.accession) else {
                debug!("no details found for protein {}", record.accession);
                continue;
            };
            if let Some(name) = &fetched.name {
                record.name = Some(name.clone());
            }
            if let Some(description) = &fetched.description {
                record.description = Some(description.clone());
            }
            if let Some(sequence) = &fetched.sequence {
                record.inferred_sequence = Some(sequence.clone());
            }
        }

        let saved = self.index.save_all(&records);
        if !saved {
            error!("could not persist {} detail-enriched records", records.len());
        }
        saved
    }

    /// Re-resolves mappings for every record in the catalog.
    pub fn enrich_mappings_for_all(&self) -> EnrichmentSummary {
        self.enrich_mappings_paginated(false)
    }

    /// Resolves mappings only for records that have none yet.
    pub fn enrich_mappings_for_missing(&self) -> EnrichmentSummary {
        self.enrich_mappings_paginated(true)
    }

    fn enrich_mappings_paginated(&self, missing_only: bool) -> EnrichmentSummary {
        let mut summary = EnrichmentSummary::default();
        let mut page_number = 0;
        loop {
            let Some(page) = self.next_page(page_number) else {
                break;
            };
            if page.is_empty() {
                break;
            }
            summary.pages += 1;
            info!(
                "processing {} proteins from catalog page {page_number}",
                page.len()
            );

            let mut batch: Vec<ProteinRecord> = if missing_only {
                page.into_iter()
                    .filter(|record| record.needs_mappings())
                    .collect()
            } else {
                page
            };
            if !batch.is_empty() {
                if self.enrich_mappings(&mut batch) {
                    summary.records_updated += batch.len();
                } else {
                    summary.pages_failed += 1;
                }
            }

            page_number += 1;
        }
        summary
    }

    /// Re-fetches details for every record in the catalog.
    pub fn enrich_details_for_all(&self) -> EnrichmentSummary {
        self.enrich_details_paginated(false)
    }

    /// Fetches details only for records missing name, description, or
    /// sequence.
    pub fn enrich_details_for_missing(&self) -> EnrichmentSummary {
        self.enrich_details_paginated(true)
    }

    fn enrich_details_paginated(&self, missing_only: bool) -> EnrichmentSummary {
        let mut summary = EnrichmentSummary::default();
        let mut page_number = 0;
        loop {
            let Some(page) = self.next_page(page_number) else {
                break;
            };
            if page.is_empty() {
                break;
            }
            summary.pages += 1;
            info!(
                "processing {} proteins from catalog page {page_number}",
                page.len()
            );

            let batch: Vec<ProteinRecord> = if missing_only {
                page.into_iter()
                    .filter(|record| record.needs_details())
                    .collect()
            } else {
                page
            };
            if !batch.is_empty() {
                let count = batch.len();
                if self.apply_details(batch) {
                    summary.records_updated += count;
                } else {
                    summary.pages_failed += 1;
                }
            }

            page_number += 1;
        }
        summary
    }

    fn next_page(&self, page_number: usize) -> Option<Vec<ProteinRecord>> {
        match self.search.find_all(page_number, self.page_size) {
            Ok(page) => Some(page),
            Err(err) => {
                error!("cannot read catalog page {page_number}: {err}");
                None
            }
        }
    }
}
