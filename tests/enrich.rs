use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use protmap::accession::DatabaseTag;
use protmap::details::{ProteinDetailClient, ProteinDetails};
use protmap::enrich::ProteinEnrichmentService;
use protmap::error::ProtmapError;
use protmap::index::{CatalogRepository, CatalogSearchService, IndexWriteService, PingStatus};
use protmap::ipi::IpiLookupTable;
use protmap::mapping::MappingClient;
use protmap::record::ProteinRecord;
use protmap::resolver::MappingResolver;

/// A stable fake of the remote mapping service: UniProt accessions map to
/// themselves, one known Ensembl and one known RefSeq mapping exist.
#[derive(Clone, Copy)]
struct StableMappingService;

impl MappingClient for StableMappingService {
    fn fetch_mappings(
        &self,
        _from: DatabaseTag,
        to: DatabaseTag,
        accessions: &BTreeSet<String>,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let mut result = BTreeMap::new();
        for accession in accessions {
            let mapped: Vec<&str> = match to {
                DatabaseTag::UniprotAcc => vec![accession.as_str()],
                DatabaseTag::EnsemblProtein if accession == "P12345" => vec!["ENSP00000263100"],
                DatabaseTag::RefseqProtein if accession == "P12345" => vec!["NP_001091"],
                _ => Vec::new(),
            };
            if !mapped.is_empty() {
                result.insert(
                    accession.clone(),
                    mapped.iter().map(|m| m.to_string()).collect(),
                );
            }
        }
        result
    }
}

#[derive(Clone, Default)]
struct StubDetailClient {
    details: BTreeMap<String, ProteinDetails>,
    fail: bool,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl ProteinDetailClient for StubDetailClient {
    fn fetch_details(
        &self,
        accessions: &[String],
    ) -> Result<BTreeMap<String, ProteinDetails>, ProtmapError> {
        self.calls.lock().unwrap().push(accessions.len());
        if self.fail {
            return Err(ProtmapError::DetailHttp("service down".to_string()));
        }
        Ok(accessions
            .iter()
            .filter_map(|accession| {
                self.details
                    .get(accession)
                    .map(|details| (accession.clone(), details.clone()))
            })
            .collect())
    }
}

/// Catalog kept in a shared map, with a save-call counter.
#[derive(Clone, Default)]
struct InMemoryRepository {
    records: Arc<Mutex<BTreeMap<String, ProteinRecord>>>,
    save_calls: Arc<Mutex<usize>>,
}

impl InMemoryRepository {
    fn seeded(accessions: &[&str]) -> Self {
        let repository = Self::default();
        {
            let mut records = repository.records.lock().unwrap();
            for accession in accessions {
                records.insert(accession.to_string(), ProteinRecord::new(*accession));
            }
        }
        repository
    }

    fn snapshot(&self) -> BTreeMap<String, ProteinRecord> {
        self.records.lock().unwrap().clone()
    }

    fn save_calls(&self) -> usize {
        *self.save_calls.lock().unwrap()
    }
}

impl CatalogRepository for InMemoryRepository {
    fn ping(&self) -> PingStatus {
        PingStatus {
            ok: true,
            elapsed: Duration::from_millis(1),
        }
    }

    fn save_all(&self, records: &[ProteinRecord]) -> Result<(), ProtmapError> {
        *self.save_calls.lock().unwrap() += 1;
        let mut stored = self.records.lock().unwrap();
        for record in records {
            stored.insert(record.accession.clone(), record.clone());
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<(), ProtmapError> {
        self.records.lock().unwrap().clear();
        Ok(())
    }

    fn delete(&self, accession: &str) -> Result<(), ProtmapError> {
        self.records.lock().unwrap().remove(accession);
        Ok(())
    }

    fn find_by_accession(&self, accession: &str) -> Result<Vec<ProteinRecord>, ProtmapError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(accession)
            .cloned()
            .into_iter()
            .collect())
    }

    fn find_by_uniprot_mapping(&self, mapping: &str) -> Result<Vec<ProteinRecord>, ProtmapError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.uniprot_mapping.as_deref() == Some(mapping))
            .cloned()
            .collect())
    }

    fn find_by_ensembl_mapping(&self, mapping: &str) -> Result<Vec<ProteinRecord>, ProtmapError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.ensembl_mapping.as_deref() == Some(mapping))
            .cloned()
            .collect())
    }

    fn find_by_other_mapping(&self, mapping: &str) -> Result<Vec<ProteinRecord>, ProtmapError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.other_mappings.contains(mapping))
            .cloned()
            .collect())
    }

    fn find_all(
        &self,
        page_number: usize,
        page_size: usize,
    ) -> Result<Vec<ProteinRecord>, ProtmapError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .skip(page_number * page_size)
            .take(page_size)
            .cloned()
            .collect())
    }
}

fn service(
    repository: InMemoryRepository,
    details: StubDetailClient,
) -> ProteinEnrichmentService<StableMappingService, StubDetailClient, InMemoryRepository> {
    let resolver = MappingResolver::new(StableMappingService, IpiLookupTable::empty());
    let search = CatalogSearchService::new(repository.clone());
    let index = IndexWriteService::new(repository);
    ProteinEnrichmentService::new(resolver, details, search, index)
}

#[test]
fn enrich_mappings_applies_all_three_kinds_in_one_save() {
    let repository = InMemoryRepository::seeded(&["P12345", "garbage-accession"]);
    let service = service(repository.clone(), StubDetailClient::default());

    let mut records: Vec<ProteinRecord> = repository.snapshot().into_values().collect();
    assert!(service.enrich_mappings(&mut records));

    let stored = repository.snapshot();
    let enriched = &stored["P12345"];
    assert_eq!(enriched.uniprot_mapping.as_deref(), Some("P12345"));
    assert_eq!(enriched.ensembl_mapping.as_deref(), Some("ENSP00000263100"));
    assert_eq!(
        enriched.other_mappings,
        BTreeSet::from(["NP_001091".to_string()])
    );

    // the unresolvable record is still written, with an empty mapping set
    let dropped = &stored["garbage-accession"];
    assert_eq!(dropped.uniprot_mapping, None);
    assert!(dropped.other_mappings.is_empty());

    assert_eq!(repository.save_calls(), 1);
}

#[test]
fn enrich_mappings_twice_persists_identical_state() {
    let repository = InMemoryRepository::seeded(&["P12345", "Q99999"]);
    let service = service(repository.clone(), StubDetailClient::default());

    let mut records: Vec<ProteinRecord> = repository.snapshot().into_values().collect();
    assert!(service.enrich_mappings(&mut records));
    let after_first = repository.snapshot();

    let mut records: Vec<ProteinRecord> = repository.snapshot().into_values().collect();
    assert!(service.enrich_mappings(&mut records));
    let after_second = repository.snapshot();

    assert_eq!(after_first, after_second);
}

#[test]
fn enrich_details_persists_only_the_filtered_subset() {
    let repository = InMemoryRepository::seeded(&["P12345"]);
    {
        let mut complete = ProteinRecord::new("Q99999");
        complete.name = Some("known".to_string());
        complete.description = Some("known".to_string());
        complete.inferred_sequence = Some("MK".to_string());
        repository
            .save_all(std::slice::from_ref(&complete))
            .unwrap();
    }
    let details = StubDetailClient {
        details: BTreeMap::from([(
            "P12345".to_string(),
            ProteinDetails {
                name: Some("Serum albumin".to_string()),
                description: Some("Binds water and ions.".to_string()),
                sequence: Some("MKWVTFISLL".to_string()),
            },
        )]),
        ..StubDetailClient::default()
    };
    let calls = details.calls.clone();
    let save_counter = repository.clone();
    let service = service(repository.clone(), details);

    let before_saves = save_counter.save_calls();
    let records: Vec<ProteinRecord> = repository.snapshot().into_values().collect();
    assert!(service.enrich_details(&records));

    // one detail batch for the single incomplete record
    assert_eq!(calls.lock().unwrap().as_slice(), &[1]);
    assert_eq!(save_counter.save_calls(), before_saves + 1);

    let stored = repository.snapshot();
    assert_eq!(stored["P12345"].name.as_deref(), Some("Serum albumin"));
    assert_eq!(stored["P12345"].inferred_sequence.as_deref(), Some("MKWVTFISLL"));
    assert_eq!(stored["Q99999"].name.as_deref(), Some("known"));
}

#[test]
fn detail_fetch_failure_ends_the_batch_without_persisting() {
    let repository = InMemoryRepository::seeded(&["P12345"]);
    let details = StubDetailClient {
        fail: true,
        ..StubDetailClient::default()
    };
    let service = service(repository.clone(), details);

    let records: Vec<ProteinRecord> = repository.snapshot().into_values().collect();
    assert!(!service.enrich_details(&records));
    assert_eq!(repository.save_calls(), 0);
}

#[test]
fn paginated_runs_visit_every_page_until_empty() {
    let accessions: Vec<String> = (0..5).map(|i| format!("P0000{i}")).collect();
    let names: Vec<&str> = accessions.iter().map(|a| a.as_str()).collect();
    let repository = InMemoryRepository::seeded(&names);
    let service = service(repository.clone(), StubDetailClient::default()).with_page_size(2);

    let summary = service.enrich_mappings_for_all();

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.records_updated, 5);
    assert_eq!(summary.pages_failed, 0);
    let stored = repository.snapshot();
    assert!(stored.values().all(|record| record.uniprot_mapping.is_some()));
}

#[test]
fn incremental_mode_skips_already_mapped_records() {
    let repository = InMemoryRepository::seeded(&["P12345"]);
    {
        let mut mapped = ProteinRecord::new("Q99999");
        mapped.uniprot_mapping = Some("PRESEEDED".to_string());
        repository.save_all(std::slice::from_ref(&mapped)).unwrap();
    }
    let service = service(repository.clone(), StubDetailClient::default());

    let summary = service.enrich_mappings_for_missing();

    assert_eq!(summary.records_updated, 1);
    let stored = repository.snapshot();
    // a record that already had a mapping keeps it untouched in inc mode
    assert_eq!(stored["Q99999"].uniprot_mapping.as_deref(), Some("PRESEEDED"));
    assert_eq!(stored["P12345"].uniprot_mapping.as_deref(), Some("P12345"));
}
