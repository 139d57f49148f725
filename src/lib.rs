//! Cross-database accession mapping enrichment for a searchable protein
//! catalog: classify accessions by source database, resolve them to UniProt
//! and onward to Ensembl/RefSeq/UniParc/GI through a remote mapping service,
//! and write the enriched records back to the catalog index.

pub mod accession;
pub mod config;
pub mod details;
pub mod enrich;
pub mod error;
pub mod index;
pub mod ipi;
pub mod mapping;
pub mod record;
pub mod resolver;
pub mod store;
