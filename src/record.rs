use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A protein-identification record as persisted in the catalog index.
///
/// The accession is the primary key and never changes once the record is
/// created. Mapping fields are replaced wholesale by each enrichment pass;
/// `other_mappings` is always written as a set, never left null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProteinRecord {
    pub accession: String,
    #[serde(default)]
    pub uniprot_mapping: Option<String>,
    #[serde(default)]
    pub ensembl_mapping: Option<String>,
    #[serde(default)]
    pub other_mappings: BTreeSet<String>,
    #[serde(default)]
    pub inferred_sequence: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProteinRecord {
    pub fn new(accession: impl Into<String>) -> Self {
        Self {
            accession: accession.into(),
            uniprot_mapping: None,
            ensembl_mapping: None,
            other_mappings: BTreeSet::new(),
            inferred_sequence: None,
            name: None,
            description: None,
        }
    }

    /// True when no enrichment pass has attached any cross-database mapping.
    pub fn needs_mappings(&self) -> bool {
        self.uniprot_mapping.is_none()
            && self.ensembl_mapping.is_none()
            && self.other_mappings.is_empty()
    }

    /// True when name, description, or inferred sequence is still missing.
    pub fn needs_details(&self) -> bool {
        self.name.is_none() || self.description.is_none() || self.inferred_sequence.is_none()
    }
}

/// Accessions can contain characters that are reserved in the index query
/// syntax (`[`, `]`, `:`); they are replaced with `_` before being used as
/// query terms or document keys.
pub fn sanitize_accession(accession: &str) -> String {
    accession
        .chars()
        .map(|ch| match ch {
            '[' | ']' | ':' => '_',
            other => other,
        })
        .collect()
}
