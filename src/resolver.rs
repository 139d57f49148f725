use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::accession::{DatabaseTag, group_by_database};
use crate::ipi::IpiLookupTable;
use crate::mapping::MappingClient;

const NULL_ACCESSION_TAG: &str = "null";

/// Target databases queried by [`MappingResolver::resolve_to_others`].
/// Ensembl has its own dedicated record field and UniProt-to-UniProt adds
/// nothing, so neither belongs here.
const OTHER_TARGET_DBS: [DatabaseTag; 3] = [
    DatabaseTag::RefseqProtein,
    DatabaseTag::Uniparc,
    DatabaseTag::GiNumber,
];

/// Resolves heterogeneous accession batches to cross-database mappings.
///
/// Every resolution goes through UniProt: source accessions are classified,
/// grouped by database, mapped to UniProt (IPI through the local lookup
/// table, everything else through the remote service), and then optionally
/// chained one more hop to a target database. Collisions are settled with a
/// keep-first policy where the kept value is the lexicographically smallest
/// candidate, so repeated runs against a stable service agree.
///
/// Accessions that cannot be classified or mapped are silently absent from
/// the results; callers treat a missing key as "no mapping found".
pub struct MappingResolver<C: MappingClient> {
    client: C,
    ipi: IpiLookupTable,
}

impl<C: MappingClient> MappingResolver<C> {
    pub fn new(client: C, ipi: IpiLookupTable) -> Self {
        Self { client, ipi }
    }

    /// One chosen UniProt accession per resolvable input accession.
    pub fn resolve_to_uniprot(&self, accessions: &BTreeSet<String>) -> BTreeMap<String, String> {
        let mut result = BTreeMap::new();
        let mut grouped = group_by_database(accessions);

        // IPI comes from the local table and never goes through the service
        if let Some(ipi_group) = grouped.remove(&DatabaseTag::Ipi) {
            let mut total_mappings = 0;
            for ipi_accession in &ipi_group {
                let mapped = self.ipi.lookup(ipi_accession);
                total_mappings += mapped.len();
                if let Some(first) = mapped.first() {
                    result
                        .entry(ipi_accession.clone())
                        .or_insert_with(|| first.clone());
                }
            }
            debug!(
                "found {total_mappings} UniProt mappings for {} IPI accessions",
                ipi_group.len()
            );
        }

        for (db, group) in &grouped {
            let mappings = self
                .client
                .fetch_mappings(*db, DatabaseTag::UniprotAcc, group);
            merge_keep_first(&mut result, &mappings);
        }

        result
    }

    /// One chosen Ensembl protein accession per input accession, chained
    /// through the UniProt mapping.
    pub fn resolve_to_ensembl(&self, accessions: &BTreeSet<String>) -> BTreeMap<String, String> {
        let to_uniprot = self.resolve_to_uniprot(accessions);
        if to_uniprot.is_empty() {
            return BTreeMap::new();
        }

        let uniprot_accessions: BTreeSet<String> = to_uniprot.values().cloned().collect();
        let uniprot_to_ensembl = self.client.fetch_mappings(
            DatabaseTag::UniprotAcc,
            DatabaseTag::EnsemblProtein,
            &uniprot_accessions,
        );
        merge_transitively_first(&to_uniprot, &uniprot_to_ensembl)
    }

    /// All RefSeq, UniParc and GI accessions reachable from each input
    /// accession through its UniProt mapping, unioned into one set.
    pub fn resolve_to_others(
        &self,
        accessions: &BTreeSet<String>,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let to_uniprot = self.resolve_to_uniprot(accessions);
        if to_uniprot.is_empty() {
            return BTreeMap::new();
        }

        let uniprot_accessions: BTreeSet<String> = to_uniprot.values().cloned().collect();
        let mut from_uniprot = BTreeMap::new();
        for target in OTHER_TARGET_DBS {
            let mappings =
                self.client
                    .fetch_mappings(DatabaseTag::UniprotAcc, target, &uniprot_accessions);
            merge_union(&mut from_uniprot, &mappings);
        }

        merge_transitively(&to_uniprot, &from_uniprot)
    }
}

/// Keep-first merge: a key already present in the target is never
/// overwritten, the `null` pseudo-accession is excluded, and the value chosen
/// from a candidate set is its smallest member.
fn merge_keep_first(
    target: &mut BTreeMap<String, String>,
    source: &BTreeMap<String, BTreeSet<String>>,
) {
    for (accession, candidates) in source {
        if accession == NULL_ACCESSION_TAG {
            continue;
        }
        if let Some(first) = candidates.first() {
            target
                .entry(accession.clone())
                .or_insert_with(|| first.clone());
        }
    }
}

/// Set-union merge of per-accession candidate sets, excluding the `null`
/// pseudo-accession key.
fn merge_union(
    target: &mut BTreeMap<String, BTreeSet<String>>,
    source: &BTreeMap<String, BTreeSet<String>>,
) {
    for (accession, candidates) in source {
        if accession == NULL_ACCESSION_TAG {
            continue;
        }
        target
            .entry(accession.clone())
            .or_default()
            .extend(candidates.iter().cloned());
    }
}

/// Two-hop join keeping one value: `a -> u` and `u -> {e...}` become
/// `a -> min(e...)`. Inputs without a second hop are omitted.
fn merge_transitively_first(
    from_map: &BTreeMap<String, String>,
    to_map: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for (from_accession, step_accession) in from_map {
        if step_accession == NULL_ACCESSION_TAG {
            continue;
        }
        if let Some(first) = to_map.get(step_accession).and_then(|set| set.first()) {
            result.insert(from_accession.clone(), first.clone());
        }
    }
    result
}

/// Two-hop join keeping the whole candidate set per input accession.
fn merge_transitively(
    from_map: &BTreeMap<String, String>,
    to_map: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut result = BTreeMap::new();
    for (from_accession, step_accession) in from_map {
        if step_accession == NULL_ACCESSION_TAG {
            continue;
        }
        if let Some(candidates) = to_map.get(step_accession) {
            result.insert(from_accession.clone(), candidates.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn keep_first_never_overwrites() {
        let mut target = BTreeMap::new();
        target.insert("A".to_string(), "U1".to_string());
        let mut source = BTreeMap::new();
        source.insert("A".to_string(), set(&["U2"]));
        source.insert("B".to_string(), set(&["U3", "U2"]));
        merge_keep_first(&mut target, &source);
        assert_eq!(target["A"], "U1");
        assert_eq!(target["B"], "U2");
    }

    #[test]
    fn keep_first_skips_null_key() {
        let mut target = BTreeMap::new();
        let mut source = BTreeMap::new();
        source.insert("null".to_string(), set(&["U1"]));
        merge_keep_first(&mut target, &source);
        assert!(target.is_empty());
    }

    #[test]
    fn transitive_merge_drops_unchained_accessions() {
        let mut from_map = BTreeMap::new();
        from_map.insert("A".to_string(), "U1".to_string());
        from_map.insert("B".to_string(), "U2".to_string());
        let mut to_map = BTreeMap::new();
        to_map.insert("U1".to_string(), set(&["E2", "E1"]));

        let first = merge_transitively_first(&from_map, &to_map);
        assert_eq!(first.len(), 1);
        assert_eq!(first["A"], "E1");

        let full = merge_transitively(&from_map, &to_map);
        assert_eq!(full.len(), 1);
        assert_eq!(full["A"], set(&["E1", "E2"]));
    }
}
