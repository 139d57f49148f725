use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

const GI_PREFIX: &str = "gi";

/// Source databases considered during mapping resolution.
///
/// The declaration order is the iteration order of grouped accessions during
/// resolution, which makes the keep-first merge deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatabaseTag {
    UniprotAcc,
    UniprotId,
    EnsemblProtein,
    RefseqProtein,
    Uniparc,
    GiNumber,
    Ipi,
}

impl DatabaseTag {
    /// The `from`/`to` parameter value understood by the mapping service.
    pub fn service_tag(&self) -> &'static str {
        match self {
            DatabaseTag::UniprotAcc => "ACC",
            DatabaseTag::UniprotId => "ID",
            DatabaseTag::EnsemblProtein => "ENSEMBL_PRO_ID",
            DatabaseTag::RefseqProtein => "P_REFSEQ_AC",
            DatabaseTag::Uniparc => "UPARC",
            DatabaseTag::GiNumber => "P_GI",
            DatabaseTag::Ipi => "IPI",
        }
    }
}

impl fmt::Display for DatabaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.service_tag())
    }
}

struct AccessionPatterns {
    ensembl_protein: Regex,
    refseq_protein: Regex,
    swissprot_acc: Regex,
    swissprot_name: Regex,
    uniparc: Regex,
    ipi: Regex,
}

fn patterns() -> &'static AccessionPatterns {
    static PATTERNS: OnceLock<AccessionPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| AccessionPatterns {
        ensembl_protein: Regex::new(r"^ENS[A-Z]*P\d{11}(\.\d+)?$").unwrap(),
        refseq_protein: Regex::new(r"^(AC|AP|NP|XP|YP|WP|ZP)_\d+(\.\d+)?$").unwrap(),
        swissprot_acc: Regex::new(
            r"^([OPQ][0-9][A-Z0-9]{3}[0-9]|[A-NR-Z][0-9]([A-Z][A-Z0-9]{2}[0-9]){1,2})([.-]\d+)?$",
        )
        .unwrap(),
        swissprot_name: Regex::new(r"^[A-Z0-9]{1,5}_[A-Z0-9]{1,5}$").unwrap(),
        uniparc: Regex::new(r"^UPI[0-9A-F]{10,13}$").unwrap(),
        ipi: Regex::new(r"^IPI\d{8}(\.\d+)?$").unwrap(),
    })
}

/// Finds the source database for a protein accession.
///
/// Accession syntaxes overlap, so the rules run in a fixed priority order and
/// the first match wins. `gi`-prefixed accessions are GI numbers regardless of
/// the decorated form; `trim_gi_accession` recovers the numeric id separately.
/// Returns `None` for accessions from databases not considered here.
pub fn classify(accession: &str) -> Option<DatabaseTag> {
    if accession.starts_with(GI_PREFIX) {
        return Some(DatabaseTag::GiNumber);
    }
    let patterns = patterns();
    if patterns.ensembl_protein.is_match(accession) {
        Some(DatabaseTag::EnsemblProtein)
    } else if patterns.refseq_protein.is_match(accession) {
        Some(DatabaseTag::RefseqProtein)
    } else if patterns.swissprot_acc.is_match(accession) {
        Some(DatabaseTag::UniprotAcc)
    } else if patterns.swissprot_name.is_match(accession) {
        Some(DatabaseTag::UniprotId)
    } else if patterns.uniparc.is_match(accession) {
        Some(DatabaseTag::Uniparc)
    } else if patterns.ipi.is_match(accession) {
        Some(DatabaseTag::Ipi)
    } else {
        None
    }
}

/// Groups accessions by source database, dropping unclassifiable ones.
pub fn group_by_database(accessions: &BTreeSet<String>) -> BTreeMap<DatabaseTag, BTreeSet<String>> {
    let mut grouped = BTreeMap::new();
    for accession in accessions {
        if let Some(tag) = classify(accession) {
            grouped
                .entry(tag)
                .or_insert_with(BTreeSet::new)
                .insert(accession.clone());
        }
    }
    grouped
}

/// Returns the numeric id from a decorated GI accession such as
/// `gi|12345|ref|NP_001.1`, or the input unchanged if it is not one.
pub fn trim_gi_accession(accession: &str) -> &str {
    let mut tokens = accession.split('|');
    match (tokens.next(), tokens.next()) {
        (Some(GI_PREFIX), Some(number)) => number,
        _ => accession,
    }
}
