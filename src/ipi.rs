use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, error, info};

fn header_pattern() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| Regex::new(r"^UniProtKB\s+IPI$").unwrap())
}

/// In-memory IPI to UniProt lookup, loaded once from the bundled mapping file.
///
/// The file carries free-form comment lines, a `UniProtKB  IPI` header, a
/// dashed divider, then whitespace-delimited `UniProtAccession IpiAccession`
/// rows. A single IPI accession may map to several UniProt accessions.
///
/// Load failures never propagate: the table is left empty and IPI accessions
/// simply fail to resolve, which keeps enrichment runs going in degraded mode.
#[derive(Debug, Clone, Default)]
pub struct IpiLookupTable {
    mappings: BTreeMap<String, BTreeSet<String>>,
}

impl IpiLookupTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_path(path: &Path) -> Self {
        match File::open(path) {
            Ok(file) => Self::from_reader(file),
            Err(err) => {
                error!(
                    "cannot read IPI mappings at {}: {err}; continuing with an empty table",
                    path.display()
                );
                Self::empty()
            }
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Self {
        let mut table = Self::empty();
        if let Err(err) = table.load(BufReader::new(reader)) {
            error!("cannot build IPI mappings: {err}; continuing with an empty table");
            table.mappings.clear();
        } else {
            info!("IPI-UniProt mappings file contains {} entries", table.len());
        }
        table
    }

    /// UniProt accessions recorded for an IPI accession; empty when unknown.
    pub fn lookup(&self, ipi_accession: &str) -> BTreeSet<String> {
        self.mappings
            .get(ipi_accession)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    fn load<R: BufRead>(&mut self, reader: R) -> std::io::Result<()> {
        let mut lines = reader.lines();

        // skip everything before the header line
        let mut saw_header = false;
        for line in lines.by_ref() {
            let line = line?;
            if header_pattern().is_match(&line) {
                saw_header = true;
                break;
            }
            debug!("skipping: {line}");
        }
        if !saw_header {
            return Ok(());
        }

        // the dashed divider under the header
        lines.next().transpose()?;

        for line in lines {
            let line = line?;
            let mut tokens = line.split_whitespace();
            let (Some(uniprot_accession), Some(ipi_accession)) = (tokens.next(), tokens.next())
            else {
                continue;
            };
            self.mappings
                .entry(ipi_accession.to_string())
                .or_default()
                .insert(uniprot_accession.to_string());
        }

        Ok(())
    }
}
