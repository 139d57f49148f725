use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use tempfile::NamedTempFile;

use crate::error::ProtmapError;
use crate::index::{CatalogRepository, PingStatus};
use crate::record::{ProteinRecord, sanitize_accession};

/// Local catalog backend: one JSON document per accession under
/// `<root>/proteins/`, written atomically. Documents are keyed by the
/// sanitized accession, and pages scan filenames in sorted order so
/// pagination is stable across calls.
#[derive(Debug, Clone)]
pub struct FileCatalogRepository {
    root: Utf8PathBuf,
}

impl FileCatalogRepository {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn default_root() -> Result<Utf8PathBuf, ProtmapError> {
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.data_dir().join("protmap").join("catalog")).ok()
            })
            .ok_or_else(|| ProtmapError::Filesystem("unable to resolve data directory".to_string()))
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn proteins_dir(&self) -> Utf8PathBuf {
        self.root.join("proteins")
    }

    fn record_path(&self, accession: &str) -> Utf8PathBuf {
        self.proteins_dir()
            .join(format!("{}.json", sanitize_accession(accession)))
    }

    fn write_record_atomic(&self, record: &ProteinRecord) -> Result<(), ProtmapError> {
        let path = self.record_path(&record.accession);
        let parent = path
            .parent()
            .ok_or_else(|| ProtmapError::Filesystem("invalid record path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| ProtmapError::Filesystem(err.to_string()))?;
        let content = serde_json::to_vec_pretty(record)
            .map_err(|err| ProtmapError::Index(err.to_string()))?;
        let temp = NamedTempFile::new_in(parent.as_std_path())
            .map_err(|err| ProtmapError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), &content).map_err(|err| ProtmapError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| ProtmapError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn read_record(&self, path: &Utf8Path) -> Result<ProteinRecord, ProtmapError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| ProtmapError::Filesystem(err.to_string()))?;
        serde_json::from_str(&content).map_err(|err| ProtmapError::Index(err.to_string()))
    }

    fn document_paths(&self) -> Result<Vec<Utf8PathBuf>, ProtmapError> {
        let dir = self.proteins_dir();
        if !dir.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        let entries =
            fs::read_dir(dir.as_std_path()).map_err(|err| ProtmapError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| ProtmapError::Filesystem(err.to_string()))?;
            let path = Utf8PathBuf::from_path_buf(entry.path())
                .map_err(|_| ProtmapError::Filesystem("non-UTF-8 path in catalog".to_string()))?;
            if path.extension() == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn filter_records<F>(&self, keep: F) -> Result<Vec<ProteinRecord>, ProtmapError>
    where
        F: Fn(&ProteinRecord) -> bool,
    {
        let mut found = Vec::new();
        for path in self.document_paths()? {
            let record = self.read_record(&path)?;
            if keep(&record) {
                found.push(record);
            }
        }
        Ok(found)
    }
}

impl CatalogRepository for FileCatalogRepository {
    fn ping(&self) -> PingStatus {
        let started = Instant::now();
        let ok = fs::create_dir_all(self.proteins_dir().as_std_path()).is_ok();
        PingStatus {
            ok,
            elapsed: started.elapsed(),
        }
    }

    fn save_all(&self, records: &[ProteinRecord]) -> Result<(), ProtmapError> {
        for record in records {
            self.write_record_atomic(record)?;
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<(), ProtmapError> {
        let dir = self.proteins_dir();
        if dir.as_std_path().exists() {
            fs::remove_dir_all(dir.as_std_path())
                .map_err(|err| ProtmapError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }

    fn delete(&self, accession: &str) -> Result<(), ProtmapError> {
        let path = self.record_path(accession);
        if path.as_std_path().exists() {
            fs::remove_file(path.as_std_path())
                .map_err(|err| ProtmapError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }

    fn find_by_accession(&self, accession: &str) -> Result<Vec<ProteinRecord>, ProtmapError> {
        let path = self.record_path(accession);
        if !path.as_std_path().exists() {
            return Ok(Vec::new());
        }
        Ok(vec![self.read_record(&path)?])
    }

    fn find_by_uniprot_mapping(&self, mapping: &str) -> Result<Vec<ProteinRecord>, ProtmapError> {
        self.filter_records(|record| record.uniprot_mapping.as_deref() == Some(mapping))
    }

    fn find_by_ensembl_mapping(&self, mapping: &str) -> Result<Vec<ProteinRecord>, ProtmapError> {
        self.filter_records(|record| record.ensembl_mapping.as_deref() == Some(mapping))
    }

    fn find_by_other_mapping(&self, mapping: &str) -> Result<Vec<ProteinRecord>, ProtmapError> {
        self.filter_records(|record| record.other_mappings.contains(mapping))
    }

    fn find_all(
        &self,
        page_number: usize,
        page_size: usize,
    ) -> Result<Vec<ProteinRecord>, ProtmapError> {
        let paths = self.document_paths()?;
        let start = page_number.saturating_mul(page_size);
        if start >= paths.len() {
            return Ok(Vec::new());
        }
        let end = usize::min(start + page_size, paths.len());
        paths[start..end]
            .iter()
            .map(|path| self.read_record(path))
            .collect()
    }
}
