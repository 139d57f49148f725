use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::details::DEFAULT_DETAIL_SERVICE_URL;
use crate::enrich::CATALOG_PAGE_SIZE;
use crate::error::ProtmapError;
use crate::mapping::DEFAULT_MAPPING_SERVICE_URL;
use crate::store::FileCatalogRepository;

/// On-disk shape of `protmap.json`. Every field is optional; a missing file
/// resolves to defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub catalog_root: Option<String>,
    #[serde(default)]
    pub mapping_service_url: Option<String>,
    #[serde(default)]
    pub detail_service_url: Option<String>,
    #[serde(default)]
    pub ipi_file: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub catalog_root: Utf8PathBuf,
    pub mapping_service_url: String,
    pub detail_service_url: String,
    /// Path to the bundled IPI mapping file; `None` runs with an empty table.
    pub ipi_file: Option<PathBuf>,
    pub page_size: usize,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ProtmapError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("protmap.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ProtmapError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ProtmapError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ProtmapError> {
        let catalog_root = match config.catalog_root {
            Some(path) => Utf8PathBuf::from(path),
            None => FileCatalogRepository::default_root()?,
        };

        Ok(ResolvedConfig {
            catalog_root,
            mapping_service_url: config
                .mapping_service_url
                .unwrap_or_else(|| DEFAULT_MAPPING_SERVICE_URL.to_string()),
            detail_service_url: config
                .detail_service_url
                .unwrap_or_else(|| DEFAULT_DETAIL_SERVICE_URL.to_string()),
            ipi_file: config.ipi_file.map(PathBuf::from),
            page_size: config.page_size.unwrap_or(CATALOG_PAGE_SIZE),
        })
    }
}
