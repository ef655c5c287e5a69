//! Definition catalogue read from a JSON or TOML file.
//!
//! The file holds two top-level lists, `types` and `entities`, in the same
//! shape the definitions serialize to. The file is re-read on every load so
//! a registry reload picks up edits.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use conduit_core::DefinitionSource;
use conduit_domain::{ConduitError, IntegrationEntityDefinition, IntegrationTypeDefinition, Result};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct CatalogueFile {
    #[serde(default)]
    types: Vec<IntegrationTypeDefinition>,
    #[serde(default)]
    entities: Vec<IntegrationEntityDefinition>,
}

/// [`DefinitionSource`] backed by a file on disk.
pub struct FileDefinitionSource {
    path: PathBuf,
}

impl FileDefinitionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<CatalogueFile> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ConduitError::Config(format!("failed to read definitions {}: {e}", self.path.display()))
        })?;
        let catalogue = parse_catalogue(&contents, &self.path)?;
        debug!(
            path = %self.path.display(),
            types = catalogue.types.len(),
            entities = catalogue.entities.len(),
            "definition file parsed"
        );
        Ok(catalogue)
    }
}

#[async_trait]
impl DefinitionSource for FileDefinitionSource {
    async fn load_types(&self) -> Result<Vec<IntegrationTypeDefinition>> {
        Ok(self.read().await?.types)
    }

    async fn load_entities(&self) -> Result<Vec<IntegrationEntityDefinition>> {
        Ok(self.read().await?.entities)
    }
}

fn parse_catalogue(contents: &str, path: &Path) -> Result<CatalogueFile> {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("json") {
        "toml" => toml::from_str(contents).map_err(|e| ConduitError::Config(format!("Invalid TOML definitions: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConduitError::Config(format!("Invalid JSON definitions: {e}"))),
        other => Err(ConduitError::Config(format!("Unsupported definitions format: {other}"))),
    }
}
